#![no_main]

use libfuzzer_sys::fuzz_target;
use wuffle::gif::{DecodeFrameOptions, FrameConfig, GifDecoder, ImageConfig};
use wuffle::{ReadBuffer, WriteBuffer};

fuzz_target!(|data: &[u8]| {
    let mut gif = GifDecoder::new();
    let mut src = ReadBuffer::closed_at_eof(data);
    let mut cfg = ImageConfig::default();
    if !gif.decode_image_config(&mut cfg, &mut src).is_ok() {
        return;
    }
    let mut out = vec![0u8; cfg.width as usize * cfg.height as usize * 4 + 4];

    for _ in 0..256 {
        let mut frame_cfg = FrameConfig::default();
        let status = gif.decode_frame_config(&mut frame_cfg, &mut src);
        if !status.is_ok() {
            break;
        }
        let mut dst = WriteBuffer::new(&mut out);
        let status = gif.decode_frame(&mut dst, &mut src, DecodeFrameOptions::default());
        if status.is_error() {
            break;
        }
    }
});
