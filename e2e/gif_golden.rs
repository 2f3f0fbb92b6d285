use wuffle::gif::{DecodeFrameOptions, FrameConfig, GifDecoder, ImageConfig};
use wuffle::{LzwDecoder, ReadBuffer, WriteBuffer};

const ONE_PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, // 1x1
    0x80, 0x00, 0x00, // global palette (2 entries), bg index, aspect
    0xFF, 0x00, 0x00, // entry 0: red
    0x00, 0x00, 0x00, // entry 1: black
    0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, // lzw min code size
    0x02, 0x4C, 0x01, // sub-block: clear, literal 1, end
    0x00, // terminator
    0x3B, // trailer
];

#[test]
fn decodes_minimal_one_pixel_gif() {
    let mut gif = GifDecoder::new();
    let mut cfg = ImageConfig::default();
    let mut src = ReadBuffer::closed_at_eof(ONE_PIXEL_GIF);
    let status = gif.decode_image_config(&mut cfg, &mut src);
    assert!(status.is_ok(), "image config status: {status:?}");
    assert_eq!((cfg.width, cfg.height), (1, 1));
    assert!(cfg.first_frame_is_opaque);

    let mut frame_cfg = FrameConfig::default();
    let status = gif.decode_frame_config(&mut frame_cfg, &mut src);
    assert!(status.is_ok());

    let mut out = [0u8; 4];
    let mut dst = WriteBuffer::new(&mut out);
    let status = gif.decode_frame(&mut dst, &mut src, DecodeFrameOptions::default());
    assert!(status.is_ok(), "frame status: {status:?}");
    // clear(4), literal 1, end(5) -> palette entry 1 (black).
    assert_eq!(out, [0x00, 0x00, 0x00, 0xFF]);
    assert_eq!(gif.num_decoded_frames(), 1);
}

fn netscape_loop_forever_gif() -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(b"GIF89a");
    v.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00]);
    v.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0x00]); // red, black
    // NETSCAPE2.0 application extension, loop count 0 (infinite).
    v.push(0x21);
    v.push(0xFF);
    v.push(0x0B);
    v.extend_from_slice(b"NETSCAPE2.0");
    v.push(0x03);
    v.push(0x01);
    v.extend_from_slice(&[0x00, 0x00]);
    v.push(0x00);
    // frame 1: image descriptor + lzw(literal 0 = red)
    v.extend_from_slice(&[0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    v.push(0x02);
    v.push(0x02);
    v.extend_from_slice(&[0x44, 0x01]);
    v.push(0x00);
    // frame 2: image descriptor + lzw(literal 1 = black)
    v.extend_from_slice(&[0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    v.push(0x02);
    v.push(0x02);
    v.extend_from_slice(&[0x4C, 0x01]);
    v.push(0x00);
    v.push(0x3B);
    v
}

#[test]
fn netscape_extension_reports_infinite_loop_and_two_frames() {
    let data = netscape_loop_forever_gif();
    let mut gif = GifDecoder::new();
    let mut cfg = ImageConfig::default();
    let mut src = ReadBuffer::closed_at_eof(&data);
    let status = gif.decode_image_config(&mut cfg, &mut src);
    assert!(status.is_ok(), "image config status: {status:?}");
    assert_eq!(gif.num_animation_loops(), 0);

    let mut colors = Vec::new();
    for _ in 0..2 {
        let mut frame_cfg = FrameConfig::default();
        let status = gif.decode_frame_config(&mut frame_cfg, &mut src);
        assert!(status.is_ok(), "frame config status: {status:?}");
        let mut out = [0u8; 4];
        let mut dst = WriteBuffer::new(&mut out);
        let status = gif.decode_frame(&mut dst, &mut src, DecodeFrameOptions::default());
        assert!(status.is_ok(), "frame status: {status:?}");
        colors.push(out);
    }
    assert_eq!(colors[0], [0x00, 0x00, 0xFF, 0xFF]); // red
    assert_eq!(colors[1], [0x00, 0x00, 0x00, 0xFF]); // black

    let mut trailing_cfg = FrameConfig::default();
    let status = gif.decode_frame_config(&mut trailing_cfg, &mut src);
    assert!(matches!(status, wuffle::Status::Warning(wuffle::Warning::EndOfData)));
}

#[test]
fn lzw_literal_width_8_matches_expected_index_stream() {
    let packed = [0x00u8, 0x51, 0xFC, 0x1B, 0x28, 0x70, 0xA0, 0xC1, 0x83, 0x01, 0x01];
    let mut lzw = LzwDecoder::new(8);
    let mut out = [0u8; 32];
    let mut dst = WriteBuffer::new(&mut out);
    let mut src = ReadBuffer::closed_at_eof(&packed);
    let status = lzw.decode_io_writer(&mut dst, &mut src);
    assert!(status.is_ok(), "status: {status:?}");
    assert_eq!(
        &out[..dst.wi],
        &[40, 255, 255, 255, 40, 255, 255, 255, 255, 255, 255, 255, 255, 255, 255]
    );
}
