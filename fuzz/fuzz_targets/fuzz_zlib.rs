#![no_main]

use libfuzzer_sys::fuzz_target;
use wuffle::{ReadBuffer, WriteBuffer, ZlibDecoder};

fuzz_target!(|data: &[u8]| {
    let mut zlib = ZlibDecoder::new();
    let mut out = [0u8; 1 << 16];
    let mut src = ReadBuffer::closed_at_eof(data);
    for _ in 0..(1 << 20) {
        let mut dst = WriteBuffer::new(&mut out);
        let status = zlib.decode_io_writer(&mut dst, &mut src);
        if status.is_error() || status.is_ok() {
            break;
        }
    }
});
