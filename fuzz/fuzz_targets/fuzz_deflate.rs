#![no_main]

use libfuzzer_sys::fuzz_target;
use wuffle::{Inflate, ReadBuffer, WriteBuffer};

fuzz_target!(|data: &[u8]| {
    let mut inflate = Inflate::new();
    let mut out = [0u8; 1 << 16];
    let mut src = ReadBuffer::closed_at_eof(data);
    for _ in 0..(1 << 20) {
        let mut dst = WriteBuffer::new(&mut out);
        let status = inflate.decode_io_writer(&mut dst, &mut src);
        if status.is_error() || status.is_ok() {
            break;
        }
    }
});
