use wuffle::{ReadBuffer, WriteBuffer, ZlibDecoder};

const HELLO_WORLD: &[u8] = &[
    0x78, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF, 0x2F, 0xCA, 0x49, 0x51, 0x04, 0x00, 0x1C, 0x49, 0x04,
    0x3E,
];

#[test]
fn decodes_hello_world_in_one_call() {
    let mut zlib = ZlibDecoder::new();
    let mut out = [0u8; 64];
    let mut src = ReadBuffer::closed_at_eof(HELLO_WORLD);
    let mut dst = WriteBuffer::new(&mut out);
    let status = zlib.decode_io_writer(&mut dst, &mut src);
    assert!(status.is_ok(), "status: {status:?}");
    assert_eq!(&out[..dst.wi], b"Hello World!");
}

#[test]
fn decodes_hello_world_one_byte_at_a_time() {
    let mut zlib = ZlibDecoder::new();
    let mut out = [0u8; 64];
    let mut collected = Vec::new();
    let mut pos = 0usize;
    loop {
        let end = (pos + 1).min(HELLO_WORLD.len());
        let mut src = ReadBuffer::new(&HELLO_WORLD[pos..end]);
        src.closed = end == HELLO_WORLD.len();
        let mut dst = WriteBuffer::new(&mut out);
        let status = zlib.decode_io_writer(&mut dst, &mut src);
        collected.extend_from_slice(&out[..dst.wi]);
        pos += src.ri;
        if status.is_ok() {
            break;
        }
        assert!(status.is_suspension(), "unexpected status: {status:?}");
        if pos >= HELLO_WORLD.len() {
            panic!("ran out of input without completing: {status:?}");
        }
    }
    assert_eq!(collected, b"Hello World!");
}
