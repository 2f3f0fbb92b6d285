use wuffle::{GzipDecoder, ReadBuffer, WriteBuffer};

const EMPTY_GZIP: &[u8] =
    &[0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

#[test]
fn decodes_empty_payload() {
    let mut gzip = GzipDecoder::new();
    let mut out = [0u8; 16];
    let mut src = ReadBuffer::closed_at_eof(EMPTY_GZIP);
    let mut dst = WriteBuffer::new(&mut out);
    let status = gzip.decode_io_writer(&mut dst, &mut src);
    assert!(status.is_ok(), "status: {status:?}");
    assert_eq!(dst.wi, 0);
}

#[test]
fn truncated_input_is_rejected() {
    let mut gzip = GzipDecoder::new();
    let mut out = [0u8; 16];
    let mut src = ReadBuffer::closed_at_eof(&EMPTY_GZIP[..EMPTY_GZIP.len() - 4]);
    let mut dst = WriteBuffer::new(&mut out);
    let status = gzip.decode_io_writer(&mut dst, &mut src);
    assert!(status.is_error(), "status: {status:?}");
}
