use wuffle::{GzipDecoder, Inflate, ReadBuffer, Status, Suspension, WriteBuffer, ZlibDecoder};

const ZLIB_HELLO: &[u8] = &[
    0x78, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF, 0x2F, 0xCA, 0x49, 0x51, 0x04, 0x00, 0x1C, 0x49, 0x04,
    0x3E,
];

fn feed_three_bytes_at_a_time<F>(data: &[u8], out_cap: usize, mut call: F) -> Vec<u8>
where
    F: FnMut(&mut WriteBuffer<'_>, &mut ReadBuffer<'_>) -> Status,
{
    let mut out = vec![0u8; out_cap];
    let mut collected = Vec::new();
    let mut pos = 0usize;
    loop {
        let end = (pos + 3).min(data.len());
        let mut src = ReadBuffer { data: &data[pos..end], ri: 0, pos: 0, closed: end == data.len() };
        let mut dst = WriteBuffer::new(&mut out);
        let status = call(&mut dst, &mut src);
        collected.extend_from_slice(&out[..dst.wi]);
        pos += src.ri;
        match status {
            Status::Ok => return collected,
            Status::Suspension(Suspension::ShortRead) => continue,
            other => panic!("unexpected status: {other:?} at pos {pos}"),
        }
    }
}

#[test]
fn zlib_resumes_across_three_byte_chunks() {
    let mut zlib = ZlibDecoder::new();
    let out = feed_three_bytes_at_a_time(ZLIB_HELLO, 64, |dst, src| zlib.decode_io_writer(dst, src));
    assert_eq!(out, b"Hello World!");
}

#[test]
fn gzip_resumes_across_three_byte_chunks() {
    let payload = b"stream me in tiny pieces";
    let mut gzip_bytes = Vec::new();
    gzip_bytes.extend_from_slice(&[0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF]);
    // a single stored DEFLATE block holding the payload verbatim.
    gzip_bytes.push(0b0000_0001);
    gzip_bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    gzip_bytes.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
    gzip_bytes.extend_from_slice(payload);
    let mut crc = wuffle::Crc32::default();
    crc.update(payload);
    gzip_bytes.extend_from_slice(&crc.finish().to_le_bytes());
    gzip_bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());

    let mut gzip = GzipDecoder::new();
    let out = feed_three_bytes_at_a_time(&gzip_bytes, 64, |dst, src| gzip.decode_io_writer(dst, src));
    assert_eq!(out, payload);
}

#[test]
fn deflate_resumes_with_short_write_buffers() {
    let payload = b"short-write-boundary-stress-test-payload";
    let mut compressed = vec![0b0000_0001u8];
    compressed.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    compressed.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
    compressed.extend_from_slice(payload);

    let mut inflate = Inflate::new();
    let mut out = vec![0u8; payload.len()];
    let mut produced = 0usize;
    let mut src = ReadBuffer::closed_at_eof(&compressed);
    loop {
        let end = (produced + 4).min(out.len());
        let mut dst = WriteBuffer::new(&mut out[produced..end]);
        let status = inflate.decode_io_writer(&mut dst, &mut src);
        produced += dst.wi;
        match status {
            Status::Ok => break,
            Status::Suspension(Suspension::ShortWrite) => continue,
            other => panic!("unexpected status: {other:?}"),
        }
    }
    assert_eq!(&out[..produced], &payload[..]);
}
