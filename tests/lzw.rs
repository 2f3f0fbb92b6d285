//! A multi-call LZW scenario exercising code-width growth (3 bits to 4
//! bits mid-stream, per the classic GIF LZW dictionary-growth rule) fed
//! across a suspend/resume boundary that splits the packed bytes mid-code.

use wuffle::{LzwDecoder, ReadBuffer, Status, Suspension, WriteBuffer};

// min_code_size=2 (clear=4, end=5); codes [clear, 0, 0, 0, 0, 0, end] packed
// LSB-first. The first three literal 0s are coded at width 3; the dictionary
// reaches 2^3 entries after the third one, so the decoder's width grows to 4
// for the remaining codes. Verified by hand-simulating the same dictionary
// bookkeeping the decoder itself performs.
const FIVE_ZEROS_WITH_WIDTH_GROWTH: &[u8] = &[0x04, 0x00, 0x50];

#[test]
fn decodes_in_one_call() {
    let mut lzw = LzwDecoder::new(2);
    let mut out = [0u8; 8];
    let mut src = ReadBuffer::closed_at_eof(FIVE_ZEROS_WITH_WIDTH_GROWTH);
    let mut dst = WriteBuffer::new(&mut out);
    let status = lzw.decode_io_writer(&mut dst, &mut src);
    assert!(status.is_ok(), "status: {status:?}");
    assert_eq!(&out[..dst.wi], &[0, 0, 0, 0, 0]);
}

#[test]
fn resumes_across_a_width_growth_boundary() {
    let mut lzw = LzwDecoder::new(2);
    let mut out = [0u8; 8];
    let mut collected = Vec::new();
    let mut pos = 0usize;
    loop {
        let end = (pos + 1).min(FIVE_ZEROS_WITH_WIDTH_GROWTH.len());
        let mut src = ReadBuffer::new(&FIVE_ZEROS_WITH_WIDTH_GROWTH[pos..end]);
        src.closed = end == FIVE_ZEROS_WITH_WIDTH_GROWTH.len();
        let mut dst = WriteBuffer::new(&mut out);
        let status = lzw.decode_io_writer(&mut dst, &mut src);
        collected.extend_from_slice(&out[..dst.wi]);
        pos += src.ri;
        match status {
            Status::Ok => break,
            Status::Suspension(Suspension::ShortRead) => continue,
            other => panic!("unexpected status: {other:?} at pos {pos}"),
        }
    }
    assert_eq!(collected, vec![0, 0, 0, 0, 0]);
}

#[test]
fn short_write_buffer_suspends_and_resumes_mid_run() {
    let mut lzw = LzwDecoder::new(2);
    let mut out = [0u8; 5];
    let mut produced = 0usize;
    let mut src = ReadBuffer::closed_at_eof(FIVE_ZEROS_WITH_WIDTH_GROWTH);
    loop {
        let end = (produced + 2).min(out.len());
        let mut dst = WriteBuffer::new(&mut out[produced..end]);
        let status = lzw.decode_io_writer(&mut dst, &mut src);
        produced += dst.wi;
        match status {
            Status::Ok => break,
            Status::Suspension(Suspension::ShortWrite) => continue,
            other => panic!("unexpected status: {other:?}"),
        }
    }
    assert_eq!(&out[..produced], &[0, 0, 0, 0, 0]);
}
