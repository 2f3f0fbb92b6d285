//! The zlib FDICT flow: header declares a preset dictionary, the decoder
//! suspends with `Warning::DictionaryRequired`, a wrong dictionary is
//! rejected, and the right one (verified by Adler-32 id) lets decoding
//! continue across the remaining chunks.

use wuffle::{DecodeError, ReadBuffer, Status, Suspension, Warning, WriteBuffer, ZlibDecoder};

// CMF=0x78 (CM=8, CINFO=7), FLG=0x20 (FDICT set; (0x78*256+0x20) % 31 == 0),
// dict id = Adler-32(b"xyz"), then a stored DEFLATE block holding "dict ok"
// verbatim, then the Adler-32 of the decompressed *output* (the dictionary
// itself is never part of the output, so the trailer only covers "dict
// ok").
const DICTIONARY: &[u8] = b"xyz";
const WRONG_DICTIONARY: &[u8] = b"nope";
const PAYLOAD: &[u8] = b"dict ok";

fn fdict_stream() -> Vec<u8> {
    let mut v = vec![0x78, 0x20, 0x02, 0xD7, 0x01, 0x6C];
    v.push(0b0000_0001);
    v.extend_from_slice(&(PAYLOAD.len() as u16).to_le_bytes());
    v.extend_from_slice(&(!(PAYLOAD.len() as u16)).to_le_bytes());
    v.extend_from_slice(PAYLOAD);
    v.extend_from_slice(&[0x0A, 0xA1, 0x02, 0x9F]);
    v
}

#[test]
fn wrong_dictionary_is_rejected() {
    let data = fdict_stream();
    let mut zlib = ZlibDecoder::new();
    let mut out = [0u8; 16];
    let mut src = ReadBuffer::closed_at_eof(&data);
    let mut dst = WriteBuffer::new(&mut out);
    let status = zlib.decode_io_writer(&mut dst, &mut src);
    assert_eq!(status, Status::Warning(Warning::DictionaryRequired));

    let status = zlib.add_dictionary(WRONG_DICTIONARY);
    assert_eq!(status, Status::Error(DecodeError::DictionaryMismatch));
}

#[test]
fn fdict_stream_resumes_across_chunks_once_the_right_dictionary_is_supplied() {
    let data = fdict_stream();
    let mut zlib = ZlibDecoder::new();
    let mut out = [0u8; 16];
    let mut collected = Vec::new();
    let mut pos = 0usize;
    let mut dictionary_supplied = false;

    loop {
        let end = (pos + 3).min(data.len());
        let mut src = ReadBuffer::new(&data[pos..end]);
        src.closed = end == data.len();
        let mut dst = WriteBuffer::new(&mut out);
        let status = zlib.decode_io_writer(&mut dst, &mut src);
        collected.extend_from_slice(&out[..dst.wi]);
        pos += src.ri;
        match status {
            Status::Ok => break,
            Status::Suspension(Suspension::ShortRead) => continue,
            Status::Warning(Warning::DictionaryRequired) => {
                assert!(!dictionary_supplied, "dictionary requested twice");
                dictionary_supplied = true;
                let status = zlib.add_dictionary(DICTIONARY);
                assert!(status.is_ok(), "add_dictionary failed: {status:?}");
            }
            other => panic!("unexpected status: {other:?} at pos {pos}"),
        }
    }
    assert!(dictionary_supplied);
    assert_eq!(collected, PAYLOAD);
}

#[test]
fn add_dictionary_outside_the_awaiting_state_is_rejected() {
    let mut zlib = ZlibDecoder::new();
    let status = zlib.add_dictionary(DICTIONARY);
    assert_eq!(status, Status::Error(DecodeError::BadCallSequence));
}
