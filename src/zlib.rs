//! zlib (RFC 1950) framing around a DEFLATE stream: 2-byte header, optional
//! preset-dictionary id, and a trailing big-endian Adler-32.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::checksum::Adler32;
use crate::deflate::Inflate;
use crate::status::{DecodeError, Status, Suspension, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    DictId,
    AwaitingDictionary,
    Body,
    Checksum,
    Done,
}

pub struct ZlibDecoder {
    stage: Stage,
    poisoned: bool,
    ignore_checksum: bool,
    header_buf: [u8; 2],
    header_len: usize,
    fdict: bool,
    dict_id: u32,
    dict_id_buf: [u8; 4],
    dict_id_len: usize,
    dictionary_adler: Option<u32>,
    inflate: Inflate,
    running_adler: Adler32,
    checksum_buf: [u8; 4],
    checksum_len: usize,
}

impl Default for ZlibDecoder {
    fn default() -> Self {
        ZlibDecoder {
            stage: Stage::Header,
            poisoned: false,
            ignore_checksum: false,
            header_buf: [0; 2],
            header_len: 0,
            fdict: false,
            dict_id: 0,
            dict_id_buf: [0; 4],
            dict_id_len: 0,
            dictionary_adler: None,
            inflate: Inflate::new(),
            running_adler: Adler32::new(),
            checksum_buf: [0; 4],
            checksum_len: 0,
        }
    }
}

impl ZlibDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ignore_checksum(&mut self, ignore: bool) {
        self.ignore_checksum = ignore;
    }

    /// Supplies the preset dictionary requested by `Warning::DictionaryRequired`.
    pub fn add_dictionary(&mut self, dictionary: &[u8]) -> Status {
        if self.stage != Stage::AwaitingDictionary {
            return Status::Error(DecodeError::BadCallSequence);
        }
        let mut a = Adler32::new();
        a.update(dictionary);
        if a.finish() != self.dict_id {
            return Status::Error(DecodeError::DictionaryMismatch);
        }
        self.inflate.add_history(dictionary);
        self.stage = Stage::Body;
        Status::Ok
    }

    pub fn decode_io_writer(&mut self, dst: &mut WriteBuffer<'_>, src: &mut ReadBuffer<'_>) -> Status {
        if self.poisoned {
            return Status::Error(DecodeError::DisabledByPreviousError);
        }
        match self.run(dst, src) {
            Ok(status) => status,
            Err(e) => {
                self.poisoned = true;
                Status::Error(e)
            }
        }
    }

    fn run(&mut self, dst: &mut WriteBuffer<'_>, src: &mut ReadBuffer<'_>) -> Result<Status, DecodeError> {
        loop {
            match self.stage {
                Stage::Done => return Ok(Status::Ok),

                Stage::Header => {
                    while self.header_len < 2 {
                        match src.take_byte() {
                            Some(b) => {
                                self.header_buf[self.header_len] = b;
                                self.header_len += 1;
                            }
                            None => {
                                if src.closed {
                                    return Err(DecodeError::NotEnoughData);
                                }
                                return Ok(Status::Suspension(Suspension::ShortRead));
                            }
                        }
                    }
                    let cmf = self.header_buf[0];
                    let flg = self.header_buf[1];
                    let cm = cmf & 0x0F;
                    let cinfo = cmf >> 4;
                    if cm != 8 || cinfo > 7 {
                        return Err(DecodeError::BadZlibHeader);
                    }
                    if (cmf as u32 * 256 + flg as u32) % 31 != 0 {
                        return Err(DecodeError::BadZlibHeader);
                    }
                    self.fdict = flg & 0x20 != 0;
                    self.stage = if self.fdict { Stage::DictId } else { Stage::Body };
                }

                Stage::DictId => {
                    while self.dict_id_len < 4 {
                        match src.take_byte() {
                            Some(b) => {
                                self.dict_id_buf[self.dict_id_len] = b;
                                self.dict_id_len += 1;
                            }
                            None => {
                                if src.closed {
                                    return Err(DecodeError::NotEnoughData);
                                }
                                return Ok(Status::Suspension(Suspension::ShortRead));
                            }
                        }
                    }
                    self.dict_id = u32::from_be_bytes(self.dict_id_buf);
                    self.stage = Stage::AwaitingDictionary;
                    return Ok(Status::Warning(Warning::DictionaryRequired));
                }

                Stage::AwaitingDictionary => {
                    return Ok(Status::Warning(Warning::DictionaryRequired));
                }

                Stage::Body => {
                    let before = dst.wi;
                    let status = self.inflate.decode_io_writer(dst, src);
                    self.running_adler.update(&dst.data[before..dst.wi]);
                    match status {
                        Status::Ok => {
                            self.stage = Stage::Checksum;
                        }
                        Status::Suspension(s) => return Ok(Status::Suspension(s)),
                        Status::Error(e) => return Err(e),
                        Status::Warning(w) => return Ok(Status::Warning(w)),
                    }
                }

                Stage::Checksum => {
                    while self.checksum_len < 4 {
                        match src.take_byte() {
                            Some(b) => {
                                self.checksum_buf[self.checksum_len] = b;
                                self.checksum_len += 1;
                            }
                            None => {
                                if src.closed {
                                    return Err(DecodeError::NotEnoughData);
                                }
                                return Ok(Status::Suspension(Suspension::ShortRead));
                            }
                        }
                    }
                    let expected = u32::from_be_bytes(self.checksum_buf);
                    if !self.ignore_checksum && expected != self.running_adler.finish() {
                        return Err(DecodeError::IncorrectChecksum);
                    }
                    self.stage = Stage::Done;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(compressed: &[u8], out_cap: usize) -> Vec<u8> {
        let mut z = ZlibDecoder::new();
        let mut out = vec![0u8; out_cap];
        let mut dst = WriteBuffer::new(&mut out);
        let mut src = ReadBuffer::closed_at_eof(compressed);
        let status = z.decode_io_writer(&mut dst, &mut src);
        assert!(status.is_ok(), "zlib decode failed: {status:?}");
        out.truncate(dst.wi);
        out
    }

    #[test]
    fn hello_world_golden_vector() {
        let compressed: [u8; 20] = [
            0x78, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF, 0x2F, 0xCA, 0x49, 0x51,
            0x04, 0x00, 0x1C, 0x49, 0x04, 0x3E,
        ];
        let out = decode_all(&compressed, 32);
        assert_eq!(out, b"Hello World!");
    }

    #[test]
    fn bad_header_checksum_is_rejected() {
        let compressed = [0x78, 0x9Du8, 0, 0, 0, 0];
        let mut z = ZlibDecoder::new();
        let mut out = [0u8; 16];
        let mut dst = WriteBuffer::new(&mut out);
        let mut src = ReadBuffer::closed_at_eof(&compressed);
        let status = z.decode_io_writer(&mut dst, &mut src);
        assert_eq!(status, Status::Error(DecodeError::BadZlibHeader));
    }
}
