//! gzip (RFC 1952) framing around a DEFLATE stream: a variable-length
//! header (optional extra/name/comment/header-CRC fields), then the
//! compressed body, then a trailing CRC-32 and ISIZE.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::checksum::Crc32;
use crate::deflate::Inflate;
use crate::status::{DecodeError, Status, Suspension};

const FTEXT: u8 = 0x01;
const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const KNOWN_FLAGS: u8 = FTEXT | FHCRC | FEXTRA | FNAME | FCOMMENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    FixedHeader,
    ExtraLen,
    ExtraData,
    Name,
    Comment,
    Hcrc,
    Body,
    Crc,
    Isize,
    Done,
}

pub struct GzipDecoder {
    stage: Stage,
    poisoned: bool,
    ignore_checksum: bool,

    fixed_header: [u8; 10],
    fixed_len: usize,
    flags: u8,

    extra_len_buf: [u8; 2],
    extra_len_idx: usize,
    extra_remaining: u16,

    hcrc_buf: [u8; 2],
    hcrc_len: usize,

    inflate: Inflate,
    crc: Crc32,
    output_len: u64,

    trailer_buf: [u8; 4],
    trailer_len: usize,
}

impl Default for GzipDecoder {
    fn default() -> Self {
        GzipDecoder {
            stage: Stage::FixedHeader,
            poisoned: false,
            ignore_checksum: false,
            fixed_header: [0; 10],
            fixed_len: 0,
            flags: 0,
            extra_len_buf: [0; 2],
            extra_len_idx: 0,
            extra_remaining: 0,
            hcrc_buf: [0; 2],
            hcrc_len: 0,
            inflate: Inflate::new(),
            crc: Crc32::new(),
            output_len: 0,
            trailer_buf: [0; 4],
            trailer_len: 0,
        }
    }
}

macro_rules! read_exact {
    ($buf:expr, $len:expr, $cap:expr, $src:expr) => {{
        while $len < $cap {
            match $src.take_byte() {
                Some(b) => {
                    $buf[$len] = b;
                    $len += 1;
                }
                None => {
                    if $src.closed {
                        return Err(DecodeError::NotEnoughData);
                    }
                    return Ok(Status::Suspension(Suspension::ShortRead));
                }
            }
        }
    }};
}

impl GzipDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ignore_checksum(&mut self, ignore: bool) {
        self.ignore_checksum = ignore;
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

    fn skip_nul_terminated(&self, src: &mut ReadBuffer<'_>) -> Result<bool, DecodeError> {
        loop {
            match src.take_byte() {
                Some(0) => return Ok(true),
                Some(_) => continue,
                None => {
                    if src.closed {
                        return Err(DecodeError::NotEnoughData);
                    }
                    return Ok(false);
                }
            }
        }
    }

    fn run(&mut self, dst: &mut WriteBuffer<'_>, src: &mut ReadBuffer<'_>) -> Result<Status, DecodeError> {
        loop {
            match self.stage {
                Stage::Done => return Ok(Status::Ok),

                Stage::FixedHeader => {
                    read_exact!(self.fixed_header, self.fixed_len, 10, src);
                    if self.fixed_header[0] != 0x1F || self.fixed_header[1] != 0x8B {
                        return Err(DecodeError::BadGzipHeader);
                    }
                    if self.fixed_header[2] != 8 {
                        return Err(DecodeError::BadGzipHeader);
                    }
                    self.flags = self.fixed_header[3];
                    if self.flags & !KNOWN_FLAGS != 0 {
                        return Err(DecodeError::BadEncodingFlags);
                    }
                    self.stage = Stage::ExtraLen;
                }

                Stage::ExtraLen => {
                    if self.flags & FEXTRA == 0 {
                        self.stage = Stage::Name;
                        continue;
                    }
                    read_exact!(self.extra_len_buf, self.extra_len_idx, 2, src);
                    self.extra_remaining = u16::from_le_bytes(self.extra_len_buf);
                    self.stage = Stage::ExtraData;
                }

                Stage::ExtraData => {
                    while self.extra_remaining > 0 {
                        match src.take_byte() {
                            Some(_) => self.extra_remaining -= 1,
                            None => {
                                if src.closed {
                                    return Err(DecodeError::NotEnoughData);
                                }
                                return Ok(Status::Suspension(Suspension::ShortRead));
                            }
                        }
                    }
                    self.stage = Stage::Name;
                }

                Stage::Name => {
                    if self.flags & FNAME == 0 {
                        self.stage = Stage::Comment;
                        continue;
                    }
                    if self.skip_nul_terminated(src)? {
                        self.stage = Stage::Comment;
                    } else {
                        return Ok(Status::Suspension(Suspension::ShortRead));
                    }
                }

                Stage::Comment => {
                    if self.flags & FCOMMENT == 0 {
                        self.stage = Stage::Hcrc;
                        continue;
                    }
                    if self.skip_nul_terminated(src)? {
                        self.stage = Stage::Hcrc;
                    } else {
                        return Ok(Status::Suspension(Suspension::ShortRead));
                    }
                }

                Stage::Hcrc => {
                    if self.flags & FHCRC == 0 {
                        self.stage = Stage::Body;
                        continue;
                    }
                    read_exact!(self.hcrc_buf, self.hcrc_len, 2, src);
                    self.stage = Stage::Body;
                }

                Stage::Body => {
                    let before = dst.wi;
                    let status = self.inflate.decode_io_writer(dst, src);
                    let produced = &dst.data[before..dst.wi];
                    self.crc.update(produced);
                    self.output_len = self.output_len.wrapping_add(produced.len() as u64);
                    match status {
                        Status::Ok => self.stage = Stage::Crc,
                        Status::Suspension(s) => return Ok(Status::Suspension(s)),
                        Status::Error(e) => return Err(e),
                        Status::Warning(w) => return Ok(Status::Warning(w)),
                    }
                }

                Stage::Crc => {
                    read_exact!(self.trailer_buf, self.trailer_len, 4, src);
                    let expected = u32::from_le_bytes(self.trailer_buf);
                    if !self.ignore_checksum && expected != self.crc.finish() {
                        return Err(DecodeError::IncorrectChecksum);
                    }
                    self.trailer_len = 0;
                    self.stage = Stage::Isize;
                }

                Stage::Isize => {
                    read_exact!(self.trailer_buf, self.trailer_len, 4, src);
                    let expected = u32::from_le_bytes(self.trailer_buf);
                    let actual = (self.output_len & 0xFFFF_FFFF) as u32;
                    if !self.ignore_checksum && expected != actual {
                        return Err(DecodeError::IncorrectDataLength);
                    }
                    self.stage = Stage::Done;
                }
            }
        }
    }
}
