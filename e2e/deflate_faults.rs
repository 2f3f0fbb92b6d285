use wuffle::{DecodeError, Inflate, ReadBuffer, Status, WriteBuffer};

#[test]
fn block_type_three_is_rejected() {
    // 3-bit block header: final=1, type=3 (reserved/invalid) -> 0b111, LSB first
    // packed into the low bits of one byte.
    let data = [0b0000_0111u8];
    let mut inflate = Inflate::new();
    let mut out = [0u8; 16];
    let mut src = ReadBuffer::closed_at_eof(&data);
    let mut dst = WriteBuffer::new(&mut out);
    let status = inflate.decode_io_writer(&mut dst, &mut src);
    assert_eq!(status, Status::Error(DecodeError::BadBlock));
}

#[test]
fn poisoned_decoder_rejects_every_later_call() {
    let data = [0b0000_0111u8];
    let mut inflate = Inflate::new();
    let mut out = [0u8; 16];
    let mut src = ReadBuffer::closed_at_eof(&data);
    let mut dst = WriteBuffer::new(&mut out);
    let _ = inflate.decode_io_writer(&mut dst, &mut src);

    let mut src2 = ReadBuffer::closed_at_eof(&[]);
    let mut dst2 = WriteBuffer::new(&mut out);
    let status = inflate.decode_io_writer(&mut dst2, &mut src2);
    assert_eq!(status, Status::Error(DecodeError::DisabledByPreviousError));
}

#[test]
fn truncated_stored_block_is_not_enough_data() {
    // final=1, type=0 (stored), then a declared length that runs past EOF.
    let data = [0b0000_0001u8, 0x10, 0x00, 0xEF, 0xFF]; // len=0x10, but no payload follows
    let mut inflate = Inflate::new();
    let mut out = [0u8; 64];
    let mut src = ReadBuffer::closed_at_eof(&data);
    let mut dst = WriteBuffer::new(&mut out);
    let status = inflate.decode_io_writer(&mut dst, &mut src);
    assert_eq!(status, Status::Error(DecodeError::NotEnoughData));
}

#[test]
fn inconsistent_stored_block_length_is_rejected() {
    // final=1, type=0, LEN=0x0004 but NLEN is not its one's complement.
    let data = [0b0000_0001u8, 0x04, 0x00, 0x00, 0x00, 1, 2, 3, 4];
    let mut inflate = Inflate::new();
    let mut out = [0u8; 64];
    let mut src = ReadBuffer::closed_at_eof(&data);
    let mut dst = WriteBuffer::new(&mut out);
    let status = inflate.decode_io_writer(&mut dst, &mut src);
    assert_eq!(status, Status::Error(DecodeError::InconsistentStoredBlockLength));
}
