//! Multi-call scenarios for the shared I/O buffer primitives: bit-buffer
//! fills that straddle several `ReadBuffer` chunks, a `Ring` put through
//! several compact cycles, and the `BitBuffer::peek(32)` boundary that
//! `fill_fast` legitimately drives `count` to.

use wuffle::buffer::{BitBuffer, ReadBuffer, Ring, WriteBuffer};

#[test]
fn bit_buffer_fills_across_several_short_reads() {
    // fill_fast's `while count <= 24` loop naturally stops mid-buffer once
    // a chunk boundary is hit; feeding the rest across a second call must
    // pick up exactly where the first left off.
    let data = [0xFFu8, 0x00, 0xAA];
    let mut bb = BitBuffer::default();

    let mut src = ReadBuffer::new(&data[0..2]);
    bb.fill_fast(&mut src);
    assert_eq!(src.ri, 2);
    assert_eq!(bb.count, 16);

    let mut src2 = ReadBuffer::new(&data[2..3]);
    bb.fill_fast(&mut src2);
    assert_eq!(src2.ri, 1);
    assert_eq!(bb.count, 24);

    // low byte came from 0xFF: the first 8 bits taken must all be 1.
    assert_eq!(bb.take(8), 0xFF);
    assert_eq!(bb.take(8), 0x00);
    assert_eq!(bb.take(8), 0xAA);
}

#[test]
fn peek_at_the_full_32_bit_width_does_not_panic_or_wrap_to_zero() {
    // fill_fast's `while count <= 24` loop legitimately drives count to 32
    // once four bytes have landed; peek(32) must then return every
    // buffered bit rather than panicking (1u32 << 32 overflow) or silently
    // masking to zero.
    let data = [0xFFu8, 0xFF, 0xFF, 0xFF, 0x00];
    let mut src = ReadBuffer::new(&data);
    let mut bb = BitBuffer::default();
    bb.fill_fast(&mut src);
    assert_eq!(bb.count, 32);
    assert_eq!(bb.peek(32), 0xFFFF_FFFF);
    assert_eq!(bb.take(32), 0xFFFF_FFFF);
    assert_eq!(bb.count, 0);
}

#[test]
fn bit_buffer_resumes_a_32_bit_take_split_across_two_fills() {
    // First fill tops up only 3 bytes (count=24, below the 32-bit read this
    // simulates wanting); a second fill_one call brings it over the line.
    let data = [0x01u8, 0x02, 0x03];
    let mut src = ReadBuffer::new(&data);
    let mut bb = BitBuffer::default();
    bb.fill_fast(&mut src);
    assert_eq!(bb.count, 24);

    let more = [0x04u8];
    let mut src2 = ReadBuffer::closed_at_eof(&more);
    assert!(bb.fill_one(&mut src2));
    assert_eq!(bb.count, 32);
    assert_eq!(bb.peek(32), 0x0403_0201);
}

#[test]
fn ring_survives_several_push_consume_compact_cycles() {
    let mut backing = [0u8; 8];
    let mut ring = Ring::new(&mut backing);

    for round in 0u8..5 {
        let batch = [round, round.wrapping_add(1), round.wrapping_add(2)];
        let n = ring.push_slice(&batch);
        assert_eq!(n, batch.len(), "ring never makes progress on round {round}");
        let take = ring.readable().len().min(2);
        ring.consume(take);
        assert!(ring.len() <= ring.cap());
    }
}

#[test]
fn write_buffer_accumulates_across_several_short_writes() {
    let mut out = [0u8; 6];
    let mut total = 0usize;
    for batch in [&[1u8, 2][..], &[3, 4, 5][..], &[6, 7][..]] {
        let mut dst = WriteBuffer::new(&mut out[total..]);
        let n = dst.push_slice(batch);
        total += n;
        if n < batch.len() {
            break;
        }
    }
    assert_eq!(total, 6);
    assert_eq!(out, [1, 2, 3, 4, 5, 6]);
}
