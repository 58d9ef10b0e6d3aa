//! Incrementing byte pattern for data-integrity checks
//!
//! Byte `i` of buffer number `seq` is `(seq + i) mod 256`. Consecutive
//! buffers therefore differ even when they are the same length, so a
//! dropped or repeated buffer shows up as a mismatch at offset 0.

use crate::error::{HardwareError, HwResult};

#[inline]
fn expected(seq: u64, offset: usize) -> u8 {
    (seq as u8).wrapping_add(offset as u8)
}

/// Fill `buf` with the pattern for buffer number `seq`
pub fn fill(buf: &mut [u8], seq: u64) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b = expected(seq, i);
    }
}

/// Check `buf` against the pattern for buffer number `seq`.
///
/// Reports the first differing byte.
pub fn verify(buf: &[u8], seq: u64) -> HwResult<()> {
    match buf.iter().enumerate().find(|(i, b)| **b != expected(seq, *i)) {
        None => Ok(()),
        Some((offset, actual)) => Err(HardwareError::DataMismatch {
            offset,
            expected: expected(seq, offset),
            actual: *actual,
        }),
    }
}
