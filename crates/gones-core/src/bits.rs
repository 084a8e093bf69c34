//! Single-bit helpers.
//!
//! Bit positions count from 0 (least significant) to 7.

/// Returns true if bit `n` of `x` is set.
#[inline]
pub fn test_bit(x: u8, n: u8) -> bool {
    x & (1 << n) != 0
}

/// Returns `x` with bit `n` set.
#[inline]
pub fn set_bit(x: u8, n: u8) -> u8 {
    x | (1 << n)
}

/// Returns bit `n` of `x` as 0 or 1.
#[inline]
pub fn bit(x: u8, n: u8) -> u8 {
    (x >> n) & 1
}
