//! Bit-level writing of field values into frame buffers.
//!
//! Bits are addressed MSB-first: bit 0 is the high bit of the first byte, and values are written
//! big-endian. Offsets always come from a bootstrapped layout, so an out-of-range write is a bug
//! and panics like any slice indexing.

/// Widest integer field (and user-defined field) the engine writes
pub const MAX_INTEGER_BITS: usize = 64;
/// Widest pattern field (IPv6 addresses)
pub const MAX_PATTERN_BITS: usize = 128;

/// Mask keeping the low `bit_len` bits of a `u64`
pub fn mask(bit_len: usize) -> u64 {
    if bit_len >= 64 {
        u64::MAX
    } else {
        (1 << bit_len) - 1
    }
}

/// Mask keeping the low `bit_len` bits of a `u128`
pub fn mask_u128(bit_len: usize) -> u128 {
    if bit_len >= 128 {
        u128::MAX
    } else {
        (1 << bit_len) - 1
    }
}

/// Write the low `bit_len` bits of `value` at `bit_offset`.
pub fn splice(buf: &mut [u8], bit_offset: usize, bit_len: usize, value: u64) {
    if bit_len == 0 {
        return;
    }
    debug_assert!(bit_len <= MAX_INTEGER_BITS);
    let value = value & mask(bit_len);
    if bit_offset % 8 == 0 && bit_len % 8 == 0 {
        let start = bit_offset / 8;
        let n = bit_len / 8;
        buf[start..start + n].copy_from_slice(&value.to_be_bytes()[8 - n..]);
        return;
    }
    for i in 0..bit_len {
        let bit = ((value >> (bit_len - 1 - i)) & 1) as u8;
        let pos = bit_offset + i;
        let shift = 7 - (pos % 8);
        let byte = &mut buf[pos / 8];
        *byte = (*byte & !(1 << shift)) | (bit << shift);
    }
}

/// Write the low `bit_len` bits of a value up to 128 bits wide.
pub fn splice_wide(buf: &mut [u8], bit_offset: usize, bit_len: usize, value: u128) {
    if bit_len <= MAX_INTEGER_BITS {
        splice(buf, bit_offset, bit_len, value as u64);
    } else {
        debug_assert!(bit_len <= MAX_PATTERN_BITS);
        let high = bit_len - 64;
        splice(buf, bit_offset, high, (value >> 64) as u64);
        splice(buf, bit_offset + high, 64, value as u64);
    }
}

/// Copy raw bytes at `bit_offset`.
pub fn splice_pattern(buf: &mut [u8], bit_offset: usize, bytes: &[u8]) {
    if bit_offset % 8 == 0 {
        let start = bit_offset / 8;
        buf[start..start + bytes.len()].copy_from_slice(bytes);
    } else {
        for (i, b) in bytes.iter().enumerate() {
            splice(buf, bit_offset + 8 * i, 8, *b as u64);
        }
    }
}

/// Write a merge group at once: the first part ends up in the most significant bits.
///
/// Parts are `(bit_len, value)` pairs in declaration order.
pub fn splice_group(buf: &mut [u8], bit_offset: usize, parts: &[(usize, u64)]) {
    let mut merged = 0u64;
    let mut total = 0;
    for (len, value) in parts {
        let shifted = if *len >= 64 { 0 } else { merged << len };
        merged = shifted | (value & mask(*len));
        total += len;
    }
    splice(buf, bit_offset, total, merged);
}

/// Read `bit_len` bits at `bit_offset`, MSB-first.
pub fn extract(buf: &[u8], bit_offset: usize, bit_len: usize) -> u64 {
    debug_assert!(bit_len <= MAX_INTEGER_BITS);
    let mut value = 0u64;
    for pos in bit_offset..bit_offset + bit_len {
        let bit = (buf[pos / 8] >> (7 - (pos % 8))) & 1;
        value = (value << 1) | bit as u64;
    }
    value
}

/// Read up to 128 bits at `bit_offset`.
pub fn extract_wide(buf: &[u8], bit_offset: usize, bit_len: usize) -> u128 {
    if bit_len <= MAX_INTEGER_BITS {
        extract(buf, bit_offset, bit_len) as u128
    } else {
        let high = bit_len - 64;
        ((extract(buf, bit_offset, high) as u128) << 64)
            | extract(buf, bit_offset + high, 64) as u128
    }
}
