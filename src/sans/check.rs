//! The document's cyclic redundancy check.

/// Nibble lookup table for the CRC-16 polynomial used by the format.
const TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800, 0xB401,
    0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Accumulate a slice of bytes into a cyclic redundancy check value.
///
/// A document is valid when the value over its header and records equals the
/// little-endian `u16` that follows them.
pub fn compute_crc(init: u16, r: &[u8]) -> u16 {
    r.iter()
        .fold(init, |crc, b| nibble(nibble(crc, b & 0x0F), b >> 4))
}

fn nibble(crc: u16, n: u8) -> u16 {
    (crc >> 4) ^ TABLE[(crc & 0x0F) as usize] ^ TABLE[n as usize]
}
