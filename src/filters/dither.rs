//! Ordered dither patterns and the quantizer shared by prescale and cross-fade.
//!
//! Pattern entries lie in `0x60..=0x9F`; `4 * (p - 128)` turns them into an offset of up to half
//! an output step either way before the 16-bit value is truncated to 8 bits.

use crate::config::options::DitherMode;

#[rustfmt::skip]
pub(crate) const BAYER_8X8: [u8; 64] = [
    0x60, 0x90, 0x6C, 0x9C, 0x63, 0x93, 0x6F, 0x9F,
    0x80, 0x70, 0x8C, 0x7C, 0x83, 0x73, 0x8F, 0x7F,
    0x68, 0x98, 0x64, 0x94, 0x6B, 0x9B, 0x67, 0x97,
    0x88, 0x78, 0x84, 0x74, 0x8B, 0x7B, 0x87, 0x77,
    0x62, 0x92, 0x6E, 0x9E, 0x61, 0x91, 0x6D, 0x9D,
    0x82, 0x72, 0x8E, 0x7E, 0x81, 0x71, 0x8D, 0x7D,
    0x6A, 0x9A, 0x66, 0x96, 0x69, 0x99, 0x65, 0x95,
    0x8A, 0x7A, 0x86, 0x76, 0x89, 0x79, 0x85, 0x75,
];

#[rustfmt::skip]
pub(crate) const CLUSTER_8X8: [u8; 64] = [
    0x78, 0x6A, 0x6C, 0x7A, 0x83, 0x8F, 0x91, 0x85,
    0x68, 0x60, 0x62, 0x6E, 0x8D, 0x9B, 0x9D, 0x93,
    0x76, 0x66, 0x64, 0x70, 0x8B, 0x99, 0x9F, 0x95,
    0x7E, 0x74, 0x72, 0x7C, 0x81, 0x89, 0x97, 0x87,
    0x82, 0x8E, 0x90, 0x84, 0x79, 0x6B, 0x6D, 0x7B,
    0x8C, 0x9A, 0x9C, 0x92, 0x69, 0x61, 0x63, 0x6F,
    0x8A, 0x98, 0x9E, 0x94, 0x77, 0x67, 0x65, 0x71,
    0x80, 0x88, 0x96, 0x86, 0x7F, 0x75, 0x73, 0x7D,
];

// Top-left 2x2 of the Bayer table, clockwise from the origin.
const BAYER_2X2_RING: [u8; 4] = [0x60, 0x90, 0x70, 0x80];

// Quarter of an output step in 16-bit units.
const QUARTER_LSB: i32 = 64;

/// Pattern value at `(x, y)`; `idx` drives the temporal variants.
pub(crate) fn pattern(mode: DitherMode, x: u32, y: u32, idx: u64) -> Option<u8> {
    let cell = |table: &[u8; 64], mask: u32| table[((y & mask) * 8 + (x & mask)) as usize];
    match mode {
        DitherMode::None | DitherMode::Threshold => None,
        DitherMode::Bayer8x8 => Some(cell(&BAYER_8X8, 7)),
        DitherMode::Bayer4x4 => Some(cell(&BAYER_8X8, 3)),
        DitherMode::Cluster8x8 => Some(cell(&CLUSTER_8X8, 7)),
        DitherMode::Cluster4x4 => Some(cell(&CLUSTER_8X8, 3)),
        DitherMode::Bayer2x2 => {
            let pos = match (x & 1, y & 1) {
                (0, 0) => 0,
                (1, 0) => 1,
                (1, 1) => 2,
                _ => 3,
            };
            Some(BAYER_2X2_RING[((pos + idx) % 4) as usize])
        }
    }
}

/// Offset added to `v16 + 128` before truncation.
pub(crate) fn offset(mode: DitherMode, x: u32, y: u32, idx: u64) -> i32 {
    match mode {
        DitherMode::None => 0,
        DitherMode::Threshold => {
            if idx % 2 == 0 {
                QUARTER_LSB
            } else {
                -QUARTER_LSB
            }
        }
        _ => pattern(mode, x, y, idx).map_or(0, |p| 4 * (i32::from(p) - 128)),
    }
}

/// `clamp(floor((v16 + 128 + offset) / 256))`.
#[inline]
pub(crate) fn quantize(v16: u32, offset: i32) -> u8 {
    let v = i64::from(v16) + 128 + i64::from(offset);
    v.div_euclid(256).clamp(0, 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/filters/dither.rs"]
mod tests;
