use crate::foundation::math::lerp255;

/// BT.601 studio-range RGB → Y/Cb/Cr.
pub(crate) fn rgb_to_yuv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let cb = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let cr = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    [y as u8, cb as u8, cr as u8]
}

/// One step of the running average: `lerp(prev, cur, k)` per channel.
pub(crate) fn accumulate(prev: [u8; 3], cur: [u8; 3], k: [u8; 3]) -> [u8; 3] {
    [
        lerp255(prev[0], cur[0], k[0]),
        lerp255(prev[1], cur[1], k[1]),
        lerp255(prev[2], cur[2], k[2]),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/filters/packed.rs"]
mod tests;
