//! Preview compose: primaries matrix, magnification and output encode.

use crate::config::options::ScalerKind;
use crate::config::profile::MatrixCoeffs;
use crate::foundation::math::clamp_u8;

/// Matrix one planar triple into RGB.
///
/// `out_c = clamp((sum_p plane_p * K[p][c] + 255 * sum_p C[p][c] + 127) / 255)`; the monochrome
/// variant writes the luma row to every channel.
pub(crate) fn compose(m: &MatrixCoeffs, mono: bool, planes: [u8; 3]) -> [u8; 3] {
    if mono {
        let y: u32 = (0..3)
            .map(|p| u32::from(planes[p]) * u32::from(m.k[3][p]))
            .sum();
        let y = ((y + 127) / 255).min(255) as u8;
        return [y; 3];
    }
    let mut out = [0u8; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let mut sum = 0i32;
        for p in 0..3 {
            sum += i32::from(planes[p]) * i32::from(m.k[p][c]) + 255 * i32::from(m.c[p][c]);
        }
        *o = clamp_u8((sum + 127).div_euclid(255));
    }
    out
}

/// Host-side RGB image used between compose and magnification.
#[derive(Clone, Debug)]
pub(crate) struct RgbImage {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) data: Vec<u8>,
}

impl RgbImage {
    #[inline]
    fn px(&self, x: i64, y: i64) -> [u8; 3] {
        let x = x.clamp(0, i64::from(self.w) - 1) as usize;
        let y = y.clamp(0, i64::from(self.h) - 1) as usize;
        let i = (y * self.w as usize + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Destination pixel `(x, y)` of a `dw`x`dh` magnification of `img`.
pub(crate) fn sample(scaler: ScalerKind, img: &RgbImage, dw: u32, dh: u32, x: u32, y: u32) -> [u8; 3] {
    let (sw, sh) = (u64::from(img.w), u64::from(img.h));
    let (dw64, dh64) = (u64::from(dw.max(1)), u64::from(dh.max(1)));
    let (x64, y64) = (u64::from(x), u64::from(y));
    match scaler {
        ScalerKind::Nearest => img.px((x64 * sw / dw64) as i64, (y64 * sh / dh64) as i64),
        ScalerKind::Box => {
            // Sample points at quarter offsets inside the destination pixel.
            let xa = ((4 * x64 + 1) * sw / (4 * dw64)) as i64;
            let xb = ((4 * x64 + 3) * sw / (4 * dw64)) as i64;
            let ya = ((4 * y64 + 1) * sh / (4 * dh64)) as i64;
            let yb = ((4 * y64 + 3) * sh / (4 * dh64)) as i64;
            let s = [img.px(xa, ya), img.px(xb, ya), img.px(xa, yb), img.px(xb, yb)];
            let mut out = [0u8; 3];
            for (c, o) in out.iter_mut().enumerate() {
                let t: u32 = s.iter().map(|p| u32::from(p[c])).sum();
                *o = ((t + 2) / 4) as u8;
            }
            out
        }
        ScalerKind::Bilinear => {
            let (x0, fx) = bilinear_coord(x64, sw, dw64);
            let (y0, fy) = bilinear_coord(y64, sh, dh64);
            let p00 = img.px(x0, y0);
            let p10 = img.px(x0 + 1, y0);
            let p01 = img.px(x0, y0 + 1);
            let p11 = img.px(x0 + 1, y0 + 1);
            let mut out = [0u8; 3];
            for (c, o) in out.iter_mut().enumerate() {
                let top = u32::from(p00[c]) * (256 - fx) + u32::from(p10[c]) * fx;
                let bot = u32::from(p01[c]) * (256 - fx) + u32::from(p11[c]) * fx;
                *o = ((top * (256 - fy) + bot * fy + 32768) >> 16) as u8;
            }
            out
        }
        ScalerKind::Area => {
            // Source pixel i covers [i*dw, (i+1)*dw); destination pixel x covers [x*sw, (x+1)*sw).
            let xs = coverage(x64, sw, dw64);
            let ys = coverage(y64, sh, dh64);
            let mut acc = [0u64; 3];
            for &(sy, wy) in &ys {
                for &(sx, wx) in &xs {
                    let p = img.px(sx as i64, sy as i64);
                    for c in 0..3 {
                        acc[c] += u64::from(p[c]) * wx * wy;
                    }
                }
            }
            let total = sw * sh;
            acc.map(|a| ((a + total / 2) / total).min(255) as u8)
        }
    }
}

// Pixel-center mapping in 8.8 fixed point; returns the left/top tap and the weight of the next.
fn bilinear_coord(d: u64, src: u64, dst: u64) -> (i64, u32) {
    let pos = ((2 * d + 1) * src * 256 / (2 * dst)) as i64 - 128;
    let pos = pos.max(0);
    (pos >> 8, (pos & 255) as u32)
}

fn coverage(d: u64, src: u64, dst: u64) -> smallvec::SmallVec<[(u64, u64); 4]> {
    let lo = d * src;
    let hi = lo + src;
    let mut out = smallvec::SmallVec::new();
    let mut i = lo / dst;
    while i * dst < hi && i < src {
        let a = lo.max(i * dst);
        let b = hi.min((i + 1) * dst);
        if b > a {
            out.push((i, b - a));
        }
        i += 1;
    }
    out
}

/// Output encode table `255 * (i / 255)^(1 / gamma)`.
pub(crate) fn gamma_table(gamma: f32) -> [u8; 256] {
    let mut t = [0u8; 256];
    let inv = 1.0 / f64::from(gamma);
    for (i, v) in t.iter_mut().enumerate() {
        *v = (255.0 * (i as f64 / 255.0).powf(inv) + 0.5).clamp(0.0, 255.0) as u8;
    }
    t
}

#[cfg(test)]
#[path = "../../tests/unit/filters/preview.rs"]
mod tests;
