//! Per-pixel algorithms executed by the software renderer.

pub(crate) mod dither;
pub(crate) mod packed;
pub(crate) mod planar;
pub(crate) mod prescale;
pub(crate) mod preview;
pub(crate) mod scale2x;

use crate::foundation::core::{Rect, Rgb8};
use crate::memory::cache::TexView;
use crate::surface::format::PixelFormat;
use smallvec::SmallVec;

/// Contiguous copy of one resolved slot, addressed relative to its valid rectangle.
///
/// Reads outside the rectangle clamp to the nearest edge pixel.
#[derive(Clone, Debug)]
pub(crate) struct Texels {
    width: u32,
    format: PixelFormat,
    rect: Rect,
    planes: SmallVec<[Vec<u8>; 3]>,
}

impl Texels {
    pub(crate) fn from_view(v: &TexView<'_>) -> Self {
        Self {
            width: v.width,
            format: v.format,
            rect: v.rect,
            planes: v.planes.iter().map(|p| p.to_vec()).collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_planes(
        width: u32,
        height: u32,
        format: PixelFormat,
        planes: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            width,
            format,
            rect: Rect::sized(width, height),
            planes: planes.into_iter().collect(),
        }
    }

    pub(crate) fn w(&self) -> u32 {
        self.rect.w
    }

    pub(crate) fn h(&self) -> u32 {
        self.rect.h
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> usize {
        let x = x.clamp(0, i64::from(self.rect.w) - 1) as usize + self.rect.x as usize;
        let y = y.clamp(0, i64::from(self.rect.h) - 1) as usize + self.rect.y as usize;
        y * self.width as usize + x
    }

    /// Color at `(x, y)`; single-channel surfaces combine their planes.
    #[inline]
    pub(crate) fn rgb(&self, x: i64, y: i64) -> [u8; 3] {
        let i = self.index(x, y);
        match self.format {
            PixelFormat::Bgr555 => {
                let p = &self.planes[0];
                Rgb8::from_bgr555(u16::from_le_bytes([p[i * 2], p[i * 2 + 1]])).to_array()
            }
            PixelFormat::Rgba8 => {
                let p = &self.planes[0];
                [p[i * 4], p[i * 4 + 1], p[i * 4 + 2]]
            }
            PixelFormat::I8 | PixelFormat::Ci8 => {
                let last = self.planes.len() - 1;
                [
                    self.planes[0][i],
                    self.planes[1.min(last)][i],
                    self.planes[2.min(last)][i],
                ]
            }
        }
    }

    /// Raw byte of single-channel plane `plane` at `(x, y)`.
    #[inline]
    pub(crate) fn channel(&self, plane: usize, x: i64, y: i64) -> u8 {
        self.planes[plane][self.index(x, y)]
    }
}

/// Nearest source coordinate for destination `d` when mapping `src` pixels onto `dst` pixels.
#[inline]
pub(crate) fn nearest(d: u32, dst: u32, src: u32) -> i64 {
    (u64::from(d) * u64::from(src) / u64::from(dst.max(1))) as i64
}
