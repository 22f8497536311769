use crate::config::options::DitherMode;
use crate::filters::dither::{offset, quantize};
use crate::filters::{Texels, nearest};
use crate::surface::lut::Lut;
use smallvec::SmallVec;

/// Prescale pixel `(x, y)` of a `dw`x`dh` output resampled from `src`.
///
/// `dither` is `None` for the 8-bit table path. The temporal index of channel `ch` is
/// `retrace + ch`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn prescale_pixel(
    src: &Texels,
    luts: &[&Lut],
    dither: Option<DitherMode>,
    retrace: u64,
    dw: u32,
    dh: u32,
    x: u32,
    y: u32,
) -> [u8; 3] {
    let sx = nearest(x, dw, src.w());
    let sy = nearest(y, dh, src.h());
    let mut out = [0u8; 3];
    for (ch, o) in out.iter_mut().enumerate() {
        let v = src.channel(ch, sx, sy);
        *o = match dither {
            None => luts[ch].narrow(v),
            Some(mode) => quantize(
                u32::from(luts[ch].wide(v)),
                offset(mode, x, y, retrace.wrapping_add(ch as u64)),
            ),
        };
    }
    out
}

/// Fixed-point weights of an attenuated stack, bottom source first.
///
/// Source `i` weighs `(1 - a_i/255) * prod_{j>i} a_j/255`; every weight shares `denom`.
#[derive(Clone, Debug)]
pub(crate) struct FadeWeights {
    pub(crate) weights: SmallVec<[u128; 8]>,
    pub(crate) denom: u128,
}

impl FadeWeights {
    pub(crate) fn new(alphas: &[u8]) -> Self {
        let n = alphas.len() as u32;
        let weights = (0..alphas.len())
            .map(|i| {
                let above: u128 = alphas[i + 1..].iter().map(|&a| u128::from(a)).product();
                u128::from(255 - alphas[i]) * above * 255u128.pow(i as u32)
            })
            .collect();
        Self {
            weights,
            denom: 255u128.pow(n),
        }
    }

    /// Weighted 16-bit sum, rounded.
    pub(crate) fn mix(&self, values: impl Iterator<Item = u16>) -> u32 {
        let acc: u128 = self
            .weights
            .iter()
            .zip(values)
            .map(|(w, v)| w * u128::from(v))
            .sum();
        ((acc + self.denom / 2) / self.denom) as u32
    }
}

/// Cross-fade pixel `(x, y)`: every source through its own 16-bit table, attenuated, summed and
/// quantized.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fade_pixel(
    sources: &[(Texels, SmallVec<[&Lut; 3]>)],
    weights: &FadeWeights,
    dither: DitherMode,
    retrace: u64,
    dw: u32,
    dh: u32,
    x: u32,
    y: u32,
) -> [u8; 3] {
    let mut out = [0u8; 3];
    for (ch, o) in out.iter_mut().enumerate() {
        let v16 = weights.mix(sources.iter().map(|(src, luts)| {
            let sx = nearest(x, dw, src.w());
            let sy = nearest(y, dh, src.h());
            luts[ch].wide(src.channel(ch, sx, sy))
        }));
        *o = match dither {
            DitherMode::None => quantize(v16, 0),
            mode => quantize(v16, offset(mode, x, y, retrace.wrapping_add(ch as u64))),
        };
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/filters/prescale.rs"]
mod tests;
