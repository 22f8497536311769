//! Per-channel transfer tables applied by the prescale stage.
//!
//! Each table maps an 8-bit channel index to a corrected value, stored both as an 8-bit entry
//! (plain prescale) and a 16-bit entry (dithered prescale, where the low byte is the fraction).

/// Input transfer characteristic used to linearize source values.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Trc {
    /// Pure power law with per-channel exponent.
    #[default]
    Gamma,
    /// ITU-R BT.709 inverse OETF.
    Itu709,
    /// SMPTE 240M inverse OETF.
    Smpte240,
    /// Identity.
    Linear,
}

impl Trc {
    /// Apply the curve; negative inputs are mirrored.
    pub fn eval(self, gamma: f64, f: f64) -> f64 {
        let v = f.abs();
        let l = match self {
            Self::Gamma => v.powf(gamma),
            Self::Itu709 => {
                if v <= 0.081 {
                    v / 4.5
                } else {
                    ((v + 0.099) / 1.099).powf(1.0 / 0.45)
                }
            }
            Self::Smpte240 => {
                if v <= 0.0912 {
                    v / 4.0
                } else {
                    ((v + 0.1115) / 1.1115).powf(1.0 / 0.45)
                }
            }
            Self::Linear => return f,
        };
        l.copysign(f)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Gamma => 0,
            Self::Itu709 => 1,
            Self::Smpte240 => 2,
            Self::Linear => 3,
        }
    }
}

/// Inputs to table generation, one value per color channel.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LutParams {
    /// Transfer characteristic.
    pub trc: Trc,
    /// Exponent for [`Trc::Gamma`].
    pub gamma: [f32; 3],
    /// Black level lift.
    pub brightness: [f32; 3],
    /// Gain.
    pub contrast: [f32; 3],
}

impl LutParams {
    /// Tables that map every index to itself.
    pub fn identity() -> Self {
        Self {
            trc: Trc::Linear,
            gamma: [1.0; 3],
            brightness: [0.0; 3],
            contrast: [1.0; 3],
        }
    }
}

impl Default for LutParams {
    fn default() -> Self {
        Self {
            trc: Trc::Gamma,
            gamma: [2.2; 3],
            brightness: [0.0; 3],
            contrast: [1.0; 3],
        }
    }
}

/// A 256-entry transfer table for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lut {
    narrow: [u8; 256],
    wide: [u16; 256],
}

impl Lut {
    /// Identity table.
    pub fn identity() -> Self {
        let mut narrow = [0u8; 256];
        let mut wide = [0u16; 256];
        for i in 0..256 {
            narrow[i] = i as u8;
            wide[i] = (i as u16) * 257;
        }
        Self { narrow, wide }
    }

    /// Build the table for channel `ch` (0 = R, 1 = G, 2 = B).
    pub fn build(params: &LutParams, ch: usize) -> Self {
        let ch = ch.min(2);
        let gamma = f64::from(params.gamma[ch]);
        let contrast = f64::from(params.contrast[ch]);
        let brightness = f64::from(params.brightness[ch]);

        let a = params.trc.eval(gamma, contrast);
        let b = if contrast == 0.0 {
            0.0
        } else {
            brightness / contrast
        };

        let mut narrow = [0u8; 256];
        let mut wide = [0u16; 256];
        for i in 0..256 {
            let f = a * params.trc.eval(gamma, i as f64 / 255.0 + b);
            narrow[i] = (f * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
            wide[i] = (f * 65535.0 + 0.5).clamp(0.0, 65535.0) as u16;
        }
        Self { narrow, wide }
    }

    /// 8-bit entry.
    #[inline]
    pub fn narrow(&self, i: u8) -> u8 {
        self.narrow[i as usize]
    }

    /// 16-bit entry; the high byte is the integer part, the low byte the fraction.
    #[inline]
    pub fn wide(&self, i: u8) -> u16 {
        self.wide[i as usize]
    }

    /// `true` when every 8-bit entry is monotonically non-decreasing.
    pub fn is_monotonic(&self) -> bool {
        self.narrow.windows(2).all(|w| w[0] <= w[1])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/lut.rs"]
mod tests;
