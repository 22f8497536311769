//! Reference-display color profiles: transfer curve, gain/lift and primaries matrix bundles.

use crate::surface::lut::{LutParams, Trc};

/// Primaries matrix applied by the preview compose stage.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorMatrix {
    /// Pass-through.
    Identity,
    /// Original handheld LCD (shared by the color handheld).
    Gba,
    /// Television adapter output.
    #[default]
    Gbi,
    /// Dual-screen handheld.
    Nds,
    /// Palm-sized organizer LCD.
    Palm,
    /// Widescreen handheld.
    Psp,
    /// Emulator-community correction curve.
    Vba,
}

/// Integer coefficients of a primaries matrix.
///
/// `k[p][c]` is the contribution (out of 255) of input plane `p` to output channel `c`;
/// `k[3]` is the luma row used for monochrome output. `c[p][c]` is a per-plane signed bias in
/// output units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixCoeffs {
    /// Plane-to-channel gains plus the luma row.
    pub k: [[u8; 3]; 4],
    /// Per-plane bias.
    pub c: [[i16; 3]; 3],
}

impl ColorMatrix {
    /// Coefficient table.
    pub fn coeffs(self) -> MatrixCoeffs {
        let (k, edge) = match self {
            Self::Identity => (
                [[255, 0, 0], [0, 255, 0], [0, 0, 255], [54, 182, 18]],
                0,
            ),
            Self::Gba => (
                [[209, 32, 50], [61, 170, 19], [0, 54, 186], [71, 136, 48]],
                15,
            ),
            Self::Gbi => (
                [[238, 12, 7], [45, 195, 9], [0, 48, 239], [60, 149, 46]],
                27,
            ),
            Self::Nds => (
                [[222, 26, 26], [65, 164, 43], [0, 65, 186], [67, 135, 53]],
                32,
            ),
            Self::Palm => (
                [[212, 19, 22], [66, 173, 31], [0, 64, 203], [60, 140, 55]],
                23,
            ),
            Self::Psp => (
                [[250, 10, 3], [51, 203, 3], [0, 42, 250], [61, 156, 38]],
                46,
            ),
            Self::Vba => (
                [[186, 22, 22], [69, 172, 61], [0, 61, 172], [57, 142, 56]],
                0,
            ),
        };
        // Red-channel bias applied on the first plane and cancelled on the last.
        MatrixCoeffs {
            k,
            c: [[-edge, 0, 0], [0, 0, 0], [edge, 0, 0]],
        }
    }
}

/// Rendering intent; selects between gamut-mapped, colorimetric and raw matrices.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Perceptual (with white/black point compensation).
    #[default]
    Perceptual,
    /// Relative colorimetric.
    Relative,
    /// Saturation (identity matrix).
    Saturation,
    /// Absolute colorimetric.
    Absolute,
}

/// Named reference display.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Plain sRGB, no correction.
    Srgb,
    /// Emulator-community GBC correction.
    Gambatte,
    /// Original handheld.
    Gba,
    /// Front-lit handheld.
    GbaSp,
    /// Color handheld.
    Gbc,
    /// Television adapter.
    #[default]
    Gbi,
    /// High-color hack curve.
    HiColour,
    /// Accuracy-focused emulator curve.
    Higan,
    /// Dual-screen handheld.
    Nds,
    /// Palm-sized organizer.
    Palm,
    /// Widescreen handheld.
    Psp,
}

/// Everything a profile decides.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileBundle {
    /// Primaries matrix.
    pub matrix: ColorMatrix,
    /// Input linearization tables.
    pub lut: LutParams,
    /// Final display encode exponent.
    pub output_gamma: f32,
}

impl Profile {
    /// Resolve the bundle for `intent`.
    pub fn bundle(self, intent: Intent) -> ProfileBundle {
        let perceptual = intent == Intent::Perceptual;
        let (matrix, trc, gamma, output_gamma, brightness, contrast) = match self {
            Self::Srgb => (ColorMatrix::Identity, Trc::Linear, 1.0, 1.0, 0.0, 1.0),
            Self::Gambatte => (ColorMatrix::Vba, Trc::Linear, 1.0, 1.0, 0.0, 1.0),
            Self::Gba => lifted(
                ColorMatrix::Gba,
                4.0,
                1.0 / 250.0,
                perceptual.then_some(1.0 / 1.075),
            ),
            Self::GbaSp => lifted(
                ColorMatrix::Gba,
                2.2,
                1.0 / 600.0,
                perceptual.then_some(1.0 / 1.065 * 1.0275),
            ),
            Self::Gbc => lifted(
                ColorMatrix::Gba,
                2.2,
                1.0 / 75.0,
                perceptual.then_some(1.0 / 1.075),
            ),
            Self::Gbi => (ColorMatrix::Gbi, Trc::Smpte240, 1.0 / 0.45, 2.2, 0.0, 1.0),
            Self::HiColour => (ColorMatrix::Identity, Trc::Gamma, 1.0, 1.7, 0.0, 1.12),
            Self::Higan => (
                ColorMatrix::Gba,
                Trc::Gamma,
                4.0,
                2.2,
                0.0,
                (255.0f64 / 280.0).powf(2.2 / 4.0),
            ),
            Self::Nds => lifted(
                ColorMatrix::Nds,
                2.2,
                1.0 / 600.0,
                perceptual.then_some(1.0 / 1.09),
            ),
            Self::Palm => lifted(
                ColorMatrix::Palm,
                2.2,
                1.0 / 75.0,
                perceptual.then_some(1.0 / 1.125),
            ),
            Self::Psp => lifted(
                ColorMatrix::Psp,
                2.2,
                1.0 / 750.0,
                perceptual.then_some(1.0 / 1.15),
            ),
        };
        let matrix = if intent == Intent::Saturation {
            ColorMatrix::Identity
        } else {
            matrix
        };
        ProfileBundle {
            matrix,
            lut: LutParams {
                trc,
                gamma: [gamma as f32; 3],
                brightness: [brightness as f32; 3],
                contrast: [contrast as f32; 3],
            },
            output_gamma: output_gamma as f32,
        }
    }
}

// Gamma-encoded black level and white compensation, with contrast measured from the lifted black.
fn lifted(
    matrix: ColorMatrix,
    gamma: f64,
    black: f64,
    white: Option<f64>,
) -> (ColorMatrix, Trc, f64, f64, f64, f64) {
    let brightness = black.powf(1.0 / gamma);
    let contrast = white.map_or(1.0, |w| w.powf(1.0 / gamma)) - brightness;
    (matrix, Trc::Gamma, gamma, 2.2, brightness, contrast)
}

#[cfg(test)]
#[path = "../../tests/unit/config/profile.rs"]
mod tests;
