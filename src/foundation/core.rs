use crate::foundation::error::{GxError, GxResult};
use crate::foundation::math::sin_cos_deg;

/// Display retrace counter captured at the start of a frame.
///
/// Drives the temporal dither toggle, so two sessions fed the same retrace sequence produce
/// identical output.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Retrace(pub u64);

impl Retrace {
    /// Next retrace.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Low bit of the counter.
    pub fn parity(self) -> u32 {
        (self.0 & 1) as u32
    }

    /// Field scanned out on this retrace when the output alternates fields.
    pub fn field(self) -> Field {
        if self.parity() == 0 {
            Field::Even
        } else {
            Field::Odd
        }
    }
}

/// Interlaced field selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Even output lines.
    #[default]
    Even,
    /// Odd output lines.
    Odd,
}

impl Field {
    /// `0` for even, `1` for odd.
    pub fn index(self) -> u32 {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }
}

/// Integer pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

impl Rect {
    /// Rectangle anchored at the origin.
    pub fn sized(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }

    /// Pixel count.
    pub fn area(self) -> usize {
        (self.w as usize).saturating_mul(self.h as usize)
    }

    /// `true` when `self` lies within a `w`x`h` surface.
    pub fn fits_in(self, w: u32, h: u32) -> bool {
        self.x.checked_add(self.w).is_some_and(|r| r <= w)
            && self.y.checked_add(self.h).is_some_and(|b| b <= h)
    }

    /// Scale width and height by integer factors.
    pub fn scaled(self, sx: u32, sy: u32) -> Self {
        Self {
            x: self.x.saturating_mul(sx),
            y: self.y.saturating_mul(sy),
            w: self.w.saturating_mul(sx),
            h: self.h.saturating_mul(sy),
        }
    }
}

/// Where the preview quad lands in the output frame.
///
/// The quad is `w`x`h` pixels with its top-left corner at `(x, y)` before rotation; it turns
/// clockwise by `rotation` degrees about its center. Frame pixels outside it stay black.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quad {
    /// Left edge, may be negative.
    pub x: i32,
    /// Top edge, may be negative.
    pub y: i32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
    /// Clockwise rotation in degrees.
    pub rotation: f32,
}

impl Quad {
    /// Unrotated quad filling a `w`x`h` frame.
    pub fn covering(w: u32, h: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w,
            h,
            rotation: 0.0,
        }
    }

    /// `true` when the quad maps a `w`x`h` frame one to one.
    pub fn covers(self, w: u32, h: u32) -> bool {
        self == Self::covering(w, h)
    }

    /// The quad moved by a viewport offset.
    pub fn shifted(self, [dx, dy]: [i32; 2]) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..self
        }
    }

    /// Quad-local pixel under the center of frame pixel `(x, y)`, or `None` outside the quad.
    pub fn locate(self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (sin, cos) = sin_cos_deg(self.rotation);
        let (hw, hh) = (f64::from(self.w) / 2.0, f64::from(self.h) / 2.0);
        let dx = f64::from(x) + 0.5 - (f64::from(self.x) + hw);
        let dy = f64::from(y) + 0.5 - (f64::from(self.y) + hh);
        let u = dx * cos + dy * sin + hw;
        let v = dy * cos - dx * sin + hh;
        if u < 0.0 || v < 0.0 || u >= f64::from(self.w) || v >= f64::from(self.h) {
            return None;
        }
        Some((u as u32, v as u32))
    }
}

/// Presentation zoom factors (destination pixels per source pixel).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Zoom {
    /// Horizontal factor.
    pub x: f32,
    /// Vertical factor.
    pub y: f32,
}

impl Zoom {
    /// Validated zoom; both factors must be finite and in `(0, 16]`.
    pub fn new(x: f32, y: f32) -> GxResult<Self> {
        for v in [x, y] {
            if !v.is_finite() || v <= 0.0 || v > 16.0 {
                return Err(GxError::validation("zoom factors must be in (0, 16]"));
            }
        }
        Ok(Self { x, y })
    }

    /// Unit zoom.
    pub fn one() -> Self {
        Self { x: 1.0, y: 1.0 }
    }

    /// Destination size for a `w`x`h` source, rounded to nearest and at least one pixel.
    pub fn apply(self, w: u32, h: u32) -> (u32, u32) {
        let dw = (w as f32 * self.x).round().max(1.0) as u32;
        let dh = (h as f32 * self.y).round().max(1.0) as u32;
        (dw, dh)
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self { x: 2.0, y: 2.0 }
    }
}

/// 8-bit RGB triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb8 {
    /// Construct from components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Uniform gray.
    pub const fn gray(v: u8) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// Components as an array in R, G, B order.
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Component by channel index (0 = R, 1 = G, 2 = B).
    pub fn channel(self, ch: usize) -> u8 {
        match ch {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }

    /// Expand a BGR555 word (red in the low bits) to 8 bits per channel.
    pub fn from_bgr555(v: u16) -> Self {
        fn expand(c: u16) -> u8 {
            let c = (c & 0x1f) as u8;
            (c << 3) | (c >> 2)
        }
        Self {
            r: expand(v),
            g: expand(v >> 5),
            b: expand(v >> 10),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
