/// Texel layout of a surface plane.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Packed 15-bit color, red in the low bits, 2 bytes per pixel (little endian).
    Bgr555,
    /// Packed 8-bit RGBA, 4 bytes per pixel.
    Rgba8,
    /// Single-channel intensity, 1 byte per pixel.
    I8,
    /// Single-channel index into a 256-entry lookup table, 1 byte per pixel.
    Ci8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr555 => 2,
            Self::Rgba8 => 4,
            Self::I8 | Self::Ci8 => 1,
        }
    }

    /// `true` for formats that carry one color channel per plane.
    pub fn is_single_channel(self) -> bool {
        matches!(self, Self::I8 | Self::Ci8)
    }

    /// `true` for indexed formats that own a lookup table per plane.
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Ci8)
    }

    /// Plane size in bytes, `None` on overflow.
    pub fn plane_bytes(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }

    /// Stable tag used by command-block encoding.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Bgr555 => 0,
            Self::Rgba8 => 1,
            Self::I8 => 2,
            Self::Ci8 => 3,
        }
    }
}
