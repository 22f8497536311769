use crate::foundation::error::{GxError, GxResult};
use crate::surface::format::PixelFormat;

/// Pixel layout of frames produced by the emulator core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawFormat {
    /// 15-bit color in 16-bit little-endian words, red in the low bits.
    #[default]
    Bgr555,
    /// 8-bit RGBA.
    Rgba8888,
}

impl RawFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr555 => 2,
            Self::Rgba8888 => 4,
        }
    }

    /// Format of the convert surface holding these frames.
    pub fn surface_format(self) -> PixelFormat {
        match self {
            Self::Bgr555 => PixelFormat::Bgr555,
            Self::Rgba8888 => PixelFormat::Rgba8,
        }
    }
}

/// Video geometry reported by the core at session start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VideoGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame layout.
    pub format: RawFormat,
}

impl VideoGeometry {
    /// Handheld LCD geometry (240x160, 15-bit).
    pub fn handheld() -> Self {
        Self {
            width: 240,
            height: 160,
            format: RawFormat::Bgr555,
        }
    }
}

/// One frame as produced by the core; rows are `stride` bytes apart.
#[derive(Clone, Copy, Debug)]
pub struct RawFrame<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes between row starts.
    pub stride: usize,
    /// Pixel layout.
    pub format: RawFormat,
    /// Pixel bytes.
    pub data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Tightly packed frame.
    pub fn packed(width: u32, height: u32, format: RawFormat, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data,
        }
    }

    /// Check the frame against the session geometry and its own buffer.
    pub fn validate(&self, geometry: VideoGeometry) -> GxResult<()> {
        if self.width != geometry.width
            || self.height != geometry.height
            || self.format != geometry.format
        {
            return Err(GxError::validation(format!(
                "frame is {}x{} {:?}, session expects {}x{} {:?}",
                self.width,
                self.height,
                self.format,
                geometry.width,
                geometry.height,
                geometry.format
            )));
        }
        let row = self.width as usize * self.format.bytes_per_pixel();
        if self.stride < row {
            return Err(GxError::validation(format!(
                "stride {} is shorter than a {row}-byte row",
                self.stride
            )));
        }
        let needed = self
            .stride
            .checked_mul(self.height.saturating_sub(1) as usize)
            .and_then(|b| b.checked_add(row))
            .ok_or_else(|| GxError::validation("frame size overflows"))?;
        if self.data.len() < needed {
            return Err(GxError::validation(format!(
                "frame buffer holds {} bytes, needs {needed}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Row `y` without padding.
    pub(crate) fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.format.bytes_per_pixel()]
    }
}
