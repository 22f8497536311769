use crate::config::profile::{ColorMatrix, Intent, Profile, ProfileBundle};
use crate::foundation::core::{Quad, Rect, Zoom};
use crate::foundation::error::{GxError, GxResult};
use crate::foundation::math::weight_to_byte;
use crate::memory::arena::TMEM_BYTES;
use crate::memory::cache::CacheOpts;
use crate::surface::lut::Trc;

/// Filter applied while splitting the converted frame into planes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Plain copy.
    #[default]
    None,
    /// Two-frame temporal blend.
    Blend,
    /// Three-tap flicker removal.
    Deflicker,
    /// Running average held in the packed surface.
    Accumulate,
    /// Scale2x with YUV similarity and soft blending.
    Scale2xEx,
    /// Scale2x with a 50/50 blend on edges.
    Scale2xPlus,
    /// Classic Scale2x.
    Scale2x,
    /// Eagle corner matching.
    Eagle2x,
    /// Scanlines.
    Scan2x,
    /// Nearest 2x.
    Normal2x,
}

impl FilterKind {
    /// `true` for filters that produce a 2x image.
    pub fn is_2x(self) -> bool {
        matches!(
            self,
            Self::Scale2xEx
                | Self::Scale2xPlus
                | Self::Scale2x
                | Self::Eagle2x
                | Self::Scan2x
                | Self::Normal2x
        )
    }

    /// Deepest history read from the convert surface.
    pub fn look_back(self) -> usize {
        match self {
            Self::Blend => 1,
            Self::Deflicker => 2,
            _ => 0,
        }
    }

    /// `true` when the filter needs the intermediate packed surface.
    pub fn needs_packed(self) -> bool {
        matches!(self, Self::Accumulate | Self::Scale2xEx)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Blend => 1,
            Self::Deflicker => 2,
            Self::Accumulate => 3,
            Self::Scale2xEx => 4,
            Self::Scale2xPlus => 5,
            Self::Scale2x => 6,
            Self::Eagle2x => 7,
            Self::Scan2x => 8,
            Self::Normal2x => 9,
        }
    }
}

/// Quantization used by the prescale stage.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DitherMode {
    /// Round through the 8-bit table.
    None,
    /// Temporal quarter-LSB toggle.
    #[default]
    Threshold,
    /// Ordered Bayer 8x8.
    Bayer8x8,
    /// Ordered Bayer 4x4.
    Bayer4x4,
    /// Rotating Bayer 2x2.
    Bayer2x2,
    /// Clustered dot 8x8.
    Cluster8x8,
    /// Clustered dot 4x4.
    Cluster4x4,
}

impl DitherMode {
    /// `true` for modes that never fetch a pattern texture.
    pub fn is_fast(self) -> bool {
        matches!(self, Self::Threshold | Self::Bayer2x2)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Threshold => 1,
            Self::Bayer8x8 => 2,
            Self::Bayer4x4 => 3,
            Self::Bayer2x2 => 4,
            Self::Cluster8x8 => 5,
            Self::Cluster4x4 => 6,
        }
    }
}

/// Magnification used by the preview compose stage.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Point sampling.
    Nearest,
    /// Bilinear filtering.
    Bilinear,
    /// Pixel-coverage average.
    #[default]
    Area,
    /// 2x2 supersample.
    Box,
}

impl ScalerKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Nearest => 0,
            Self::Bilinear => 1,
            Self::Area => 2,
            Self::Box => 3,
        }
    }
}

/// Largest integer prescale factor.
pub const MAX_SCALE: u32 = 4;

/// Largest viewport or destination extent, in pixels.
pub const MAX_EXTENT: u32 = 8192;

/// Session options.
///
/// Every effective change made through [`SessionConfig::update`] bumps the generation counter;
/// stages configured under an older generation rebuild themselves on their next apply.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Planar-split filter.
    pub filter: FilterKind,
    /// Per-channel weight of the current frame for temporal filters, in `0..=1`.
    pub filter_weight: [f32; 3],
    /// Prescale quantization.
    pub dither: DitherMode,
    /// Preview magnification.
    pub scaler: ScalerKind,
    /// Reference display.
    pub profile: Profile,
    /// Rendering intent.
    pub intent: Intent,
    /// Matrix override.
    pub matrix: Option<ColorMatrix>,
    /// Transfer characteristic override.
    pub trc: Option<Trc>,
    /// Per-channel gamma override.
    pub gamma: Option<[f32; 3]>,
    /// Per-channel brightness override.
    pub brightness: Option<[f32; 3]>,
    /// Per-channel contrast override.
    pub contrast: Option<[f32; 3]>,
    /// Output encode exponent override.
    pub output_gamma: Option<f32>,
    /// Integer scale of the planar surface (`1..=4`).
    pub scale: u32,
    /// Prescale straight to the presentation size instead of the planar size.
    pub prescale: bool,
    /// Presentation zoom.
    pub zoom: Zoom,
    /// Clockwise rotation of the preview quad, in degrees.
    pub rotation: f32,
    /// Output frame size; `None` uses the zoomed core size.
    pub viewport: Option<[u32; 2]>,
    /// Destination rectangle inside the viewport; `None` centers the zoomed core frame.
    pub dest: Option<Rect>,
    /// Viewport offset applied to the preview draw each frame.
    pub offset: [i32; 2],
    /// Fast-memory arena size.
    pub tmem_bytes: u32,
    /// Host memory budget for surfaces.
    pub host_budget_bytes: usize,
    /// Renderer worker threads; `None` uses rayon defaults.
    pub threads: Option<usize>,
    #[serde(skip)]
    generation: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let cache = CacheOpts::default();
        Self {
            filter: FilterKind::None,
            filter_weight: [0.553; 3],
            dither: DitherMode::Threshold,
            scaler: ScalerKind::Area,
            profile: Profile::Gbi,
            intent: Intent::Perceptual,
            matrix: None,
            trc: None,
            gamma: None,
            brightness: None,
            contrast: None,
            output_gamma: None,
            scale: 1,
            prescale: false,
            zoom: Zoom::default(),
            rotation: 0.0,
            viewport: None,
            dest: None,
            offset: [0, 0],
            tmem_bytes: TMEM_BYTES,
            host_budget_bytes: cache.host_budget_bytes,
            threads: None,
            generation: 0,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(s: &str) -> GxResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| GxError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> GxResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| GxError::serde(e.to_string()))
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> GxResult<()> {
        if !(1..=MAX_SCALE).contains(&self.scale) {
            return Err(GxError::validation(format!(
                "scale {} must be 1..={MAX_SCALE}",
                self.scale
            )));
        }
        if self.filter.is_2x() && self.scale < 2 {
            return Err(GxError::validation(format!(
                "filter {:?} needs scale >= 2",
                self.filter
            )));
        }
        if self
            .filter_weight
            .iter()
            .any(|w| !w.is_finite() || !(0.0..=1.0).contains(w))
        {
            return Err(GxError::validation("filter_weight entries must be in 0..=1"));
        }
        Zoom::new(self.zoom.x, self.zoom.y)?;
        if !self.rotation.is_finite() {
            return Err(GxError::validation("rotation must be finite"));
        }
        let extent_ok = |v: u32| (1..=MAX_EXTENT).contains(&v);
        if let Some([w, h]) = self.viewport
            && !(extent_ok(w) && extent_ok(h))
        {
            return Err(GxError::validation(format!(
                "viewport {w}x{h} must be 1..={MAX_EXTENT} on both axes"
            )));
        }
        if let Some(r) = self.dest
            && !(extent_ok(r.w) && extent_ok(r.h) && r.x <= MAX_EXTENT && r.y <= MAX_EXTENT)
        {
            return Err(GxError::validation(format!(
                "destination {r:?} must lie within {MAX_EXTENT} pixels"
            )));
        }
        if self.offset.iter().any(|v| v.unsigned_abs() > MAX_EXTENT) {
            return Err(GxError::validation(format!(
                "offset must be within {MAX_EXTENT} pixels"
            )));
        }
        if self.tmem_bytes == 0 || self.tmem_bytes % 64 != 0 {
            return Err(GxError::validation(
                "tmem_bytes must be a positive multiple of 64",
            ));
        }
        if self.threads == Some(0) {
            return Err(GxError::validation("threads must be >= 1 when set"));
        }
        if let Some(g) = self.gamma
            && g.iter().any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(GxError::validation("gamma overrides must be positive"));
        }
        if let Some(g) = self.output_gamma
            && (!g.is_finite() || g <= 0.0)
        {
            return Err(GxError::validation("output_gamma must be positive"));
        }
        for (name, v) in [("brightness", self.brightness), ("contrast", self.contrast)] {
            if let Some(v) = v
                && v.iter().any(|x| !x.is_finite())
            {
                return Err(GxError::validation(format!("{name} overrides must be finite")));
            }
        }
        Ok(())
    }

    /// Number of effective changes applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply `f` and validate the result.
    ///
    /// Returns `true` and bumps the generation when anything changed. On validation failure the
    /// previous options are restored.
    pub fn update(&mut self, f: impl FnOnce(&mut SessionConfig)) -> GxResult<bool> {
        let before = self.clone();
        f(self);
        self.generation = before.generation;
        if *self == before {
            return Ok(false);
        }
        if let Err(e) = self.validate() {
            *self = before;
            return Err(e);
        }
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(generation = self.generation, "session options changed");
        Ok(true)
    }

    /// Cheaper fallback after an allocation failure, or `None` when nothing is left to drop.
    ///
    /// Drops the prescale target, then the integer scale (turning 2x filters off), then the
    /// packed surface (accumulate falls back to blend).
    pub fn degraded(&self) -> Option<Self> {
        let mut next = self.clone();
        if next.prescale {
            next.prescale = false;
        } else if next.scale > 1 {
            next.scale = 1;
            if next.filter.is_2x() {
                next.filter = FilterKind::None;
            }
        } else if next.filter.needs_packed() {
            next.filter = FilterKind::Blend;
        } else {
            return None;
        }
        next.generation = self.generation.wrapping_add(1);
        Some(next)
    }

    /// Weight bytes of the current frame.
    pub fn weight_bytes(&self) -> [u8; 3] {
        self.filter_weight.map(weight_to_byte)
    }

    /// Profile bundle with per-field overrides applied.
    pub fn bundle(&self) -> ProfileBundle {
        let mut b = self.profile.bundle(self.intent);
        if let Some(m) = self.matrix {
            b.matrix = m;
        }
        if let Some(t) = self.trc {
            b.lut.trc = t;
        }
        if let Some(g) = self.gamma {
            b.lut.gamma = g;
        }
        if let Some(v) = self.brightness {
            b.lut.brightness = v;
        }
        if let Some(v) = self.contrast {
            b.lut.contrast = v;
        }
        if let Some(g) = self.output_gamma {
            b.output_gamma = g;
        }
        b
    }

    /// Texture cache options derived from the memory fields.
    pub fn cache_opts(&self) -> CacheOpts {
        CacheOpts {
            tmem_bytes: self.tmem_bytes,
            host_budget_bytes: self.host_budget_bytes,
        }
    }

    /// Output frame size and preview destination for a `w`x`h` core frame.
    ///
    /// Without a viewport the frame is the zoomed core size. Without a destination the zoomed
    /// core frame is centered in the viewport. The offset is not included; it travels with each
    /// frame.
    pub fn presentation(&self, w: u32, h: u32) -> ((u32, u32), Quad) {
        let (zw, zh) = self.zoom.apply(w, h);
        let (fw, fh) = self.viewport.map_or((zw, zh), |[vw, vh]| (vw, vh));
        let centered = |frame: u32, quad: u32| {
            ((i64::from(frame) - i64::from(quad)).div_euclid(2)) as i32
        };
        let quad = match self.dest {
            Some(r) => Quad {
                x: r.x as i32,
                y: r.y as i32,
                w: r.w,
                h: r.h,
                rotation: self.rotation,
            },
            None => Quad {
                x: centered(fw, zw),
                y: centered(fh, zh),
                w: zw,
                h: zh,
                rotation: self.rotation,
            },
        };
        ((fw, fh), quad)
    }

    /// Options that change surface sizes or memory; a change requires reallocation.
    pub(crate) fn layout_key(&self) -> LayoutKey {
        LayoutKey {
            packed: self.filter.needs_packed(),
            scale: self.scale,
            prescale: self.prescale,
            prescale_bits: if self.prescale {
                (
                    self.zoom.x.to_bits(),
                    self.zoom.y.to_bits(),
                    self.rotation.to_bits(),
                )
            } else {
                (0, 0, 0)
            },
            cache: self.cache_opts(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LayoutKey {
    packed: bool,
    scale: u32,
    prescale: bool,
    prescale_bits: (u32, u32, u32),
    cache: CacheOpts,
}

#[cfg(test)]
#[path = "../../tests/unit/config/options.rs"]
mod tests;
