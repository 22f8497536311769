use crate::config::options::{FilterKind, SessionConfig};
use crate::foundation::core::{Field, Quad, Retrace};
use crate::foundation::error::{GxError, GxResult};
use crate::foundation::math::sin_cos_deg;
use crate::memory::cache::{CacheStats, TextureCache};
use crate::render::backend::{
    BackendKind, FrameParams, FrameRgb, Renderer, RendererOpts, Target, create_renderer,
};
use crate::session::raw::{RawFrame, VideoGeometry};
use crate::stage::command::{InputDesc, OutputDesc};
use crate::stage::engine::{StageEngine, StageId, StageRole, StageStats};
use crate::surface::format::PixelFormat;
use crate::surface::{BankLayout, Surface};

/// Widest prescale target, in pixels.
pub const PRESCALE_MAX_WIDTH: u32 = 1024;
/// Tallest prescale target, in pixels.
pub const PRESCALE_MAX_HEIGHT: u32 = 640;

const CONVERT_SHADOWS: usize = 3;
// Cached surfaces are never read at a look-back, so one slot is enough.
const PLANAR_SHADOWS: usize = 1;

/// Frame counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames opened with [`PipelineSession::begin_frame`].
    pub frames_begun: u64,
    /// Frames produced by [`PipelineSession::render`].
    pub frames_rendered: u64,
    /// Frames closed with [`PipelineSession::draw_sync`].
    pub frames_completed: u64,
    /// Surface reallocations after option changes.
    pub reallocations: u64,
    /// Stage engine counters.
    pub stages: StageStats,
    /// Texture cache counters.
    pub cache: CacheStats,
}

#[derive(Debug, Default)]
struct Surfaces {
    convert: Option<Surface>,
    packed: Option<Surface>,
    planar: Option<Surface>,
    prescale: Option<Surface>,
}

impl Surfaces {
    fn allocate(
        cache: &mut TextureCache,
        cfg: &SessionConfig,
        geo: VideoGeometry,
    ) -> GxResult<Self> {
        let mut out = Self::default();
        if let Err(e) = out.fill(cache, cfg, geo) {
            tracing::warn!("surface setup failed, releasing partial allocation: {e}");
            if let Err(cleanup) = out.free_all(cache) {
                tracing::warn!("partial allocation not fully released: {cleanup}");
            }
            return Err(e);
        }
        Ok(out)
    }

    fn fill(
        &mut self,
        cache: &mut TextureCache,
        cfg: &SessionConfig,
        geo: VideoGeometry,
    ) -> GxResult<()> {
        let (w, h) = (geo.width, geo.height);
        let convert = self.convert.insert(cache.allocate_surface(
            "convert",
            w,
            h,
            geo.format.surface_format(),
            1,
            None,
        )?);
        cache.bind_resident(convert, &[BankLayout::Interleaved], CONVERT_SHADOWS)?;

        if cfg.filter.needs_packed() {
            let packed = self
                .packed
                .insert(cache.allocate_surface("packed", w, h, PixelFormat::Rgba8, 1, None)?);
            cache.bind_resident(packed, &[BankLayout::Interleaved], 1)?;
        }

        let bundle = cfg.bundle();
        let (pw, ph) = (w * cfg.scale, h * cfg.scale);
        let planar = self.planar.insert(cache.allocate_surface(
            "planar",
            pw,
            ph,
            PixelFormat::Ci8,
            3,
            Some(&bundle.lut),
        )?);
        cache.bind_cached(planar, &[BankLayout::Interleaved; 3], PLANAR_SHADOWS)?;

        let (qw, qh) = prescale_rect(cfg, w, h);
        let prescale = self.prescale.insert(cache.allocate_surface(
            "prescale",
            qw,
            qh,
            PixelFormat::I8,
            3,
            None,
        )?);
        cache.bind_cached(prescale, &[BankLayout::Interleaved; 3], 1)?;
        Ok(())
    }

    // Release order: convert, packed, planar, prescale. Every slot is released even when an
    // earlier one fails; the first failure is returned.
    fn free_all(&mut self, cache: &mut TextureCache) -> GxResult<()> {
        let mut first = None;
        for slot in [
            &mut self.convert,
            &mut self.packed,
            &mut self.planar,
            &mut self.prescale,
        ] {
            if let Some(mut s) = slot.take()
                && let Err(e) = cache.free_surface(&mut s)
            {
                tracing::warn!(surface = s.label(), "failed to release surface: {e}");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn is_complete(&self) -> bool {
        self.convert.is_some() && self.planar.is_some() && self.prescale.is_some()
    }

    fn iter(&self) -> impl Iterator<Item = &Surface> {
        [&self.convert, &self.packed, &self.planar, &self.prescale]
            .into_iter()
            .flatten()
    }
}

/// Prescale target size for a `w`x`h` source.
///
/// Without the prescale target this is the planar size. With it, the planar size is multiplied
/// by the zoom-to-scale ratio widened by the rotated footprint (`|cos r| + |sin r|`) and rounded
/// to an integer, capped at 1024x640.
pub fn prescale_rect(cfg: &SessionConfig, w: u32, h: u32) -> (u32, u32) {
    let (pw, ph) = (w * cfg.scale, h * cfg.scale);
    if !cfg.prescale {
        return (pw, ph);
    }
    let (sin, cos) = sin_cos_deg(cfg.rotation);
    let spread = cos.abs() + sin.abs();
    let factor = |zoom: f32, planar: u32, max: u32| {
        let ratio = f64::from(zoom) / f64::from(cfg.scale);
        let f = ((ratio * spread).round_ties_even() as u32).max(1);
        f.min((max / planar.max(1)).max(1))
    };
    (
        pw * factor(cfg.zoom.x, pw, PRESCALE_MAX_WIDTH),
        ph * factor(cfg.zoom.y, ph, PRESCALE_MAX_HEIGHT),
    )
}

#[derive(Debug, Clone, Copy)]
struct StageIds {
    packed: StageId,
    planar: StageId,
    prescale: StageId,
    fade: StageId,
    preview: StageId,
    preview_mono: StageId,
}

/// Per-frame orchestrator owning every surface, stage and the renderer of one emulated session.
///
/// A frame runs `begin_frame` → `push_frame` → `render` → `draw_sync`. Stages run in the order
/// convert, packed (when the filter needs it), planar, prescale (or fade), preview.
pub struct PipelineSession {
    config: SessionConfig,
    geometry: VideoGeometry,
    cache: TextureCache,
    engine: StageEngine,
    renderer: Box<dyn Renderer>,
    surfaces: Surfaces,
    stages: StageIds,
    frame: Option<FrameParams>,
    faded: bool,
    monochrome: bool,
    stats: SessionStats,
}

impl std::fmt::Debug for PipelineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSession")
            .field("geometry", &self.geometry)
            .field("generation", &self.config.generation())
            .field("renderer", &self.renderer)
            .field("frame", &self.frame)
            .finish()
    }
}

impl PipelineSession {
    /// Allocate and bind every surface and configure every stage.
    ///
    /// On failure everything allocated so far is released and the error is returned; an
    /// [`GxError::AllocationFailure`] means the caller should retry with
    /// [`SessionConfig::degraded`].
    #[tracing::instrument(skip(config, renderer), fields(generation = config.generation()))]
    pub fn new(
        config: SessionConfig,
        geometry: VideoGeometry,
        renderer: Box<dyn Renderer>,
    ) -> GxResult<Self> {
        config.validate()?;
        if geometry.width == 0 || geometry.height == 0 {
            return Err(GxError::validation("video geometry must be non-empty"));
        }
        let mut cache = TextureCache::new(config.cache_opts())?;
        let surfaces = Surfaces::allocate(&mut cache, &config, geometry)?;

        let mut engine = StageEngine::new();
        let stages = StageIds {
            packed: engine.add_stage("packed", StageRole::Packed),
            planar: engine.add_stage("planar", StageRole::Planar),
            prescale: engine.add_stage("prescale", StageRole::Prescale),
            fade: engine.add_stage("fade", StageRole::Fade),
            preview: engine.add_stage("preview", StageRole::Preview { mono: false }),
            preview_mono: engine.add_stage("preview_mono", StageRole::Preview { mono: true }),
        };

        let mut session = Self {
            config,
            geometry,
            cache,
            engine,
            renderer,
            surfaces,
            stages,
            frame: None,
            faded: false,
            monochrome: false,
            stats: SessionStats::default(),
        };
        if let Err(e) = session.configure_stages() {
            if let Err(cleanup) = session.surfaces.free_all(&mut session.cache) {
                tracing::warn!("surfaces not fully released after setup failure: {cleanup}");
            }
            return Err(e);
        }
        tracing::debug!(
            fast_bytes = session.cache.arena().stats().live_bytes,
            "pipeline session ready"
        );
        Ok(session)
    }

    /// Open a session on the software renderer, degrading the options after allocation failures
    /// until setup succeeds or nothing is left to drop.
    pub fn open(config: SessionConfig, geometry: VideoGeometry) -> GxResult<Self> {
        let mut config = config;
        loop {
            let renderer = create_renderer(
                BackendKind::Software,
                &RendererOpts {
                    parallel: true,
                    threads: config.threads,
                },
            )?;
            match Self::new(config.clone(), geometry, renderer) {
                Ok(s) => return Ok(s),
                Err(e) if e.is_recoverable() => match config.degraded() {
                    Some(next) => {
                        tracing::warn!("{e}; retrying with reduced options");
                        config = next;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn configure_stages(&mut self) -> GxResult<()> {
        let ((width, height), dest) = self.presentation();
        let Self {
            config,
            engine,
            surfaces,
            stages,
            ..
        } = self;
        let (Some(convert), Some(planar), Some(prescale)) =
            (&surfaces.convert, &surfaces.planar, &surfaces.prescale)
        else {
            return Err(GxError::mismatch("session surfaces are not allocated"));
        };
        if let Some(packed) = &surfaces.packed {
            engine.configure(
                stages.packed,
                config,
                &[InputDesc::of(convert)],
                OutputDesc::of(packed),
            )?;
        }
        let planar_inputs: Vec<InputDesc> = match (config.filter, &surfaces.packed) {
            (FilterKind::Accumulate, Some(p)) => vec![InputDesc::of(p)],
            (FilterKind::Scale2xEx, Some(p)) => vec![InputDesc::of(convert), InputDesc::of(p)],
            _ => vec![InputDesc::of(convert)],
        };
        engine.configure(stages.planar, config, &planar_inputs, OutputDesc::of(planar))?;
        for id in [stages.prescale, stages.fade] {
            engine.configure(id, config, &[InputDesc::of(planar)], OutputDesc::of(prescale))?;
        }
        for id in [stages.preview, stages.preview_mono] {
            engine.configure(
                id,
                config,
                &[InputDesc::of(prescale)],
                OutputDesc::Frame {
                    width,
                    height,
                    dest,
                },
            )?;
        }
        Ok(())
    }

    fn presentation(&self) -> ((u32, u32), Quad) {
        self.config
            .presentation(self.geometry.width, self.geometry.height)
    }

    /// Current options.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Core video geometry.
    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    /// Size of frames returned by [`PipelineSession::render`].
    pub fn output_size(&self) -> (u32, u32) {
        self.presentation().0
    }

    /// Live surfaces in allocation order.
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter()
    }

    /// Texture cache owning the fast-memory arena.
    pub fn cache(&self) -> &TextureCache {
        &self.cache
    }

    /// Counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            stages: self.engine.stats(),
            cache: self.cache.stats(),
            ..self.stats.clone()
        }
    }

    /// Cross-fade the output (menu overlay background).
    pub fn set_faded(&mut self, faded: bool) {
        self.faded = faded;
    }

    /// `true` while the output is cross-faded.
    pub fn faded(&self) -> bool {
        self.faded
    }

    /// Luma-only output (paused or reset core).
    pub fn set_monochrome(&mut self, mono: bool) {
        self.monochrome = mono;
    }

    /// Replace the options.
    ///
    /// Bumps the generation when anything changed; stages rebuild on their next apply. Surfaces
    /// are reallocated only when sizes or memory limits change; profile changes refill the planar
    /// tables in place. A new output size or destination reconfigures the stages at once, and a
    /// new thread count replaces the renderer with a software renderer of that size.
    #[tracing::instrument(skip_all)]
    pub fn set_config(&mut self, next: SessionConfig) -> GxResult<()> {
        let renderer = if next.threads != self.config.threads {
            Some(create_renderer(
                self.renderer.kind(),
                &RendererOpts {
                    parallel: true,
                    threads: next.threads,
                },
            )?)
        } else {
            None
        };
        let old_layout = self.config.layout_key();
        let old_lut = self.config.bundle().lut;
        let old_presentation = self.presentation();
        if !self.config.update(|c| *c = next)? && self.surfaces.is_complete() {
            return Ok(());
        }
        if let Some(r) = renderer {
            tracing::debug!(threads = ?self.config.threads, "renderer rebuilt");
            self.renderer = r;
        }
        if self.config.layout_key() != old_layout || !self.surfaces.is_complete() {
            return self.reallocate();
        }
        if self.presentation() != old_presentation {
            self.configure_stages()?;
        }
        let lut = self.config.bundle().lut;
        if lut != old_lut
            && let Some(planar) = self.surfaces.planar.as_mut()
        {
            self.cache.refill_luts(planar, &lut);
            planar.mark_dirty();
        }
        Ok(())
    }

    fn reallocate(&mut self) -> GxResult<()> {
        self.surfaces.free_all(&mut self.cache)?;
        self.engine.reset();
        if self.cache.opts() != self.config.cache_opts() {
            self.cache = TextureCache::new(self.config.cache_opts())?;
        }
        self.surfaces = Surfaces::allocate(&mut self.cache, &self.config, self.geometry)?;
        self.stats.reallocations = self.stats.reallocations.saturating_add(1);
        self.configure_stages()
    }

    /// Retrace-aligned start point: opens a frame and invalidates the texture cache.
    pub fn begin_frame(&mut self, retrace: Retrace, field: Field) -> GxResult<()> {
        if self.frame.is_some() {
            return Err(GxError::mismatch("begin_frame while a frame is open"));
        }
        self.frame = Some(FrameParams {
            retrace,
            field,
            offset: self.config.offset,
        });
        self.cache.invalidate_cached();
        self.stats.frames_begun = self.stats.frames_begun.saturating_add(1);
        Ok(())
    }

    /// Copy a raw core frame into the convert surface.
    pub fn push_frame(&mut self, raw: &RawFrame<'_>) -> GxResult<()> {
        if self.frame.is_none() {
            return Err(GxError::mismatch("push_frame outside begin_frame/draw_sync"));
        }
        raw.validate(self.geometry)?;
        let convert = self
            .surfaces
            .convert
            .as_mut()
            .ok_or_else(|| GxError::mismatch("convert surface is not allocated"))?;
        let row = raw.width as usize * raw.format.bytes_per_pixel();
        let plane = &mut convert.planes_mut()[0];
        for (y, dst) in plane.chunks_exact_mut(row).enumerate() {
            dst.copy_from_slice(raw.row(y as u32));
        }
        convert.mark_dirty();
        Ok(())
    }

    /// Run every stage for the open frame.
    #[tracing::instrument(skip(self))]
    pub fn render(&mut self) -> GxResult<FrameRgb> {
        let frame = self
            .frame
            .ok_or_else(|| GxError::mismatch("render outside begin_frame/draw_sync"))?;
        let (width, height) = self.output_size();
        let mut out = FrameRgb::new(width, height);

        let Self {
            config,
            cache,
            engine,
            renderer,
            surfaces,
            stages,
            faded,
            monochrome,
            ..
        } = self;
        let missing = || GxError::mismatch("session surfaces are not allocated");
        let convert = surfaces.convert.as_mut().ok_or_else(missing)?;
        let planar = surfaces.planar.as_mut().ok_or_else(missing)?;
        let prescale = surfaces.prescale.as_mut().ok_or_else(missing)?;
        let renderer = renderer.as_mut();

        if let Some(packed) = surfaces.packed.as_mut() {
            engine.apply(
                stages.packed,
                config,
                cache,
                renderer,
                &mut [&mut *convert],
                Target::Surface(packed),
                frame,
            )?;
        }
        match (config.filter, surfaces.packed.as_mut()) {
            (FilterKind::Accumulate, Some(packed)) => engine.apply(
                stages.planar,
                config,
                cache,
                renderer,
                &mut [packed],
                Target::Surface(planar),
                frame,
            )?,
            (FilterKind::Scale2xEx, Some(packed)) => engine.apply(
                stages.planar,
                config,
                cache,
                renderer,
                &mut [&mut *convert, packed],
                Target::Surface(planar),
                frame,
            )?,
            _ => engine.apply(
                stages.planar,
                config,
                cache,
                renderer,
                &mut [&mut *convert],
                Target::Surface(planar),
                frame,
            )?,
        }
        let prescale_stage = if *faded { stages.fade } else { stages.prescale };
        engine.apply(
            prescale_stage,
            config,
            cache,
            renderer,
            &mut [&mut *planar],
            Target::Surface(prescale),
            frame,
        )?;
        let preview_stage = if *monochrome {
            stages.preview_mono
        } else {
            stages.preview
        };
        engine.apply(
            preview_stage,
            config,
            cache,
            renderer,
            &mut [&mut *prescale],
            Target::Frame(&mut out),
            frame,
        )?;

        self.stats.frames_rendered = self.stats.frames_rendered.saturating_add(1);
        Ok(out)
    }

    /// Completion point: the frame's command stream has been consumed.
    pub fn draw_sync(&mut self) -> GxResult<()> {
        if self.frame.take().is_none() {
            return Err(GxError::mismatch("draw_sync without an open frame"));
        }
        self.stats.frames_completed = self.stats.frames_completed.saturating_add(1);
        Ok(())
    }

    /// Convenience wrapper running one whole frame.
    pub fn run_frame(
        &mut self,
        retrace: Retrace,
        field: Field,
        raw: &RawFrame<'_>,
    ) -> GxResult<FrameRgb> {
        self.begin_frame(retrace, field)?;
        let out = self.push_frame(raw).and_then(|()| self.render());
        self.draw_sync()?;
        out
    }

    /// Stage and arena listing.
    pub fn dump(&self) -> String {
        let mut s = self.engine.dump();
        s.push_str(&self.cache.arena().dump());
        s
    }

    /// Free every surface in allocation order and return the final counters.
    pub fn end_session(mut self) -> GxResult<SessionStats> {
        self.surfaces.free_all(&mut self.cache)?;
        self.engine.reset();
        Ok(self.stats())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/pipeline_session.rs"]
mod tests;
