//! gxpipe is the surface cache and fixed-function pixel pipeline behind a handheld-console
//! emulator's video output.
//!
//! The public API is session-oriented:
//!
//! - Describe the output with a [`SessionConfig`] (filters, dithering, color profile, zoom)
//! - Open a [`PipelineSession`] for the core's [`VideoGeometry`]
//! - Per frame: [`PipelineSession::begin_frame`], [`PipelineSession::push_frame`],
//!   [`PipelineSession::render`], [`PipelineSession::draw_sync`]
//!
//! Underneath, a [`TextureCache`] places [`Surface`]s into a 1 MiB two-bank fast-memory
//! [`TmemArena`], and a [`StageEngine`] records each pipeline stage once as a [`CommandBlock`]
//! that a [`Renderer`] replays every frame.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod config;
pub(crate) mod filters;
pub(crate) mod memory;
pub(crate) mod render;
pub(crate) mod session;
pub(crate) mod stage;
pub(crate) mod surface;

pub use crate::foundation::core::{Field, Quad, Rect, Retrace, Rgb8, Zoom};
pub use crate::foundation::error::{GxError, GxResult};

pub use crate::config::options::{
    DitherMode, FilterKind, MAX_EXTENT, MAX_SCALE, ScalerKind, SessionConfig,
};
pub use crate::config::profile::{ColorMatrix, Intent, MatrixCoeffs, Profile, ProfileBundle};
pub use crate::memory::arena::{ArenaStats, Bank, Span, TMEM_ALIGN, TMEM_BYTES, TmemArena};
pub use crate::memory::cache::{
    CACHE_WINDOW_BYTES, CacheOpts, CacheStats, MAX_SHADOWS, PlaneView, TexView, TextureCache,
};
pub use crate::render::backend::{
    BackendKind, FrameParams, FrameRgb, Renderer, RendererOpts, Target, create_renderer,
};
pub use crate::render::software::SoftwareRenderer;
pub use crate::session::pipeline_session::{
    PRESCALE_MAX_HEIGHT, PRESCALE_MAX_WIDTH, PipelineSession, SessionStats, prescale_rect,
};
pub use crate::session::raw::{RawFormat, RawFrame, VideoGeometry};
pub use crate::stage::command::{
    Combine, CommandBlock, Compare, EdgeRule, InputDesc, Lookup, MAX_FADE_SOURCES,
    MAX_FADE_SOURCES_DITHERED, Op, OutputDesc, PackedMode, StageKind, YUV_TOLERANCE,
};
pub use crate::stage::engine::{FADE_ALPHA, StageEngine, StageId, StageRole, StageStats};
pub use crate::stage::fingerprint::BlockFingerprint;
pub use crate::surface::format::PixelFormat;
pub use crate::surface::lut::{Lut, LutParams, Trc};
pub use crate::surface::{BankLayout, Placement, PlaneRegion, ShadowSlot, Surface, SurfaceShape};
