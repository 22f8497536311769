use crate::foundation::core::{Field, Retrace};
use crate::foundation::error::{GxError, GxResult};
use crate::memory::cache::TexView;
use crate::stage::command::CommandBlock;
use crate::surface::Surface;

/// A rendered frame as RGB8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgb {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGB8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRgb {
    /// Black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// Pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Per-frame inputs to a block execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameParams {
    /// Retrace captured at frame start.
    pub retrace: Retrace,
    /// Interlaced field.
    pub field: Field,
    /// Viewport offset of the preview draw, in frame pixels.
    pub offset: [i32; 2],
}

/// Where a block writes.
#[derive(Debug)]
pub enum Target<'a> {
    /// Host planes of a surface.
    Surface(&'a mut Surface),
    /// A host frame.
    Frame(&'a mut FrameRgb),
}

/// Executes command blocks against resolved surface views.
///
/// `inputs` holds one view per fetch op of the block, in texture-unit order.
pub trait Renderer: Send + std::fmt::Debug {
    /// Backend identity.
    fn kind(&self) -> BackendKind;

    /// Run `block` and write its result into `output`.
    fn execute(
        &mut self,
        block: &CommandBlock,
        inputs: &[TexView<'_>],
        output: &mut Target<'_>,
        frame: FrameParams,
    ) -> GxResult<()>;
}

/// Available backend kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Deterministic host renderer.
    #[default]
    Software,
}

/// Backend-agnostic renderer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererOpts {
    /// Split rows across a rayon pool.
    pub parallel: bool,
    /// Worker thread override; `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
        }
    }
}

/// Create a renderer implementation.
pub fn create_renderer(kind: BackendKind, opts: &RendererOpts) -> GxResult<Box<dyn Renderer>> {
    if opts.threads == Some(0) {
        return Err(GxError::validation("renderer 'threads' must be >= 1 when set"));
    }
    match kind {
        BackendKind::Software => Ok(Box::new(
            crate::render::software::SoftwareRenderer::new(opts)?,
        )),
    }
}
