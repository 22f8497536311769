use crate::config::options::{FilterKind, SessionConfig};
use crate::foundation::error::{GxError, GxResult};
use crate::memory::cache::TextureCache;
use crate::render::backend::{FrameParams, Renderer, Target};
use crate::stage::command::{CommandBlock, InputDesc, OutputDesc, PackedMode, StageKind};
use crate::surface::Surface;
use smallvec::SmallVec;

/// Attenuation byte of a faded menu background.
pub const FADE_ALPHA: u8 = 0xC0;

/// Handle to a stage registered with a [`StageEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub(crate) u32);

/// Position of a stage in the frame; decides how its kind is derived from the session options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    /// Convert → packed.
    Packed,
    /// Convert (and packed) → planar.
    Planar,
    /// Planar → prescale.
    Prescale,
    /// Planar → prescale, attenuated.
    Fade,
    /// Prescale → host frame.
    Preview {
        /// Luma-only output.
        mono: bool,
    },
}

impl StageRole {
    /// Stage kind for the current options.
    pub fn kind(self, cfg: &SessionConfig) -> StageKind {
        let bundle = cfg.bundle();
        match self {
            Self::Packed => StageKind::Packed {
                mode: if cfg.filter == FilterKind::Accumulate {
                    PackedMode::Accumulate
                } else {
                    PackedMode::Yuv
                },
                weight: cfg.weight_bytes(),
            },
            Self::Planar => StageKind::Planar {
                filter: cfg.filter,
                weight: cfg.weight_bytes(),
            },
            Self::Prescale => StageKind::Prescale { dither: cfg.dither },
            Self::Fade => StageKind::Fade {
                dither: cfg.dither,
                alphas: SmallVec::from_slice(&[FADE_ALPHA]),
            },
            Self::Preview { mono } => StageKind::Preview {
                matrix: bundle.matrix,
                scaler: cfg.scaler,
                output_gamma: bundle.output_gamma,
                mono,
            },
        }
    }
}

#[derive(Debug)]
enum StageState {
    Unconfigured,
    Configured {
        block: CommandBlock,
        generation: u64,
    },
}

#[derive(Debug)]
struct Stage {
    name: &'static str,
    role: StageRole,
    state: StageState,
}

/// Stage engine counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    /// Command blocks built from scratch.
    pub builds: u64,
    /// Configurations that produced an identical block.
    pub reuses: u64,
    /// Rebuilds triggered by an option generation change during apply.
    pub auto_rebuilds: u64,
    /// Blocks executed.
    pub replays: u64,
}

/// Memoized per-stage command blocks.
#[derive(Debug, Default)]
pub struct StageEngine {
    stages: Vec<Stage>,
    stats: StageStats,
}

impl StageEngine {
    /// Empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unconfigured stage.
    pub fn add_stage(&mut self, name: &'static str, role: StageRole) -> StageId {
        self.stages.push(Stage {
            name,
            role,
            state: StageState::Unconfigured,
        });
        StageId((self.stages.len() - 1) as u32)
    }

    /// Counters.
    pub fn stats(&self) -> StageStats {
        self.stats
    }

    /// Built block of `id`, if configured.
    pub fn block(&self, id: StageId) -> Option<&CommandBlock> {
        match &self.stages.get(id.0 as usize)?.state {
            StageState::Configured { block, .. } => Some(block),
            StageState::Unconfigured => None,
        }
    }

    /// Option generation the block of `id` was built under.
    pub fn generation_of(&self, id: StageId) -> Option<u64> {
        match self.stages.get(id.0 as usize)?.state {
            StageState::Configured { generation, .. } => Some(generation),
            StageState::Unconfigured => None,
        }
    }

    /// Drop every built block (surfaces were reallocated).
    pub fn reset(&mut self) {
        for s in &mut self.stages {
            s.state = StageState::Unconfigured;
        }
    }

    fn stage_mut(&mut self, id: StageId) -> GxResult<&mut Stage> {
        self.stages
            .get_mut(id.0 as usize)
            .ok_or_else(|| GxError::mismatch(format!("unknown stage {}", id.0)))
    }

    /// Build (or reuse) the command block of `id` for the current options and surfaces.
    #[tracing::instrument(skip(self, cfg, inputs), fields(generation = cfg.generation()))]
    pub fn configure(
        &mut self,
        id: StageId,
        cfg: &SessionConfig,
        inputs: &[InputDesc],
        output: OutputDesc,
    ) -> GxResult<()> {
        let stage = self.stage_mut(id)?;
        let block = CommandBlock::build(stage.role.kind(cfg), inputs, output)?;
        let reused = matches!(
            &stage.state,
            StageState::Configured { block: old, .. } if old.fingerprint() == block.fingerprint()
        );
        let name = stage.name;
        stage.state = StageState::Configured {
            block,
            generation: cfg.generation(),
        };
        if reused {
            self.stats.reuses = self.stats.reuses.saturating_add(1);
        } else {
            self.stats.builds = self.stats.builds.saturating_add(1);
            tracing::debug!(stage = name, "command block built");
        }
        Ok(())
    }

    /// Execute the block of `id`.
    ///
    /// Rebuilds the block first when the options moved past the generation it was built under,
    /// checks the surfaces against the shapes it was built for, resolves every input and marks
    /// a surface output dirty.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip_all, fields(stage = id.0))]
    pub fn apply(
        &mut self,
        id: StageId,
        cfg: &SessionConfig,
        cache: &mut TextureCache,
        renderer: &mut dyn Renderer,
        inputs: &mut [&mut Surface],
        mut output: Target<'_>,
        frame: FrameParams,
    ) -> GxResult<()> {
        let stage = self
            .stages
            .get(id.0 as usize)
            .ok_or_else(|| GxError::mismatch(format!("unknown stage {}", id.0)))?;
        let stale = match &stage.state {
            StageState::Unconfigured => {
                return Err(GxError::mismatch(format!(
                    "stage '{}' applied before being configured",
                    stage.name
                )));
            }
            StageState::Configured { block, generation } if *generation < cfg.generation() => {
                Some((block.inputs().to_vec(), block.output()))
            }
            StageState::Configured { .. } => None,
        };
        if let Some((descs, out)) = stale {
            tracing::debug!(stage = id.0, "options changed, rebuilding command block");
            self.configure(id, cfg, &descs, out)?;
            self.stats.auto_rebuilds = self.stats.auto_rebuilds.saturating_add(1);
        }

        let stage = &self.stages[id.0 as usize];
        let StageState::Configured { block, .. } = &stage.state else {
            return Err(GxError::mismatch(format!(
                "stage '{}' lost its configuration",
                stage.name
            )));
        };
        check_surfaces(stage.name, block, inputs, &output)?;

        for s in inputs.iter_mut() {
            cache.resolve_preload(s)?;
        }
        let inputs: &[&mut Surface] = &*inputs;
        let cache: &TextureCache = cache;
        let mut views = SmallVec::<[_; 4]>::new();
        for (input, look_back) in block.fetches() {
            views.push(cache.view(&*inputs[input], look_back)?);
        }
        renderer.execute(block, &views, &mut output, frame)?;

        if let Target::Surface(s) = output {
            s.mark_dirty();
        }
        self.stats.replays = self.stats.replays.saturating_add(1);
        Ok(())
    }

    /// Listing of every configured block in registration order.
    pub fn dump(&self) -> String {
        let mut s = String::new();
        for (i, st) in self.stages.iter().enumerate() {
            match &st.state {
                StageState::Configured { block, generation } => {
                    s.push_str(&format!(
                        "stage {i} '{}' {:?} generation={generation}\n",
                        st.name, st.role
                    ));
                    s.push_str(&block.dump());
                }
                StageState::Unconfigured => {
                    s.push_str(&format!("stage {i} '{}' unconfigured\n", st.name));
                }
            }
        }
        s
    }
}

fn check_surfaces(
    name: &str,
    block: &CommandBlock,
    inputs: &[&mut Surface],
    output: &Target<'_>,
) -> GxResult<()> {
    if inputs.len() != block.inputs().len() {
        return Err(GxError::mismatch(format!(
            "stage '{name}' built for {} inputs, applied with {}",
            block.inputs().len(),
            inputs.len()
        )));
    }
    for (i, (s, want)) in inputs.iter().zip(block.inputs()).enumerate() {
        let got = InputDesc::of(s);
        if got != *want {
            return Err(GxError::mismatch(format!(
                "stage '{name}' input {i} ('{}') is {got:?}, built for {want:?}",
                s.label()
            )));
        }
    }
    let matches = match (output, block.output()) {
        (Target::Surface(s), want) => OutputDesc::of(s) == want,
        (
            Target::Frame(f),
            OutputDesc::Frame {
                width, height, ..
            },
        ) => (f.width, f.height) == (width, height),
        (Target::Frame(_), OutputDesc::Surface(_)) => false,
    };
    if !matches {
        let got = match output {
            Target::Surface(s) => format!("{:?}", OutputDesc::of(s)),
            Target::Frame(f) => format!("a {}x{} frame", f.width, f.height),
        };
        return Err(GxError::mismatch(format!(
            "stage '{name}' output is {got}, built for {:?}",
            block.output()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/stage/engine.rs"]
mod tests;
