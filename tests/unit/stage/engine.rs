use super::*;
use crate::memory::cache::{CacheOpts, TexView};
use crate::render::backend::{BackendKind, FrameRgb};
use crate::stage::fingerprint::BlockFingerprint;
use crate::surface::BankLayout;
use crate::surface::format::PixelFormat;

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<(BlockFingerprint, usize)>,
}

impl Renderer for Recorder {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn execute(
        &mut self,
        block: &CommandBlock,
        inputs: &[TexView<'_>],
        _output: &mut Target<'_>,
        _frame: FrameParams,
    ) -> GxResult<()> {
        self.calls.push((block.fingerprint(), inputs.len()));
        Ok(())
    }
}

struct Rig {
    cache: TextureCache,
    convert: Surface,
    planar: Surface,
}

fn rig() -> Rig {
    let mut cache = TextureCache::new(CacheOpts {
        tmem_bytes: 1 << 20,
        host_budget_bytes: 1 << 24,
    })
    .unwrap();
    let mut convert = cache
        .allocate_surface("convert", 8, 4, PixelFormat::Rgba8, 1, None)
        .unwrap();
    cache
        .bind_resident(&mut convert, &[BankLayout::Interleaved], 3)
        .unwrap();
    let mut planar = cache
        .allocate_surface("planar", 8, 4, PixelFormat::Ci8, 3, None)
        .unwrap();
    cache
        .bind_cached(&mut planar, &[BankLayout::Interleaved; 3], 3)
        .unwrap();
    Rig {
        cache,
        convert,
        planar,
    }
}

fn blend_config() -> SessionConfig {
    let mut cfg = SessionConfig::default();
    cfg.filter = FilterKind::Blend;
    cfg
}

fn configure_planar(engine: &mut StageEngine, id: StageId, cfg: &SessionConfig, r: &Rig) {
    engine
        .configure(
            id,
            cfg,
            &[InputDesc::of(&r.convert)],
            OutputDesc::of(&r.planar),
        )
        .unwrap();
}

fn apply_planar(
    engine: &mut StageEngine,
    id: StageId,
    cfg: &SessionConfig,
    r: &mut Rig,
    renderer: &mut Recorder,
) -> GxResult<()> {
    r.convert.mark_dirty();
    engine.apply(
        id,
        cfg,
        &mut r.cache,
        renderer,
        &mut [&mut r.convert],
        Target::Surface(&mut r.planar),
        FrameParams::default(),
    )
}

#[test]
fn apply_before_configure_is_a_mismatch() {
    let mut r = rig();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    let err = apply_planar(
        &mut engine,
        id,
        &blend_config(),
        &mut r,
        &mut Recorder::default(),
    )
    .unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));
    assert_eq!(engine.stats().replays, 0);
}

#[test]
fn identical_configuration_is_reused() {
    let r = rig();
    let cfg = blend_config();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    configure_planar(&mut engine, id, &cfg, &r);
    let fp = engine.block(id).unwrap().fingerprint();
    configure_planar(&mut engine, id, &cfg, &r);
    assert_eq!(engine.block(id).unwrap().fingerprint(), fp);
    assert_eq!(engine.stats().builds, 1);
    assert_eq!(engine.stats().reuses, 1);
}

#[test]
fn apply_binds_one_view_per_fetch_and_dirties_the_output() {
    let mut r = rig();
    let cfg = blend_config();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    configure_planar(&mut engine, id, &cfg, &r);

    let mut rec = Recorder::default();
    apply_planar(&mut engine, id, &cfg, &mut r, &mut rec).unwrap();
    assert_eq!(rec.calls.len(), 1);
    assert_eq!(rec.calls[0].1, 2);
    assert!(r.planar.is_dirty());
    assert!(!r.convert.is_dirty());
    assert_eq!(engine.stats().replays, 1);
}

#[test]
fn generation_change_rebuilds_on_next_apply() {
    let mut r = rig();
    let mut cfg = blend_config();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    configure_planar(&mut engine, id, &cfg, &r);
    let before = engine.block(id).unwrap().fingerprint();
    assert_eq!(engine.generation_of(id), Some(0));

    assert!(cfg.update(|c| c.filter_weight = [0.25; 3]).unwrap());
    let mut rec = Recorder::default();
    apply_planar(&mut engine, id, &cfg, &mut r, &mut rec).unwrap();

    let after = engine.block(id).unwrap().fingerprint();
    assert_ne!(before, after);
    assert_eq!(rec.calls[0].0, after);
    assert_eq!(engine.stats().auto_rebuilds, 1);
    assert_eq!(engine.generation_of(id), Some(cfg.generation()));

    apply_planar(&mut engine, id, &cfg, &mut r, &mut rec).unwrap();
    assert_eq!(engine.stats().auto_rebuilds, 1);
}

#[test]
fn reshaped_input_is_a_mismatch() {
    let mut r = rig();
    let cfg = blend_config();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    configure_planar(&mut engine, id, &cfg, &r);

    r.convert.set_rect(crate::foundation::core::Rect::sized(4, 4)).unwrap();
    let err = apply_planar(&mut engine, id, &cfg, &mut r, &mut Recorder::default()).unwrap_err();
    assert!(err.to_string().contains("input 0"));
}

#[test]
fn frame_output_size_is_checked() {
    let mut r = rig();
    let cfg = SessionConfig::default();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("preview", StageRole::Preview { mono: false });

    let mut prescale = r
        .cache
        .allocate_surface("prescale", 8, 4, PixelFormat::I8, 3, None)
        .unwrap();
    r.cache
        .bind_cached(&mut prescale, &[BankLayout::Interleaved; 3], 1)
        .unwrap();
    engine
        .configure(
            id,
            &cfg,
            &[InputDesc::of(&prescale)],
            OutputDesc::frame(16, 8),
        )
        .unwrap();

    prescale.mark_dirty();
    let mut small = FrameRgb::new(8, 4);
    let err = engine
        .apply(
            id,
            &cfg,
            &mut r.cache,
            &mut Recorder::default(),
            &mut [&mut prescale],
            Target::Frame(&mut small),
            FrameParams::default(),
        )
        .unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));
}

#[test]
fn reset_forgets_every_block() {
    let r = rig();
    let mut engine = StageEngine::new();
    let id = engine.add_stage("planar", StageRole::Planar);
    configure_planar(&mut engine, id, &blend_config(), &r);
    assert!(engine.dump().contains("generation=0"));
    engine.reset();
    assert!(engine.block(id).is_none());
    assert!(engine.dump().contains("unconfigured"));
}

#[test]
fn fade_role_attenuates_one_source() {
    let kind = StageRole::Fade.kind(&SessionConfig::default());
    let StageKind::Fade { alphas, .. } = kind else {
        panic!("fade role built {kind:?}");
    };
    assert_eq!(alphas.as_slice(), &[FADE_ALPHA]);
}
