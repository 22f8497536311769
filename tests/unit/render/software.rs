use super::*;
use crate::config::options::{FilterKind, ScalerKind};
use crate::config::profile::ColorMatrix;
use crate::memory::cache::{CacheOpts, TextureCache};
use crate::render::backend::FrameRgb;
use crate::stage::command::{InputDesc, OutputDesc, PackedMode, StageKind};
use crate::surface::BankLayout;

fn cache() -> TextureCache {
    TextureCache::new(CacheOpts {
        tmem_bytes: 1 << 20,
        host_budget_bytes: 1 << 24,
    })
    .unwrap()
}

fn serial() -> SoftwareRenderer {
    SoftwareRenderer::new(&RendererOpts {
        parallel: false,
        threads: None,
    })
    .unwrap()
}

fn rgba_source(c: &mut TextureCache, w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Surface {
    let mut s = c
        .allocate_surface("convert", w, h, PixelFormat::Rgba8, 1, None)
        .unwrap();
    c.bind_resident(&mut s, &[BankLayout::Interleaved], 1).unwrap();
    let plane = &mut s.planes_mut()[0];
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            plane[i..i + 3].copy_from_slice(&f(x, y));
            plane[i + 3] = 0xFF;
        }
    }
    s.mark_dirty();
    s
}

fn split_source(c: &mut TextureCache, w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Surface {
    let mut s = c
        .allocate_surface("prescale", w, h, PixelFormat::I8, 3, None)
        .unwrap();
    c.bind_cached(&mut s, &[BankLayout::Interleaved; 3], 1).unwrap();
    let planes = s.planes_mut();
    for y in 0..h {
        for x in 0..w {
            let v = f(x, y);
            for ch in 0..3 {
                planes[ch][(y * w + x) as usize] = v[ch];
            }
        }
    }
    s.mark_dirty();
    s
}

fn preview_block(src: &Surface, scaler: ScalerKind, w: u32, h: u32) -> CommandBlock {
    CommandBlock::build(
        StageKind::Preview {
            matrix: ColorMatrix::Identity,
            scaler,
            output_gamma: 1.0,
            mono: false,
        },
        &[InputDesc::of(src)],
        OutputDesc::frame(w, h),
    )
    .unwrap()
}

#[test]
fn planar_copy_splits_and_magnifies() {
    let mut c = cache();
    let mut src = rgba_source(&mut c, 2, 2, |x, y| [(x * 100) as u8, (y * 100) as u8, 42]);
    let mut planar = c
        .allocate_surface("planar", 4, 4, PixelFormat::Ci8, 3, None)
        .unwrap();
    let block = CommandBlock::build(
        StageKind::Planar {
            filter: FilterKind::None,
            weight: [255; 3],
        },
        &[InputDesc::of(&src)],
        OutputDesc::of(&planar),
    )
    .unwrap();

    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];
    serial()
        .execute(
            &block,
            &views,
            &mut Target::Surface(&mut planar),
            FrameParams::default(),
        )
        .unwrap();

    assert_eq!(planar.plane(0)[3], 100);
    assert_eq!(planar.plane(1)[3], 0);
    assert_eq!(planar.plane(1)[3 * 4], 100);
    assert!(planar.plane(2).iter().all(|&v| v == 42));
}

#[test]
fn identity_preview_reproduces_the_planes() {
    let mut c = cache();
    let mut src = split_source(&mut c, 3, 2, |x, y| [(x * 70) as u8, (y * 90) as u8, 5]);
    let block = preview_block(&src, ScalerKind::Nearest, 3, 2);
    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];
    let mut frame = FrameRgb::new(3, 2);
    serial()
        .execute(
            &block,
            &views,
            &mut Target::Frame(&mut frame),
            FrameParams::default(),
        )
        .unwrap();
    assert_eq!(frame.pixel(2, 1), [140, 90, 5]);
    assert_eq!(frame.pixel(0, 0), [0, 0, 5]);
}

#[test]
fn worker_pool_output_matches_serial_output() {
    let mut c = cache();
    let mut src = split_source(&mut c, 16, 9, |x, y| {
        [(x * 15) as u8, (y * 27) as u8, ((x + y) * 9) as u8]
    });
    let block = preview_block(&src, ScalerKind::Bilinear, 37, 21);
    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];

    let mut a = FrameRgb::new(37, 21);
    let mut b = FrameRgb::new(37, 21);
    serial()
        .execute(&block, &views, &mut Target::Frame(&mut a), FrameParams::default())
        .unwrap();
    let mut pooled = SoftwareRenderer::new(&RendererOpts {
        parallel: true,
        threads: Some(3),
    })
    .unwrap();
    pooled
        .execute(&block, &views, &mut Target::Frame(&mut b), FrameParams::default())
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn accumulate_blends_into_the_previous_contents() {
    let mut c = cache();
    let mut src = rgba_source(&mut c, 2, 1, |_, _| [200; 3]);
    let mut packed = c
        .allocate_surface("packed", 2, 1, PixelFormat::Rgba8, 1, None)
        .unwrap();
    for px in packed.planes_mut()[0].chunks_exact_mut(4) {
        px.copy_from_slice(&[100, 100, 100, 0xFF]);
    }
    let block = CommandBlock::build(
        StageKind::Packed {
            mode: PackedMode::Accumulate,
            weight: [141; 3],
        },
        &[InputDesc::of(&src)],
        OutputDesc::of(&packed),
    )
    .unwrap();
    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];
    serial()
        .execute(
            &block,
            &views,
            &mut Target::Surface(&mut packed),
            FrameParams::default(),
        )
        .unwrap();
    assert_eq!(&packed.plane(0)[..4], &[155, 155, 155, 0xFF]);
}

#[test]
fn missing_views_are_a_mismatch() {
    let mut c = cache();
    let src = split_source(&mut c, 2, 2, |_, _| [0; 3]);
    let block = preview_block(&src, ScalerKind::Area, 2, 2);
    let mut frame = FrameRgb::new(2, 2);
    let err = serial()
        .execute(&block, &[], &mut Target::Frame(&mut frame), FrameParams::default())
        .unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));
}

#[test]
fn zero_threads_is_rejected() {
    let err = crate::render::backend::create_renderer(
        BackendKind::Software,
        &RendererOpts {
            parallel: true,
            threads: Some(0),
        },
    )
    .unwrap_err();
    assert!(matches!(err, GxError::Validation(_)));
}

fn placed_preview(src: &Surface, dest: crate::foundation::core::Quad) -> CommandBlock {
    CommandBlock::build(
        StageKind::Preview {
            matrix: ColorMatrix::Identity,
            scaler: ScalerKind::Nearest,
            output_gamma: 1.0,
            mono: false,
        },
        &[InputDesc::of(src)],
        OutputDesc::Frame {
            width: 5,
            height: 4,
            dest,
        },
    )
    .unwrap()
}

#[test]
fn preview_draws_into_the_destination_and_honors_the_offset() {
    let mut c = cache();
    let mut src = split_source(&mut c, 3, 2, |x, y| [(10 + x * 70) as u8, (20 + y * 90) as u8, 5]);
    let dest = crate::foundation::core::Quad {
        x: 1,
        y: 1,
        w: 3,
        h: 2,
        rotation: 0.0,
    };
    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];

    let mut frame = FrameRgb::new(5, 4);
    serial()
        .execute(
            &placed_preview(&src, dest),
            &views,
            &mut Target::Frame(&mut frame),
            FrameParams::default(),
        )
        .unwrap();
    assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
    assert_eq!(frame.pixel(1, 1), [10, 20, 5]);
    assert_eq!(frame.pixel(3, 2), [150, 110, 5]);
    assert_eq!(frame.pixel(4, 3), [0, 0, 0]);

    let mut shifted = FrameRgb::new(5, 4);
    serial()
        .execute(
            &placed_preview(&src, dest),
            &views,
            &mut Target::Frame(&mut shifted),
            FrameParams {
                offset: [1, 0],
                ..FrameParams::default()
            },
        )
        .unwrap();
    assert_eq!(shifted.pixel(1, 1), [0, 0, 0]);
    assert_eq!(shifted.pixel(2, 1), [10, 20, 5]);
    assert_eq!(shifted.pixel(4, 2), [150, 110, 5]);
}

#[test]
fn half_turn_preview_mirrors_both_axes() {
    let mut c = cache();
    let mut src = split_source(&mut c, 3, 2, |x, y| [(10 + x * 70) as u8, (20 + y * 90) as u8, 5]);
    let dest = crate::foundation::core::Quad {
        x: 1,
        y: 1,
        w: 3,
        h: 2,
        rotation: 180.0,
    };
    c.resolve_preload(&mut src).unwrap();
    let views = [c.view(&src, 0).unwrap()];
    let mut frame = FrameRgb::new(5, 4);
    serial()
        .execute(
            &placed_preview(&src, dest),
            &views,
            &mut Target::Frame(&mut frame),
            FrameParams::default(),
        )
        .unwrap();
    assert_eq!(frame.pixel(1, 1), [150, 110, 5]);
    assert_eq!(frame.pixel(3, 2), [10, 20, 5]);
    assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
}
