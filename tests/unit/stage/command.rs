use super::*;

fn input(w: u32, h: u32, format: PixelFormat, planes: u8, shadows: usize, placement: Placement) -> InputDesc {
    InputDesc {
        shape: SurfaceShape {
            width: w,
            height: h,
            format,
            planes,
        },
        rect: Rect::sized(w, h),
        shadows,
        placement,
    }
}

fn convert() -> InputDesc {
    input(240, 160, PixelFormat::Bgr555, 1, 3, Placement::Resident)
}

fn planar_out(scale: u32) -> OutputDesc {
    OutputDesc::Surface(SurfaceShape {
        width: 240 * scale,
        height: 160 * scale,
        format: PixelFormat::Ci8,
        planes: 3,
    })
}

fn planar_in() -> InputDesc {
    input(240, 160, PixelFormat::Ci8, 3, 3, Placement::Cached)
}

fn prescale_out() -> OutputDesc {
    OutputDesc::Surface(SurfaceShape {
        width: 240,
        height: 160,
        format: PixelFormat::I8,
        planes: 3,
    })
}

fn planar(filter: FilterKind) -> StageKind {
    StageKind::Planar {
        filter,
        weight: [141; 3],
    }
}

#[test]
fn blend_fetches_current_and_previous_frame() {
    let b = CommandBlock::build(planar(FilterKind::Blend), &[convert()], planar_out(1)).unwrap();
    assert_eq!(b.fetches().collect::<Vec<_>>(), vec![(0, 0), (0, 1)]);
    assert!(b.ops().contains(&Op::Combine(Combine::Lerp { k: [141; 3] })));
    assert!(matches!(b.ops().last(), Some(Op::Draw { .. })));
    assert!(!b.is_empty());
    assert_eq!(b.len(), b.bytes().len());
}

#[test]
fn deflicker_needs_three_shadow_slots() {
    let mut shallow = convert();
    shallow.shadows = 2;
    let err = CommandBlock::build(planar(FilterKind::Deflicker), &[shallow], planar_out(1))
        .unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));

    let b = CommandBlock::build(planar(FilterKind::Deflicker), &[convert()], planar_out(1))
        .unwrap();
    assert_eq!(b.fetches().map(|(_, lb)| lb).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(b.ops().contains(&Op::Compare(Compare::ExactRgb)));
}

#[test]
fn cached_inputs_have_no_history() {
    let mut cached = convert();
    cached.placement = Placement::Cached;
    let err =
        CommandBlock::build(planar(FilterKind::Blend), &[cached], planar_out(1)).unwrap_err();
    assert!(err.to_string().contains("cached"));
}

#[test]
fn two_x_filters_need_a_doubled_output() {
    let err =
        CommandBlock::build(planar(FilterKind::Scale2x), &[convert()], planar_out(1)).unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));
    let b = CommandBlock::build(planar(FilterKind::Scale2x), &[convert()], planar_out(2)).unwrap();
    assert!(
        b.ops()
            .contains(&Op::Combine(Combine::Edge2x(EdgeRule::Scale2x)))
    );
    let err = CommandBlock::build(
        planar(FilterKind::None),
        &[convert()],
        OutputDesc::Surface(SurfaceShape {
            width: 300,
            height: 160,
            format: PixelFormat::Ci8,
            planes: 3,
        }),
    )
    .unwrap_err();
    assert!(err.to_string().contains("integer multiple"));
}

#[test]
fn scale2x_ex_reads_the_packed_yuv_surface() {
    let packed = input(240, 160, PixelFormat::Rgba8, 1, 1, Placement::Resident);
    let b = CommandBlock::build(
        planar(FilterKind::Scale2xEx),
        &[convert(), packed],
        planar_out(2),
    )
    .unwrap();
    assert_eq!(b.fetches().collect::<Vec<_>>(), vec![(0, 0), (1, 0)]);
    assert!(
        b.ops()
            .contains(&Op::Compare(Compare::YuvTolerance(YUV_TOLERANCE)))
    );
    assert!(
        CommandBlock::build(planar(FilterKind::Scale2xEx), &[convert()], planar_out(2)).is_err()
    );
}

#[test]
fn packed_stage_output_must_match_the_source() {
    let kind = StageKind::Packed {
        mode: PackedMode::Yuv,
        weight: [255; 3],
    };
    let wrong = OutputDesc::Surface(SurfaceShape {
        width: 240,
        height: 160,
        format: PixelFormat::I8,
        planes: 3,
    });
    assert!(CommandBlock::build(kind.clone(), &[convert()], wrong).is_err());
    let ok = OutputDesc::Surface(SurfaceShape {
        width: 240,
        height: 160,
        format: PixelFormat::Rgba8,
        planes: 1,
    });
    let b = CommandBlock::build(kind, &[convert()], ok).unwrap();
    assert!(b.ops().contains(&Op::Combine(Combine::Yuv)));
}

#[test]
fn prescale_uses_wide_tables_only_when_dithered() {
    let plain = CommandBlock::build(
        StageKind::Prescale {
            dither: DitherMode::None,
        },
        &[planar_in()],
        prescale_out(),
    )
    .unwrap();
    assert!(plain.ops().contains(&Op::Lookup(Lookup::Lut { wide: false })));
    assert!(
        !plain
            .ops()
            .iter()
            .any(|op| matches!(op, Op::Lookup(Lookup::Pattern(_))))
    );

    let dithered = CommandBlock::build(
        StageKind::Prescale {
            dither: DitherMode::Bayer4x4,
        },
        &[planar_in()],
        prescale_out(),
    )
    .unwrap();
    assert!(
        dithered
            .ops()
            .contains(&Op::Lookup(Lookup::Pattern(DitherMode::Bayer4x4)))
    );
    assert_ne!(plain.fingerprint(), dithered.fingerprint());
}

#[test]
fn prescale_input_must_be_indexed() {
    let mut wrong = planar_in();
    wrong.shape.format = PixelFormat::I8;
    let err = CommandBlock::build(
        StageKind::Prescale {
            dither: DitherMode::None,
        },
        &[wrong],
        prescale_out(),
    )
    .unwrap_err();
    assert!(matches!(err, GxError::ConfigurationMismatch(_)));
}

#[test]
fn fade_source_limit_depends_on_dither() {
    let fade = |dither, n: usize| StageKind::Fade {
        dither,
        alphas: std::iter::repeat_n(0xC0, n).collect(),
    };
    let inputs: Vec<InputDesc> = (0..8).map(|_| planar_in()).collect();
    assert!(CommandBlock::build(fade(DitherMode::None, 8), &inputs, prescale_out()).is_ok());
    assert!(
        CommandBlock::build(fade(DitherMode::Threshold, 8), &inputs, prescale_out()).is_err()
    );
    assert!(
        CommandBlock::build(fade(DitherMode::Threshold, 7), &inputs[..7], prescale_out()).is_ok()
    );
    assert!(CommandBlock::build(fade(DitherMode::None, 0), &[], prescale_out()).is_err());
}

#[test]
fn preview_writes_a_frame() {
    let kind = StageKind::Preview {
        matrix: ColorMatrix::Identity,
        scaler: ScalerKind::Area,
        output_gamma: 2.2,
        mono: false,
    };
    let input = input(240, 160, PixelFormat::I8, 3, 1, Placement::Cached);
    assert!(CommandBlock::build(kind.clone(), &[input], prescale_out()).is_err());
    let b = CommandBlock::build(kind, &[input], OutputDesc::frame(480, 320)).unwrap();
    assert!(b.ops().contains(&Op::Combine(Combine::Scale(ScalerKind::Area))));
    assert!(!b.ops().iter().any(|op| matches!(op, Op::Place(_))));
    assert!(matches!(
        b.ops().last(),
        Some(Op::Draw { dst, .. }) if *dst == Rect::sized(480, 320)
    ));
}

#[test]
fn preview_places_a_rotated_or_offset_quad() {
    let kind = StageKind::Preview {
        matrix: ColorMatrix::Identity,
        scaler: ScalerKind::Nearest,
        output_gamma: 1.0,
        mono: false,
    };
    let input = input(240, 160, PixelFormat::I8, 3, 1, Placement::Cached);
    let dest = Quad {
        x: 40,
        y: -8,
        w: 240,
        h: 160,
        rotation: 90.0,
    };
    let placed = CommandBlock::build(
        kind.clone(),
        &[input],
        OutputDesc::Frame {
            width: 320,
            height: 240,
            dest,
        },
    )
    .unwrap();
    assert!(placed.ops().contains(&Op::Place(dest)));
    let plain = CommandBlock::build(kind.clone(), &[input], OutputDesc::frame(320, 240)).unwrap();
    assert_ne!(placed.fingerprint(), plain.fingerprint());

    let flat = OutputDesc::Frame {
        width: 320,
        height: 240,
        dest: Quad { w: 0, ..dest },
    };
    assert!(CommandBlock::build(kind, &[input], flat).is_err());
}

#[test]
fn identical_inputs_give_identical_blocks() {
    let a = CommandBlock::build(planar(FilterKind::Blend), &[convert()], planar_out(1)).unwrap();
    let b = CommandBlock::build(planar(FilterKind::Blend), &[convert()], planar_out(1)).unwrap();
    assert_eq!(a.bytes(), b.bytes());
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.dump(), b.dump());

    let c = CommandBlock::build(
        StageKind::Planar {
            filter: FilterKind::Blend,
            weight: [128; 3],
        },
        &[convert()],
        planar_out(1),
    )
    .unwrap();
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn dump_lists_inputs_and_ops() {
    let b = CommandBlock::build(planar(FilterKind::Blend), &[convert()], planar_out(1)).unwrap();
    let d = b.dump();
    assert!(d.contains("inputs: 1"));
    assert!(d.contains("I0: 240x160 Bgr555"));
    assert!(d.contains("Lerp"));
    assert!(d.contains("fingerprint:"));
}
