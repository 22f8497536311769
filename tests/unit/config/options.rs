use super::*;

#[test]
fn defaults_match_documented_values() {
    let c = SessionConfig::default();
    assert_eq!(c.filter, FilterKind::None);
    assert_eq!(c.weight_bytes(), [141; 3]);
    assert_eq!(c.dither, DitherMode::Threshold);
    assert_eq!(c.scaler, ScalerKind::Area);
    assert_eq!(c.profile, Profile::Gbi);
    assert_eq!(c.scale, 1);
    assert_eq!(c.zoom, Zoom::default());
    assert_eq!(c.generation(), 0);
    c.validate().unwrap();
}

#[test]
fn json_round_trip_skips_generation() {
    let mut c = SessionConfig::default();
    c.update(|c| c.dither = DitherMode::Bayer4x4).unwrap();
    let s = c.to_json_pretty().unwrap();
    assert!(!s.contains("generation"));
    let back = SessionConfig::from_json(&s).unwrap();
    assert_eq!(back.dither, DitherMode::Bayer4x4);
    assert_eq!(back.generation(), 0);
}

#[test]
fn json_rejects_unknown_fields_and_bad_values() {
    assert!(matches!(
        SessionConfig::from_json(r#"{"filtr":"blend"}"#).unwrap_err(),
        GxError::Serde(_)
    ));
    assert!(matches!(
        SessionConfig::from_json(r#"{"scale":9}"#).unwrap_err(),
        GxError::Validation(_)
    ));
    assert!(matches!(
        SessionConfig::from_json(r#"{"filter":"scale2x","scale":1}"#).unwrap_err(),
        GxError::Validation(_)
    ));
    let ok = SessionConfig::from_json(r#"{"filter":"scale2x","scale":2,"profile":"srgb"}"#)
        .unwrap();
    assert_eq!(ok.filter, FilterKind::Scale2x);
}

#[test]
fn update_bumps_generation_only_on_effective_change() {
    let mut c = SessionConfig::default();
    assert!(!c.update(|c| c.scaler = ScalerKind::Area).unwrap());
    assert_eq!(c.generation(), 0);
    assert!(c.update(|c| c.scaler = ScalerKind::Box).unwrap());
    assert_eq!(c.generation(), 1);

    let err = c.update(|c| c.scale = 0).unwrap_err();
    assert!(matches!(err, GxError::Validation(_)));
    assert_eq!(c.scale, 1, "failed update must roll back");
    assert_eq!(c.generation(), 1);
}

#[test]
fn degrade_steps_down_until_exhausted() {
    let mut c = SessionConfig::default();
    c.update(|c| {
        c.filter = FilterKind::Scale2xEx;
        c.scale = 2;
        c.prescale = true;
    })
    .unwrap();

    let d1 = c.degraded().unwrap();
    assert!(!d1.prescale);
    assert!(d1.generation() > c.generation());
    let d2 = d1.degraded().unwrap();
    assert_eq!(d2.scale, 1);
    assert_eq!(d2.filter, FilterKind::None);
    d2.validate().unwrap();
    assert!(d2.degraded().is_none());

    let mut acc = SessionConfig::default();
    acc.update(|c| c.filter = FilterKind::Accumulate).unwrap();
    assert_eq!(acc.degraded().unwrap().filter, FilterKind::Blend);
}

#[test]
fn overrides_replace_profile_fields() {
    let mut c = SessionConfig::default();
    c.update(|c| {
        c.matrix = Some(ColorMatrix::Psp);
        c.trc = Some(Trc::Linear);
        c.output_gamma = Some(1.7);
    })
    .unwrap();
    let b = c.bundle();
    assert_eq!(b.matrix, ColorMatrix::Psp);
    assert_eq!(b.lut.trc, Trc::Linear);
    assert_eq!(b.output_gamma, 1.7);
}

#[test]
fn layout_key_ignores_presentation_only_options() {
    let a = SessionConfig::default();
    let mut b = a.clone();
    b.update(|c| {
        c.dither = DitherMode::None;
        c.zoom = Zoom::one();
    })
    .unwrap();
    assert_eq!(a.layout_key(), b.layout_key());
    b.update(|c| c.filter = FilterKind::Accumulate).unwrap();
    assert_ne!(a.layout_key(), b.layout_key());
}

#[test]
fn filter_catalog_properties() {
    assert_eq!(FilterKind::Deflicker.look_back(), 2);
    assert_eq!(FilterKind::Blend.look_back(), 1);
    assert!(FilterKind::Scale2xEx.needs_packed() && FilterKind::Scale2xEx.is_2x());
    assert!(!FilterKind::Accumulate.is_2x());
    assert!(DitherMode::Bayer2x2.is_fast());
    assert!(!DitherMode::Cluster4x4.is_fast());
}

#[test]
fn presentation_centers_the_zoomed_frame_in_the_viewport() {
    let mut c = SessionConfig::default();
    assert_eq!(c.presentation(240, 160), ((480, 320), Quad::covering(480, 320)));

    c.zoom = Zoom::one();
    c.viewport = Some([300, 200]);
    c.rotation = 30.0;
    let ((fw, fh), quad) = c.presentation(240, 160);
    assert_eq!((fw, fh), (300, 200));
    assert_eq!((quad.x, quad.y, quad.w, quad.h), (30, 20, 240, 160));
    assert_eq!(quad.rotation, 30.0);

    c.viewport = Some([100, 100]);
    let (_, quad) = c.presentation(240, 160);
    assert_eq!((quad.x, quad.y), (-70, -30));

    c.dest = Some(Rect {
        x: 5,
        y: 6,
        w: 50,
        h: 40,
    });
    let (_, quad) = c.presentation(240, 160);
    assert_eq!((quad.x, quad.y, quad.w, quad.h), (5, 6, 50, 40));
}

#[test]
fn presentation_options_are_validated() {
    let mut c = SessionConfig::default();
    assert!(c.update(|c| c.rotation = f32::NAN).is_err());
    assert!(c.update(|c| c.viewport = Some([0, 10])).is_err());
    assert!(
        c.update(|c| c.dest = Some(Rect::sized(MAX_EXTENT + 1, 4)))
            .is_err()
    );
    assert!(c.update(|c| c.offset = [-(MAX_EXTENT as i32) - 1, 0]).is_err());
    assert_eq!(c.generation(), 0);
    assert!(c.update(|c| c.offset = [-8, 4]).unwrap());
}

#[test]
fn rotation_changes_the_layout_only_with_a_prescale_target() {
    let mut c = SessionConfig::default();
    let key = c.layout_key();
    c.update(|c| c.rotation = 90.0).unwrap();
    assert_eq!(c.layout_key(), key);
    c.update(|c| c.prescale = true).unwrap();
    let key = c.layout_key();
    c.update(|c| c.rotation = 45.0).unwrap();
    assert_ne!(c.layout_key(), key);
}
