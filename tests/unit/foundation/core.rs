use super::*;

#[test]
fn zoom_validation_rejects_degenerate_values() {
    assert!(Zoom::new(0.0, 1.0).is_err());
    assert!(Zoom::new(1.0, f32::NAN).is_err());
    assert!(Zoom::new(17.0, 1.0).is_err());
    assert!(Zoom::new(2.5, 3.0).is_ok());
}

#[test]
fn zoom_apply_rounds_and_never_collapses() {
    assert_eq!(Zoom::one().apply(240, 160), (240, 160));
    assert_eq!(Zoom::new(1.5, 2.0).unwrap().apply(240, 160), (360, 320));
    assert_eq!(Zoom::new(0.01, 0.01).unwrap().apply(10, 10), (1, 1));
}

#[test]
fn rect_fits_checks_both_axes_and_overflow() {
    assert!(Rect::sized(240, 160).fits_in(240, 160));
    assert!(!Rect::sized(241, 160).fits_in(240, 160));
    let r = Rect {
        x: u32::MAX,
        y: 0,
        w: 2,
        h: 1,
    };
    assert!(!r.fits_in(u32::MAX, 1));
    assert_eq!(Rect::sized(3, 2).scaled(2, 4), Rect::sized(6, 8));
}

#[test]
fn bgr555_expansion_hits_full_range() {
    assert_eq!(Rgb8::from_bgr555(0), Rgb8::gray(0));
    assert_eq!(Rgb8::from_bgr555(0x7fff), Rgb8::gray(255));
    assert_eq!(Rgb8::from_bgr555(0x001f), Rgb8::new(255, 0, 0));
    assert_eq!(Rgb8::from_bgr555(0x7c00), Rgb8::new(0, 0, 255));
}

#[test]
fn retrace_parity_alternates() {
    let r = Retrace(7);
    assert_eq!(r.parity(), 1);
    assert_eq!(r.next().parity(), 0);
}

#[test]
fn retrace_parity_selects_the_field() {
    assert_eq!(Retrace(0).field(), Field::Even);
    assert_eq!(Retrace(7).field(), Field::Odd);
    assert_eq!(Retrace(7).next().field(), Field::Even);
}

#[test]
fn unrotated_quad_maps_pixels_by_offset() {
    let q = Quad {
        x: 2,
        y: 1,
        w: 4,
        h: 3,
        rotation: 0.0,
    };
    assert_eq!(q.locate(2, 1), Some((0, 0)));
    assert_eq!(q.locate(5, 3), Some((3, 2)));
    assert_eq!(q.locate(1, 1), None);
    assert_eq!(q.locate(6, 1), None);
    assert_eq!(q.locate(2, 4), None);
    assert!(Quad::covering(4, 3).covers(4, 3));
    assert!(!q.covers(4, 3));
    assert_eq!(q.shifted([-3, 1]).locate(0, 2), Some((1, 0)));
}

#[test]
fn quarter_turn_moves_the_top_left_corner_to_the_top_right() {
    let q = Quad {
        rotation: 90.0,
        ..Quad::covering(2, 2)
    };
    assert_eq!(q.locate(1, 0), Some((0, 0)));
    assert_eq!(q.locate(1, 1), Some((1, 0)));
    assert_eq!(q.locate(0, 0), Some((0, 1)));

    let half = Quad {
        rotation: 180.0,
        ..Quad::covering(3, 2)
    };
    assert_eq!(half.locate(0, 0), Some((2, 1)));
    assert_eq!(half.locate(2, 1), Some((0, 0)));
}

#[test]
fn tilted_quad_leaves_the_frame_corners_uncovered() {
    let q = Quad {
        rotation: 45.0,
        ..Quad::covering(8, 8)
    };
    assert_eq!(q.locate(0, 0), None);
    assert_eq!(q.locate(7, 7), None);
    assert!(q.locate(4, 4).is_some());
}
