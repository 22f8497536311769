use super::*;
use crate::memory::cache::{CacheOpts, TextureCache};

fn surface(format: PixelFormat, planes: u8) -> (TextureCache, Surface) {
    let mut c = TextureCache::new(CacheOpts::default()).unwrap();
    let s = c
        .allocate_surface("s", 12, 8, format, planes, None)
        .unwrap();
    (c, s)
}

#[test]
fn rect_defaults_to_full_surface_and_is_validated() {
    let (_c, mut s) = surface(PixelFormat::I8, 1);
    assert_eq!(s.rect(), Rect::sized(12, 8));
    assert!(s.set_rect(Rect::sized(6, 4)).is_ok());
    assert!(s.set_rect(Rect::sized(13, 4)).is_err());
    assert!(s.set_rect(Rect::sized(0, 4)).is_err());
    assert_eq!(s.rect(), Rect::sized(6, 4));
}

#[test]
fn slot_lookup_wraps_around_the_ring() {
    let (mut c, mut s) = surface(PixelFormat::Rgba8, 1);
    assert_eq!(s.slot_for(0), None);
    c.bind_resident(&mut s, &[BankLayout::Even], 3).unwrap();
    s.mark_dirty();
    c.resolve_preload(&mut s).unwrap();
    assert_eq!(s.shadow_index(), 2);
    assert_eq!(s.slot_for(0), Some(2));
    assert_eq!(s.slot_for(1), Some(0));
    assert_eq!(s.slot_for(2), Some(1));
    assert_eq!(s.slot_for(3), None);
}

#[test]
fn mark_dirty_bumps_revision() {
    let (_c, mut s) = surface(PixelFormat::Bgr555, 1);
    assert_eq!(s.revision(), 0);
    s.mark_dirty();
    s.mark_dirty();
    assert!(s.is_dirty());
    assert_eq!(s.revision(), 2);
}

#[test]
fn byte_accounting_matches_format() {
    let (_c, s) = surface(PixelFormat::Ci8, 3);
    assert_eq!(s.plane_bytes(), 96);
    assert_eq!(s.host_bytes(), 3 * 96 + 3 * LUT_HOST_BYTES);
    assert_eq!(s.fast_bytes(), 0);
    assert_eq!(
        s.shape(),
        SurfaceShape {
            width: 12,
            height: 8,
            format: PixelFormat::Ci8,
            planes: 3
        }
    );
}
