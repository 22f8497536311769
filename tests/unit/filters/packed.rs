use super::*;

#[test]
fn studio_range_extremes() {
    assert_eq!(rgb_to_yuv([0, 0, 0]), [16, 128, 128]);
    assert_eq!(rgb_to_yuv([255, 255, 255]), [235, 128, 128]);
}

#[test]
fn red_pushes_cr_up_and_cb_down() {
    let [y, cb, cr] = rgb_to_yuv([255, 0, 0]);
    assert!(y > 16 && y < 235);
    assert!(cb < 128);
    assert!(cr > 128);
}

#[test]
fn accumulate_moves_toward_the_current_frame() {
    assert_eq!(accumulate([100; 3], [200; 3], [141; 3]), [155; 3]);
    assert_eq!(accumulate([100; 3], [200; 3], [255; 3]), [200; 3]);
    assert_eq!(accumulate([100; 3], [200; 3], [0; 3]), [100; 3]);
    assert_eq!(accumulate([10, 20, 30], [10, 20, 30], [77, 1, 200]), [10, 20, 30]);
}
