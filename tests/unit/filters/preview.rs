use super::*;
use crate::config::profile::ColorMatrix;

fn img(w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> RgbImage {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&f(x, y));
        }
    }
    RgbImage { w, h, data }
}

const SCALERS: [ScalerKind; 4] = [
    ScalerKind::Nearest,
    ScalerKind::Bilinear,
    ScalerKind::Area,
    ScalerKind::Box,
];

#[test]
fn identity_matrix_passes_planes_through() {
    let m = ColorMatrix::Identity.coeffs();
    for v in [[0, 0, 0], [12, 200, 99], [255, 255, 255]] {
        assert_eq!(compose(&m, false, v), v);
    }
}

#[test]
fn monochrome_writes_one_value_to_every_channel() {
    let m = ColorMatrix::Gbi.coeffs();
    let [r, g, b] = compose(&m, true, [200, 40, 90]);
    assert_eq!(r, g);
    assert_eq!(g, b);
}

#[test]
fn every_scaler_keeps_flat_images_flat() {
    let src = img(5, 3, |_, _| [17, 130, 250]);
    for s in SCALERS {
        for (dw, dh) in [(5, 3), (10, 6), (13, 7), (3, 2)] {
            for y in 0..dh {
                for x in 0..dw {
                    assert_eq!(sample(s, &src, dw, dh, x, y), [17, 130, 250], "{s:?} {dw}x{dh}");
                }
            }
        }
    }
}

#[test]
fn same_size_sampling_is_exact() {
    let src = img(4, 4, |x, y| [(x * 50) as u8, (y * 50) as u8, 9]);
    for s in SCALERS {
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(sample(s, &src, 4, 4, x, y), [(x * 50) as u8, (y * 50) as u8, 9]);
            }
        }
    }
}

#[test]
fn area_downscale_averages_covered_pixels() {
    let src = img(2, 1, |x, _| if x == 0 { [0; 3] } else { [255; 3] });
    assert_eq!(sample(ScalerKind::Area, &src, 1, 1, 0, 0), [128; 3]);
}

#[test]
fn nearest_doubles_pixels() {
    let src = img(2, 1, |x, _| [(x * 200) as u8; 3]);
    let row: Vec<u8> = (0..4)
        .map(|x| sample(ScalerKind::Nearest, &src, 4, 1, x, 0)[0])
        .collect();
    assert_eq!(row, vec![0, 0, 200, 200]);
}

#[test]
fn gamma_table_endpoints_and_order() {
    let id = gamma_table(1.0);
    assert!(id.iter().enumerate().all(|(i, &v)| v as usize == i));
    let enc = gamma_table(2.2);
    assert_eq!(enc[0], 0);
    assert_eq!(enc[255], 255);
    assert!(enc.windows(2).all(|w| w[0] <= w[1]));
    assert!(enc[128] > 128);
}
