use crate::filters::{Texels, scale2x};
use crate::foundation::core::Field;
use crate::foundation::math::lerp255;
use crate::stage::command::{Combine, Compare};

fn lerp3(a: [u8; 3], b: [u8; 3], k: [u8; 3]) -> [u8; 3] {
    [
        lerp255(a[0], b[0], k[0]),
        lerp255(a[1], b[1], k[1]),
        lerp255(a[2], b[2], k[2]),
    ]
}

/// Planar pixel `(x, y)` of a surface `scale` times the size of unit 0.
///
/// Units follow the fetch order of the block: `[t, t-1, t-2]` for temporal combines and
/// `[color, yuv]` for the soft Scale2x.
pub(crate) fn planar_pixel(
    combine: &Combine,
    compare: Option<Compare>,
    units: &[Texels],
    scale: u32,
    field: Field,
    x: u32,
    y: u32,
) -> [u8; 3] {
    let sx = i64::from(x / scale);
    let sy = i64::from(y / scale);
    match combine {
        Combine::Lerp { k } => lerp3(units[1].rgb(sx, sy), units[0].rgb(sx, sy), *k),
        Combine::Deflicker { k } => {
            let cur = units[0].rgb(sx, sy);
            if cur == units[2].rgb(sx, sy) {
                lerp3(units[1].rgb(sx, sy), cur, *k)
            } else {
                cur
            }
        }
        Combine::Edge2x(rule) => {
            let u = x * 2 / scale;
            let v = y * 2 / scale;
            scale2x::edge_pixel(
                *rule,
                compare,
                &units[0],
                units.get(1),
                i64::from(u / 2),
                i64::from(v / 2),
                u & 1,
                v & 1,
                field,
            )
        }
        _ => units[0].rgb(sx, sy),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/planar.rs"]
mod tests;
