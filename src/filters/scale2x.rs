//! Edge-directed 2x magnifiers.
//!
//! For center `E` the neighbors are `B` (up), `D` (left), `F` (right) and `H` (down). Output
//! subpixel `(dx, dy)` of `E` picks `V = dy ? H : B` and `N = dx ? F : D`.

use crate::filters::Texels;
use crate::foundation::core::Field;
use crate::foundation::math::avg_u8;
use crate::stage::command::{Compare, EdgeRule};

fn avg3(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    [avg_u8(a[0], b[0]), avg_u8(a[1], b[1]), avg_u8(a[2], b[2])]
}

fn within(a: [u8; 3], b: [u8; 3], tol: [u8; 3]) -> bool {
    (0..3).all(|c| a[c].abs_diff(b[c]) <= tol[c])
}

/// Subpixel `(dx, dy)` of source pixel `(sx, sy)`.
///
/// `yuv` holds the packed YUV copy used by [`Compare::YuvTolerance`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn edge_pixel(
    rule: EdgeRule,
    compare: Option<Compare>,
    color: &Texels,
    yuv: Option<&Texels>,
    sx: i64,
    sy: i64,
    dx: u32,
    dy: u32,
    field: Field,
) -> [u8; 3] {
    let e = color.rgb(sx, sy);
    match rule {
        EdgeRule::Nearest => e,
        EdgeRule::Scan => {
            if dy == field.index() {
                e
            } else {
                [0; 3]
            }
        }
        EdgeRule::Eagle => {
            let ox = if dx == 1 { 1 } else { -1 };
            let oy = if dy == 1 { 1 } else { -1 };
            let side = color.rgb(sx + ox, sy);
            let vert = color.rgb(sx, sy + oy);
            let diag = color.rgb(sx + ox, sy + oy);
            if side == vert && vert == diag {
                diag
            } else {
                e
            }
        }
        EdgeRule::Scale2x | EdgeRule::Scale2xPlus | EdgeRule::Scale2xEx => {
            let vy = if dy == 1 { 1 } else { -1 };
            let nx = if dx == 1 { 1 } else { -1 };
            if let (Some(Compare::YuvTolerance(tol)), Some(yuv)) = (compare, yuv) {
                let sim = |a: (i64, i64), b: (i64, i64)| {
                    within(yuv.rgb(a.0, a.1), yuv.rgb(b.0, b.1), tol)
                };
                let (b, h, d, f) = ((sx, sy - 1), (sx, sy + 1), (sx - 1, sy), (sx + 1, sy));
                let (v, n) = ((sx, sy + vy), (sx + nx, sy));
                if sim(v, n) && (!sim(b, h) || !sim(d, f)) {
                    let vn = color.rgb(v.0, v.1);
                    let nn = color.rgb(n.0, n.1);
                    let mid = [
                        ((u16::from(vn[0]) + u16::from(nn[0])) / 2) as u8,
                        ((u16::from(vn[1]) + u16::from(nn[1])) / 2) as u8,
                        ((u16::from(vn[2]) + u16::from(nn[2])) / 2) as u8,
                    ];
                    return avg3(e, mid);
                }
                return e;
            }
            let b = color.rgb(sx, sy - 1);
            let h = color.rgb(sx, sy + 1);
            let d = color.rgb(sx - 1, sy);
            let f = color.rgb(sx + 1, sy);
            let v = if dy == 1 { h } else { b };
            let n = if dx == 1 { f } else { d };
            if v == n && b != h && d != f {
                if rule == EdgeRule::Scale2xPlus {
                    avg3(v, e)
                } else {
                    v
                }
            } else {
                e
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filters/scale2x.rs"]
mod tests;
