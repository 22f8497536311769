/// `a*(255-k) + b*k`, rounded back to 8 bits. `k = 0` keeps `a`, `k = 255` yields `b`.
pub(crate) fn lerp255(a: u8, b: u8, k: u8) -> u8 {
    let k = u32::from(k);
    ((u32::from(a) * (255 - k) + u32::from(b) * k + 127) / 255) as u8
}

/// Rounded midpoint.
pub(crate) fn avg_u8(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b) + 1) >> 1) as u8
}

pub(crate) fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Map a `0..=1` weight to its register byte, rounding to nearest.
pub(crate) fn weight_to_byte(w: f32) -> u8 {
    if !w.is_finite() {
        return 0;
    }
    (w.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// `(sin, cos)` of an angle in degrees; quarter turns are exact.
pub(crate) fn sin_cos_deg(deg: f32) -> (f64, f64) {
    let d = f64::from(deg).rem_euclid(360.0);
    if d == 0.0 {
        (0.0, 1.0)
    } else if d == 90.0 {
        (1.0, 0.0)
    } else if d == 180.0 {
        (0.0, -1.0)
    } else if d == 270.0 {
        (-1.0, 0.0)
    } else {
        d.to_radians().sin_cos()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
