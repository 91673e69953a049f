use glam::{Mat3, Quat};

/// Similarity above which a splat counts as belonging to the queried category.
pub const SIMILARITY_THRESHOLD: f32 = 0.25;

/// Maps a rotation component to one byte: `round(v * 128 + 128) mod 256`.
///
/// Inside [-1, 1] the top code saturates at 255 so the round trip stays within 1/128.
/// Anything outside that range wraps around instead of clamping.
#[inline]
pub fn quantize(v: f32) -> u8 {
    let code = (v * 128.0 + 128.0).round();
    if (-1.0..=1.0).contains(&v) {
        code.min(255.0) as u8
    } else {
        code.rem_euclid(256.0) as u8
    }
}

#[inline]
pub fn dequantize(b: u8) -> f32 {
    (b as f32 - 128.0) / 128.0
}

/// Row-major 3x3 rotation matrix for `q`.
#[inline]
pub fn rotation_matrix(q: Quat) -> [f32; 9] {
    // glam stores columns; the transpose's columns are our rows.
    Mat3::from_quat(q).transpose().to_cols_array()
}

#[inline]
pub(crate) fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

#[inline]
pub(crate) fn quat_from_wxyz(wxyz: &[f32]) -> Quat {
    Quat::from_xyzw(wxyz[1], wxyz[2], wxyz[3], wxyz[0])
}

/// Writes `q` as (w, x, y, z), clamped to [-1, 1] so rounding drift never wraps on quantize.
#[inline]
pub(crate) fn write_wxyz(q: Quat, out: &mut [f32]) {
    out[0] = q.w.clamp(-1.0, 1.0);
    out[1] = q.x.clamp(-1.0, 1.0);
    out[2] = q.y.clamp(-1.0, 1.0);
    out[3] = q.z.clamp(-1.0, 1.0);
}
