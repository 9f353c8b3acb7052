//! Elementwise kernels over pre-sized `f64` buffers.
//!
//! All binary kernels require equal-length slices; this is a buffer contract
//! checked only in debug builds.

#[inline]
pub fn add(y: &mut [f64], x: &[f64]) {
    debug_assert_eq!(y.len(), x.len());
    for (a, b) in y.iter_mut().zip(x) {
        *a += b;
    }
}

#[inline]
pub fn scale(y: &mut [f64], s: f64) {
    for a in y.iter_mut() {
        *a *= s;
    }
}

/// `y += s * x`
#[inline]
pub fn add_scaled(y: &mut [f64], x: &[f64], s: f64) {
    debug_assert_eq!(y.len(), x.len());
    for (a, b) in y.iter_mut().zip(x) {
        *a += s * b;
    }
}

/// `out = a ⊙ b`
#[inline]
pub fn hadamard(out: &mut [f64], a: &[f64], b: &[f64]) {
    debug_assert_eq!(out.len(), a.len());
    debug_assert_eq!(out.len(), b.len());
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x * y;
    }
}

#[inline]
pub fn copy(dst: &mut [f64], src: &[f64]) {
    dst.copy_from_slice(src);
}

#[inline]
pub fn zero(y: &mut [f64]) {
    y.fill(0.0);
}

pub fn one_norm(y: &[f64]) -> f64 {
    y.iter().map(|v| v.abs()).sum()
}

/// Clamp every element to `[-limit, limit]`. Returns whether anything moved.
pub fn clip(y: &mut [f64], limit: f64) -> bool {
    let mut clipped = false;
    for a in y.iter_mut() {
        if *a > limit {
            *a = limit;
            clipped = true;
        } else if *a < -limit {
            *a = -limit;
            clipped = true;
        }
    }
    clipped
}

/// If any element lies outside `[-limit, limit]`, rescale the whole buffer by
/// `limit / ‖y‖₁`. Returns whether a rescale happened.
pub fn fit(y: &mut [f64], limit: f64) -> bool {
    if !y.iter().any(|v| v.abs() > limit) {
        return false;
    }
    let norm = one_norm(y);
    if norm == 0.0 {
        return false;
    }
    scale(y, limit / norm);
    true
}
