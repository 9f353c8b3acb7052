//! Affine layer and activation kernels.
//!
//! Matrices are row-major with `rows * cols` elements. Backward kernels
//! overwrite their outputs; accumulation is the caller's job.

/// `y[i] = b[i] + Σ_c a[i*cols + c] · x[c]`
pub fn fully_connected_forward(y: &mut [f64], a: &[f64], x: &[f64], b: &[f64]) {
    let rows = y.len();
    let cols = x.len();
    debug_assert_eq!(a.len(), rows * cols);
    debug_assert_eq!(b.len(), rows);
    for (i, out) in y.iter_mut().enumerate() {
        let row = &a[i * cols..(i + 1) * cols];
        *out = b[i] + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
    }
}

/// Gradients of `y = a·x + b` with respect to `a`, `x` and `b`.
pub fn fully_connected_backward(
    dldy: &[f64],
    a: &[f64],
    x: &[f64],
    dlda: &mut [f64],
    dldx: &mut [f64],
    dldb: &mut [f64],
) {
    let rows = dldy.len();
    let cols = x.len();
    debug_assert_eq!(a.len(), rows * cols);
    debug_assert_eq!(dlda.len(), rows * cols);
    debug_assert_eq!(dldx.len(), cols);

    dldx.fill(0.0);
    for (i, &g) in dldy.iter().enumerate() {
        let row = &a[i * cols..(i + 1) * cols];
        let grad_row = &mut dlda[i * cols..(i + 1) * cols];
        for c in 0..cols {
            grad_row[c] = g * x[c];
            dldx[c] += row[c] * g;
        }
    }
    dldb.copy_from_slice(dldy);
}

/// `p[f] = exp(y[f]/t) / Σ exp(y[·]/t)`.
///
/// With `stable` the max logit is subtracted first; the result is the same
/// distribution without overflow on large logits.
pub fn softmax_forward(p: &mut [f64], y: &[f64], temperature: f64, stable: bool) {
    let shift = if stable {
        y.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v / temperature))
    } else {
        0.0
    };
    let mut sum = 0.0;
    for (out, &v) in p.iter_mut().zip(y) {
        *out = (v / temperature - shift).exp();
        sum += *out;
    }
    for out in p.iter_mut() {
        *out /= sum;
    }
}

/// Combined softmax + cross-entropy gradient: `dldh = p - onehot(correct)`.
pub fn softmax_loss_backward(p: &[f64], correct: usize, dldh: &mut [f64]) {
    dldh.copy_from_slice(p);
    dldh[correct] -= 1.0;
}

pub fn cross_entropy(probs: &[f64], correct: usize) -> f64 {
    -probs[correct].ln()
}

pub fn sigmoid_forward(y: &mut [f64], x: &[f64]) {
    for (out, &v) in y.iter_mut().zip(x) {
        *out = 1.0 / (1.0 + (-v).exp());
    }
}

/// `dldx = (1 - y) · y · dldy` with `y` the cached sigmoid output.
pub fn sigmoid_backward(dldy: &[f64], y: &[f64], dldx: &mut [f64]) {
    for ((out, &g), &s) in dldx.iter_mut().zip(dldy).zip(y) {
        *out = (1.0 - s) * s * g;
    }
}

pub fn tanh_forward(y: &mut [f64], x: &[f64]) {
    for (out, &v) in y.iter_mut().zip(x) {
        *out = v.tanh();
    }
}

/// `dldx = (1 - y²) · dldy` with `y` the cached tanh output.
pub fn tanh_backward(dldy: &[f64], y: &[f64], dldx: &mut [f64]) {
    for ((out, &g), &t) in dldx.iter_mut().zip(dldy).zip(y) {
        *out = (1.0 - t * t) * g;
    }
}
