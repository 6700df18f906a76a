use num::{Complex, Zero};
use rustfft::FFTplanner;

/// Forward DFT. Unnormalized, so `fft(x)[0]` is the sum of `x`
pub fn fft(samps: &[Complex<f32>]) -> Vec<Complex<f32>> {
    transform(samps, false)
}

/// Inverse DFT normalized by `1 / len`, so `ifft(fft(x)) == x` up to rounding
pub fn ifft(samps: &[Complex<f32>]) -> Vec<Complex<f32>> {
    let scale = 1. / samps.len() as f32;
    let mut res = transform(samps, true);
    for x in res.iter_mut() {
        *x = *x * scale;
    }
    res
}

fn transform(samps: &[Complex<f32>], inverse: bool) -> Vec<Complex<f32>> {
    if samps.is_empty() {
        return Vec::new();
    }
    let mut planner = FFTplanner::new(inverse);
    let fft = planner.plan_fft(samps.len());
    // rustfft uses the input as scratch space
    let mut input = samps.to_vec();
    let mut output = vec![Complex::zero(); samps.len()];
    fft.process(&mut input, &mut output);
    output
}

/// Same as numpy's `roll`: element `i` moves to `(i + shift) mod len`
pub fn roll<T: Copy>(x: &[T], shift: i64) -> Vec<T> {
    let len = x.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    (0..len)
        .map(|i| x[(i - shift).rem_euclid(len) as usize])
        .collect()
}
