//! Pixel-level building blocks shared by the adjustment and export stages.
//!
//! Everything here works on normalized `f32` samples. Interleaved buffers
//! carry an explicit channel count; single-plane helpers take `width` and
//! `height` only. Large inputs are split across the rayon pool by pixel or by
//! row; every output sample depends only on the input, so the parallel and
//! sequential paths produce identical results.

use rayon::prelude::*;

/// Minimum pixel count before work is split across threads.
pub(crate) const PARALLEL_THRESHOLD: usize = 30_000;

/// Rec. 709 luma weights.
#[inline]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Hermite interpolation between `e0` and `e1`, clamped to `[0, 1]`.
#[inline]
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0 + 1e-12)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Apply `f` to every `chunk_size` chunk, in parallel for large inputs.
pub(crate) fn for_each_chunk_mut<F>(data: &mut [f32], chunk_size: usize, f: F)
where
    F: Fn(&mut [f32]) + Sync,
{
    if data.len() / chunk_size >= PARALLEL_THRESHOLD {
        data.par_chunks_exact_mut(chunk_size).for_each(&f);
    } else {
        data.chunks_exact_mut(chunk_size).for_each(&f);
    }
}

/// Fill `out` row by row; `f(y, row)` writes row `y`.
fn for_each_row_mut<F>(out: &mut [f32], row_len: usize, f: F)
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    let rows = out.len() / row_len.max(1);
    let pixels = out.len();
    if pixels >= PARALLEL_THRESHOLD && rows > 1 {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    } else {
        out.chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(y, row));
    }
}

/// Mirror an out-of-range index back into `0..n` without repeating the edge
/// sample (`gfedcb|abcdefgh|gfedcba`).
#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Normalized Gaussian kernel with radius `round(4σ)`.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = ((sigma * 4.0).round() as usize).max(1);
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Separable Gaussian blur of an interleaved buffer, reflecting at the edges.
pub fn gaussian_blur(
    data: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    sigma: f32,
) -> Vec<f32> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let row_len = width * channels;

    let mut horizontal = vec![0.0f32; data.len()];
    for_each_row_mut(&mut horizontal, row_len, |y, row| {
        let src = &data[y * row_len..(y + 1) * row_len];
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let sx = reflect101(x as isize + k as isize - radius, width);
                    acc += w * src[sx * channels + c];
                }
                row[x * channels + c] = acc;
            }
        }
    });

    let mut out = vec![0.0f32; data.len()];
    for_each_row_mut(&mut out, row_len, |y, row| {
        for (k, w) in kernel.iter().enumerate() {
            let sy = reflect101(y as isize + k as isize - radius, height);
            let src = &horizontal[sy * row_len..(sy + 1) * row_len];
            for (o, s) in row.iter_mut().zip(src) {
                *o += w * s;
            }
        }
    });
    out
}

/// Mean over a `(2r+1)²` window, shrunk at the borders to the pixels that
/// exist. Uses a summed-area table, so cost does not depend on `radius`.
pub fn box_mean(plane: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let stride = width + 1;
    let mut integral = vec![0.0f64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0.0f64;
        for x in 0..width {
            row_sum += plane[y * width + x] as f64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = vec![0.0f32; plane.len()];
    for_each_row_mut(&mut out, width, |y, row| {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(height);
        for (x, o) in row.iter_mut().enumerate() {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(width);
            let sum = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f64;
            *o = (sum / count) as f32;
        }
    });
    out
}

/// Morphological erosion: minimum over a `(2r+1)²` window clipped to the
/// image.
pub fn min_filter(plane: &[f32], width: usize, height: usize, radius: usize) -> Vec<f32> {
    let mut horizontal = vec![0.0f32; plane.len()];
    for_each_row_mut(&mut horizontal, width, |y, row| {
        let src = &plane[y * width..(y + 1) * width];
        for (x, o) in row.iter_mut().enumerate() {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius + 1).min(width);
            *o = src[lo..hi].iter().copied().fold(f32::INFINITY, f32::min);
        }
    });

    let mut out = vec![0.0f32; plane.len()];
    for_each_row_mut(&mut out, width, |y, row| {
        let lo = y.saturating_sub(radius);
        let hi = (y + radius + 1).min(height);
        row.fill(f32::INFINITY);
        for sy in lo..hi {
            let src = &horizontal[sy * width..(sy + 1) * width];
            for (o, &s) in row.iter_mut().zip(src) {
                *o = o.min(s);
            }
        }
    });
    out
}

/// Edge-preserving smoothing of `src` steered by `guide` (He et al.), built
/// from box means.
pub fn guided_filter(
    guide: &[f32],
    src: &[f32],
    width: usize,
    height: usize,
    radius: usize,
    eps: f32,
) -> Vec<f32> {
    let mean_i = box_mean(guide, width, height, radius);
    let mean_p = box_mean(src, width, height, radius);
    let ii: Vec<f32> = guide.iter().map(|v| v * v).collect();
    let ip: Vec<f32> = guide.iter().zip(src).map(|(i, p)| i * p).collect();
    let corr_i = box_mean(&ii, width, height, radius);
    let corr_ip = box_mean(&ip, width, height, radius);

    let mut a = vec![0.0f32; src.len()];
    let mut b = vec![0.0f32; src.len()];
    for k in 0..src.len() {
        let var_i = corr_i[k] - mean_i[k] * mean_i[k];
        let cov_ip = corr_ip[k] - mean_i[k] * mean_p[k];
        a[k] = cov_ip / (var_i + eps);
        b[k] = mean_p[k] - a[k] * mean_i[k];
    }

    let mean_a = box_mean(&a, width, height, radius);
    let mean_b = box_mean(&b, width, height, radius);
    guide
        .iter()
        .zip(mean_a.iter().zip(&mean_b))
        .map(|(i, (a, b))| a * i + b)
        .collect()
}

/// RGB in `[0, 1]` to HSV with hue in degrees.
#[inline]
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };
    (h.rem_euclid(360.0), s, max)
}

/// Inverse of [`rgb_to_hsv`].
#[inline]
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s <= 0.0 {
        return (v, v, v);
    }
    let h = h.rem_euclid(360.0) / 60.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Percentile with linear interpolation between closest ranks. Returns 0 for
/// empty input.
pub fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
