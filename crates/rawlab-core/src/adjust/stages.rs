//! The ordered pixel stages of the adjustment pipeline.
//!
//! Each stage reads the RGB working frame and leaves every sample clamped to
//! `[0, 1]`. Alpha never reaches this module.

use super::filters::{
    for_each_chunk_mut, gaussian_blur, guided_filter, hsv_to_rgb, luminance, min_filter,
    percentile, rgb_to_hsv, smoothstep,
};
use super::{Adjustment, AdjustmentSpec};
use crate::buffer::ColorSpace;

/// Neutral white balance point (kelvin).
const NEUTRAL_TEMPERATURE: f32 = 5050.0;
/// Neutral tint.
const NEUTRAL_TINT: f32 = 8.0;

/// Blur radius used for local contrast (texture and clarity).
const DETAIL_SIGMA: f32 = 3.0;
/// Blur radius of the synthetic haze layer.
const HAZE_SIGMA: f32 = 8.0;
/// Dark-channel erosion radius (15×15 window).
const DARK_CHANNEL_RADIUS: usize = 7;
const DEHAZE_OMEGA: f32 = 0.95;
const TRANSMISSION_RADIUS: usize = 60;
const TRANSMISSION_EPS: f32 = 1e-3;

/// Interleaved RGB samples being worked on by the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    pub rgb: Vec<f32>,
}

impl Frame {
    fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    fn luma_plane(&self) -> Vec<f32> {
        self.rgb
            .chunks_exact(3)
            .map(|p| luminance(p[0], p[1], p[2]))
            .collect()
    }
}

/// A named pipeline stage, governed by one or more adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    WhiteBalance,
    Exposure,
    Contrast,
    Highlights,
    Shadows,
    Whites,
    Blacks,
    Texture,
    Clarity,
    Dehaze,
    Vibrance,
    Saturation,
}

impl Stage {
    /// Fixed execution order.
    pub const ORDER: [Stage; 12] = [
        Stage::WhiteBalance,
        Stage::Exposure,
        Stage::Contrast,
        Stage::Highlights,
        Stage::Shadows,
        Stage::Whites,
        Stage::Blacks,
        Stage::Texture,
        Stage::Clarity,
        Stage::Dehaze,
        Stage::Vibrance,
        Stage::Saturation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::WhiteBalance => "white_balance",
            Stage::Exposure => "exposure",
            Stage::Contrast => "contrast",
            Stage::Highlights => "highlights",
            Stage::Shadows => "shadows",
            Stage::Whites => "whites",
            Stage::Blacks => "blacks",
            Stage::Texture => "texture",
            Stage::Clarity => "clarity",
            Stage::Dehaze => "dehaze",
            Stage::Vibrance => "vibrance",
            Stage::Saturation => "saturation",
        }
    }

    /// Adjustments whose values drive this stage.
    pub fn governed_by(self) -> &'static [Adjustment] {
        match self {
            Stage::WhiteBalance => &[Adjustment::Temperature, Adjustment::Tint],
            Stage::Exposure => &[Adjustment::Exposure],
            Stage::Contrast => &[Adjustment::Contrast],
            Stage::Highlights => &[Adjustment::Highlights],
            Stage::Shadows => &[Adjustment::Shadows],
            Stage::Whites => &[Adjustment::Whites],
            Stage::Blacks => &[Adjustment::Blacks],
            Stage::Texture => &[Adjustment::Texture],
            Stage::Clarity => &[Adjustment::Clarity],
            Stage::Dehaze => &[Adjustment::Dehaze],
            Stage::Vibrance => &[Adjustment::Vibrance],
            Stage::Saturation => &[Adjustment::Saturation],
        }
    }

    /// A stage runs only when one of its adjustments is off neutral.
    pub fn is_active(self, spec: &AdjustmentSpec) -> bool {
        self.governed_by().iter().any(|&a| !spec.is_neutral(a))
    }

    pub(crate) fn apply(self, frame: &mut Frame, spec: &AdjustmentSpec) {
        match self {
            Stage::WhiteBalance => white_balance(
                frame,
                spec.get(Adjustment::Temperature),
                spec.get(Adjustment::Tint),
            ),
            Stage::Exposure => exposure(frame, spec.get(Adjustment::Exposure)),
            Stage::Contrast => contrast(frame, spec.get(Adjustment::Contrast)),
            Stage::Highlights => {
                let f = spec.get(Adjustment::Highlights) / 100.0;
                let target = if f > 0.0 { 1.0 } else { 0.5 };
                masked_blend(frame, f.abs(), target, |y| smoothstep(0.55, 1.0, y));
            }
            Stage::Shadows => {
                let f = spec.get(Adjustment::Shadows) / 100.0;
                let target = if f > 0.0 { 0.5 } else { 0.0 };
                masked_blend(frame, f.abs(), target, |y| 1.0 - smoothstep(0.0, 0.45, y));
            }
            Stage::Whites => whites(frame, spec.get(Adjustment::Whites)),
            Stage::Blacks => {
                let f = spec.get(Adjustment::Blacks) / 100.0;
                let target = if f > 0.0 { 0.15 } else { 0.0 };
                masked_blend(frame, f.abs(), target, |y| 1.0 - smoothstep(0.0, 0.15, y));
            }
            Stage::Texture => local_contrast(frame, spec.get(Adjustment::Texture), false),
            Stage::Clarity => local_contrast(frame, spec.get(Adjustment::Clarity), true),
            Stage::Dehaze => dehaze(frame, spec.get(Adjustment::Dehaze)),
            Stage::Vibrance => {
                let f = spec.get(Adjustment::Vibrance) / 100.0;
                scale_saturation(frame, |s| s * (1.0 + f * (1.0 - s)));
            }
            Stage::Saturation => {
                let f = spec.get(Adjustment::Saturation) / 100.0;
                scale_saturation(frame, |s| s * (1.0 + f));
            }
        }
    }
}

/// Per-channel white balance gains around the neutral point.
pub fn white_balance_gains(temperature: f32, tint: f32) -> [f32; 3] {
    let log_ratio = (temperature.max(1.0) / NEUTRAL_TEMPERATURE).ln();
    let r = (-0.8 * log_ratio).exp();
    let b = (0.8 * log_ratio).exp();
    let g = (1.0 - (tint - NEUTRAL_TINT) / 200.0).max(0.1);
    [r, g, b]
}

fn white_balance(frame: &mut Frame, temperature: f32, tint: f32) {
    let gains = white_balance_gains(temperature, tint);
    let space = frame.color_space;
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        for (v, gain) in px.iter_mut().zip(gains) {
            *v = space
                .from_linear((space.to_linear(*v) * gain).clamp(0.0, 1.0))
                .clamp(0.0, 1.0);
        }
    });
}

fn exposure(frame: &mut Frame, stops: f32) {
    let gain = 2f32.powf(stops);
    let space = frame.color_space;
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        for v in px.iter_mut() {
            *v = space
                .from_linear((space.to_linear(*v) * gain).clamp(0.0, 1.0))
                .clamp(0.0, 1.0);
        }
    });
}

fn contrast(frame: &mut Frame, amount: f32) {
    let f = 1.0 + amount / 100.0;
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        for v in px.iter_mut() {
            *v = (0.5 + (*v - 0.5) * f).clamp(0.0, 1.0);
        }
    });
}

/// Pull each pixel toward `target` by `strength * mask(Y)`.
fn masked_blend<M>(frame: &mut Frame, strength: f32, target: f32, mask: M)
where
    M: Fn(f32) -> f32 + Sync,
{
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        let m = mask(luminance(px[0], px[1], px[2])) * strength;
        for v in px.iter_mut() {
            *v = (*v + m * (target - *v)).clamp(0.0, 1.0);
        }
    });
}

fn whites(frame: &mut Frame, amount: f32) {
    let white_point = percentile(&frame.luma_plane(), 99.0);
    if white_point < 1e-6 {
        return;
    }
    let gain = 2f32.powf(amount / 100.0);
    let lo = white_point * 0.8;
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        let m = smoothstep(lo, white_point, luminance(px[0], px[1], px[2]));
        for v in px.iter_mut() {
            *v = (*v * (1.0 - m) + *v * gain * m).clamp(0.0, 1.0);
        }
    });
}

/// Texture adds back the high-pass detail uniformly; clarity weights it
/// toward the midtones.
fn local_contrast(frame: &mut Frame, amount: f32, midtone_weighted: bool) {
    let f = amount / 100.0;
    let blurred = gaussian_blur(&frame.rgb, frame.width, frame.height, 3, DETAIL_SIGMA);
    for (v, b) in frame.rgb.iter_mut().zip(&blurred) {
        let detail = *v - b;
        let weight = if midtone_weighted {
            1.0 - (*v - 0.5).abs() * 2.0
        } else {
            1.0
        };
        *v = (*v + detail * f * weight).clamp(0.0, 1.0);
    }
}

fn dehaze(frame: &mut Frame, amount: f32) {
    let f = amount / 100.0;
    if f > 0.0 {
        remove_haze(frame, f);
    } else {
        add_haze(frame, -f);
    }
}

/// Dark-channel prior haze removal.
fn remove_haze(frame: &mut Frame, f: f32) {
    let (w, h) = (frame.width, frame.height);
    let per_pixel_min: Vec<f32> = frame
        .rgb
        .chunks_exact(3)
        .map(|p| p[0].min(p[1]).min(p[2]))
        .collect();
    let dark = min_filter(&per_pixel_min, w, h, DARK_CHANNEL_RADIUS);

    // Atmospheric light: mean color of the brightest 0.1% of the dark channel.
    let n_bright = (frame.pixel_count() / 1000).max(1);
    let mut order: Vec<usize> = (0..dark.len()).collect();
    order.select_nth_unstable_by(n_bright - 1, |&a, &b| dark[b].total_cmp(&dark[a]));
    let mut atmosphere = [0.0f32; 3];
    for &idx in &order[..n_bright] {
        for (c, a) in atmosphere.iter_mut().enumerate() {
            *a += frame.rgb[idx * 3 + c];
        }
    }
    for a in atmosphere.iter_mut() {
        *a = (*a / n_bright as f32).clamp(0.7, 1.0);
    }

    let dark_max = dark.iter().copied().fold(0.0f32, f32::max).max(1e-6);
    let raw_transmission: Vec<f32> = dark
        .iter()
        .map(|d| 1.0 - DEHAZE_OMEGA * f * d / dark_max)
        .collect();
    let gray: Vec<f32> = frame
        .rgb
        .chunks_exact(3)
        .map(|p| 0.299 * p[0] + 0.587 * p[1] + 0.114 * p[2])
        .collect();
    let transmission = guided_filter(
        &gray,
        &raw_transmission,
        w,
        h,
        TRANSMISSION_RADIUS,
        TRANSMISSION_EPS,
    );

    for (px, t) in frame.rgb.chunks_exact_mut(3).zip(&transmission) {
        let t = t.clamp(0.2, 1.0);
        for (v, a) in px.iter_mut().zip(atmosphere) {
            *v = ((*v - a) / t + a).clamp(0.0, 1.0);
        }
    }
}

/// Blend toward a brightened, heavily blurred copy.
fn add_haze(frame: &mut Frame, alpha: f32) {
    let haze = gaussian_blur(&frame.rgb, frame.width, frame.height, 3, HAZE_SIGMA);
    for (v, hz) in frame.rgb.iter_mut().zip(&haze) {
        let hz = (hz + 0.5).clamp(0.0, 1.0);
        *v = (*v * (1.0 - alpha) + hz * alpha).clamp(0.0, 1.0);
    }
}

fn scale_saturation<S>(frame: &mut Frame, scale: S)
where
    S: Fn(f32) -> f32 + Sync,
{
    for_each_chunk_mut(&mut frame.rgb, 3, |px| {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let (r, g, b) = hsv_to_rgb(h, scale(s).clamp(0.0, 1.0), v);
        px[0] = r.clamp(0.0, 1.0);
        px[1] = g.clamp(0.0, 1.0);
        px[2] = b.clamp(0.0, 1.0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize, rgb: Vec<f32>) -> Frame {
        Frame {
            width,
            height,
            color_space: ColorSpace::Srgb,
            rgb,
        }
    }

    fn spec(pairs: &[(&str, f32)]) -> AdjustmentSpec {
        AdjustmentSpec::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_stage_order_covers_every_adjustment_once() {
        let mut seen: Vec<Adjustment> = Stage::ORDER
            .iter()
            .flat_map(|s| s.governed_by().iter().copied())
            .collect();
        assert_eq!(seen, Adjustment::ALL.to_vec());
        seen.dedup();
        assert_eq!(seen.len(), 13);
    }

    #[test]
    fn test_neutral_white_balance_gains() {
        let [r, g, b] = white_balance_gains(5050.0, 8.0);
        assert!((r - 1.0).abs() < 1e-6 && (g - 1.0).abs() < 1e-6 && (b - 1.0).abs() < 1e-6);

        let [r, _, b] = white_balance_gains(10000.0, 8.0);
        assert!(b > 1.0 && r < 1.0);

        let [_, g, _] = white_balance_gains(5050.0, 100.0);
        assert!((g - 0.54).abs() < 1e-5);
    }

    #[test]
    fn test_exposure_one_stop_doubles_linear_light() {
        let mut f = frame(1, 1, vec![0.2, 0.4, 0.1]);
        f.color_space = ColorSpace::Linear;
        Stage::Exposure.apply(&mut f, &spec(&[("exposure", 1.0)]));
        assert!((f.rgb[0] - 0.4).abs() < 1e-6);
        assert!((f.rgb[1] - 0.8).abs() < 1e-6);
        assert!((f.rgb[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_exposure_clamps() {
        let mut f = frame(1, 1, vec![0.9, 0.9, 0.9]);
        Stage::Exposure.apply(&mut f, &spec(&[("exposure", 5.0)]));
        assert!(f.rgb.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_contrast_pivots_on_mid_gray() {
        let mut f = frame(2, 1, vec![0.5, 0.5, 0.5, 0.7, 0.3, 0.6]);
        Stage::Contrast.apply(&mut f, &spec(&[("contrast", 50.0)]));
        assert_eq!(&f.rgb[..3], &[0.5, 0.5, 0.5]);
        assert!((f.rgb[3] - 0.8).abs() < 1e-6);
        assert!((f.rgb[4] - 0.2).abs() < 1e-6);

        let mut flat = frame(1, 1, vec![0.9, 0.1, 0.3]);
        Stage::Contrast.apply(&mut flat, &spec(&[("contrast", -100.0)]));
        assert!(flat.rgb.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_shadows_lift_only_dark_pixels() {
        let mut f = frame(2, 1, vec![0.05, 0.05, 0.05, 0.95, 0.95, 0.95]);
        Stage::Shadows.apply(&mut f, &spec(&[("shadows", 100.0)]));
        assert!(f.rgb[0] > 0.3);
        assert!((f.rgb[3] - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_highlights_negative_pull_toward_mid() {
        let mut f = frame(1, 1, vec![1.0, 1.0, 1.0]);
        Stage::Highlights.apply(&mut f, &spec(&[("highlights", -100.0)]));
        assert!((f.rgb[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_whites_on_black_image_is_noop() {
        let mut f = frame(2, 2, vec![0.0; 12]);
        Stage::Whites.apply(&mut f, &spec(&[("whites", 100.0)]));
        assert!(f.rgb.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_whites_boosts_brightest_pixels() {
        let mut rgb = vec![0.1f32; 98 * 3];
        rgb.extend_from_slice(&[0.4; 6]);
        let mut f = frame(10, 10, rgb);
        Stage::Whites.apply(&mut f, &spec(&[("whites", 100.0)]));
        assert!((f.rgb[98 * 3] - 0.8).abs() < 1e-5);
        assert_eq!(f.rgb[0], 0.1);
    }

    #[test]
    fn test_texture_on_flat_image_is_noop() {
        let mut f = frame(8, 8, vec![0.3; 8 * 8 * 3]);
        Stage::Texture.apply(&mut f, &spec(&[("texture", 100.0)]));
        assert!(f.rgb.iter().all(|&v| (v - 0.3).abs() < 1e-5));
    }

    #[test]
    fn test_clarity_sharpens_edge() {
        let mut rgb = Vec::new();
        for x in 0..16 {
            let v = if x < 8 { 0.4 } else { 0.6 };
            rgb.extend_from_slice(&[v, v, v]);
        }
        let mut f = frame(16, 1, rgb);
        Stage::Clarity.apply(&mut f, &spec(&[("clarity", 100.0)]));
        assert!(f.rgb[7 * 3] < 0.4);
        assert!(f.rgb[8 * 3] > 0.6);
    }

    #[test]
    fn test_saturation_minus_100_is_gray() {
        let mut f = frame(1, 1, vec![0.8, 0.2, 0.4]);
        Stage::Saturation.apply(&mut f, &spec(&[("saturation", -100.0)]));
        assert!(f.rgb.iter().all(|&v| (v - 0.8).abs() < 1e-6));
    }

    #[test]
    fn test_vibrance_favors_muted_colors() {
        let mut muted = frame(1, 1, vec![0.6, 0.5, 0.5]);
        let mut vivid = frame(1, 1, vec![0.9, 0.1, 0.1]);
        let s = spec(&[("vibrance", 100.0)]);
        Stage::Vibrance.apply(&mut muted, &s);
        Stage::Vibrance.apply(&mut vivid, &s);
        let (_, s_muted, _) = rgb_to_hsv(muted.rgb[0], muted.rgb[1], muted.rgb[2]);
        let (_, s_vivid, _) = rgb_to_hsv(vivid.rgb[0], vivid.rgb[1], vivid.rgb[2]);
        assert!((s_muted - (1.0 / 6.0) * (1.0 + 5.0 / 6.0)).abs() < 1e-4);
        assert!((s_vivid - (8.0 / 9.0) * (1.0 + 1.0 / 9.0)).abs() < 1e-4);
    }

    #[test]
    fn test_dehaze_increases_contrast_of_hazy_image() {
        let (w, h) = (32, 32);
        let mut rgb = Vec::with_capacity(w * h * 3);
        for i in 0..w * h {
            let v = if i % 2 == 0 { 0.55 } else { 0.75 };
            rgb.extend_from_slice(&[v, v, v + 0.05]);
        }
        let before_spread = 0.2;
        let mut f = frame(w, h, rgb);
        Stage::Dehaze.apply(&mut f, &spec(&[("dehaze", 100.0)]));
        assert!(f.rgb.iter().all(|v| (0.0..=1.0).contains(v)));
        let spread = f.rgb[3] - f.rgb[0];
        assert!(spread > before_spread, "spread {spread}");
    }

    #[test]
    fn test_negative_dehaze_adds_haze() {
        let mut f = frame(4, 4, vec![0.1; 48]);
        Stage::Dehaze.apply(&mut f, &spec(&[("dehaze", -100.0)]));
        assert!(f.rgb.iter().all(|&v| (v - 0.6).abs() < 1e-5));
    }
}
