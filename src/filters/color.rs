//! 逐像素颜色滤镜：亮度与饱和度。

use image::RgbaImage;

use super::{map_rgb, to_channel};
use crate::command::Strength;

/// 强度 100 时的亮度增量。
const MAX_BRIGHTEN_DELTA: f32 = 128.0;

/// 加性提亮：`c + 128 * s`。
pub fn brighten(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let delta = (MAX_BRIGHTEN_DELTA * strength.fraction()).round() as i32;
    image::imageops::colorops::brighten(image, delta)
}

/// 乘性压暗：`c * (1 - s)`，强度 100 时为纯黑。
pub fn darken(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let factor = 1.0 - strength.fraction();
    map_rgb(image, |rgb| rgb.map(|c| to_channel(c as f32 * factor)))
}

/// 在 HSL 空间把饱和度放大 `1 + s` 倍（上限 1）。
pub fn saturate(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let factor = 1.0 + strength.fraction();
    map_rgb(image, |rgb| {
        let (h, s, l) = rgb_to_hsl(rgb);
        hsl_to_rgb(h, (s * factor).min(1.0), l)
    })
}

/// 向 Rec.601 亮度混合；强度 100 时输出灰度图。
pub fn desaturate(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let t = strength.fraction();
    map_rgb(image, |rgb| {
        let gray = luminance(rgb);
        rgb.map(|c| to_channel(c as f32 * (1.0 - t) + gray * t))
    })
}

/// 去色后压暗：desaturate(s) + darken(s / 2)。
pub fn remove(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    darken(&desaturate(image, strength), strength.halved())
}

pub(crate) fn luminance([r, g, b]: [u8; 3]) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// 返回 `(h ∈ [0, 360), s ∈ [0, 1], l ∈ [0, 1])`。
fn rgb_to_hsl([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta <= f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (sector * 60.0, s, l)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [r, g, b].map(|v| to_channel((v + m) * 255.0))
}
