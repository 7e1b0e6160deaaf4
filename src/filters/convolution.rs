//! 空间卷积滤镜：高斯模糊与反锐化掩模。

use image::RgbaImage;

use super::to_channel;
use crate::command::Strength;

/// 强度 100 时的模糊半径（像素）。
const MAX_BLUR_RADIUS: f32 = 20.0;
/// 锐化时参考模糊的 sigma。
const SHARPEN_SIGMA: f32 = 1.0;
/// 强度 100 时的锐化量。
const MAX_SHARPEN_AMOUNT: f32 = 2.0;

/// 高斯模糊，半径随强度线性增长，sigma 取半径的一半。
pub fn blur(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let radius = MAX_BLUR_RADIUS * strength.fraction();
    let sigma = (radius / 2.0).max(0.5);
    let mut blurred = image::imageops::blur(image, sigma);
    restore_alpha(&mut blurred, image);
    blurred
}

/// 反锐化掩模：`o + amount * (o - blur(o))`。
pub fn sharpen(image: &RgbaImage, strength: Strength) -> RgbaImage {
    if strength.is_zero() {
        return image.clone();
    }

    let amount = MAX_SHARPEN_AMOUNT * strength.fraction();
    let blurred = image::imageops::blur(image, SHARPEN_SIGMA);

    let mut out = image.clone();
    for (dst, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for channel in 0..3 {
            let original = dst.0[channel] as f32;
            let detail = original - soft.0[channel] as f32;
            dst.0[channel] = to_channel(original + amount * detail);
        }
    }
    out
}

fn restore_alpha(target: &mut RgbaImage, source: &RgbaImage) {
    for (dst, src) in target.pixels_mut().zip(source.pixels()) {
        dst.0[3] = src.0[3];
    }
}
