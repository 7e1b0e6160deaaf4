//! # 像素滤镜模块
//!
//! ## 设计思路
//!
//! 指令解析得到的 `(Action, Strength)` 在这里落到像素层面：
//! - `color`：逐像素的亮度 / 饱和度调整
//! - `convolution`：模糊与锐化等空间卷积
//! - `mask`：蒙版权重，把效果限制在指定区域
//!
//! ## 实现思路
//!
//! 每个滤镜都是 `&RgbaImage -> RgbaImage` 的纯函数，alpha 通道保持不变，强度为 0 时原样返回。
//! 有蒙版时先在整图上算出效果，再按蒙版亮度与原图逐像素混合。

mod color;
mod convolution;
mod mask;

pub use color::{brighten, darken, desaturate, remove, saturate};
pub use convolution::{blur, sharpen};
pub use mask::Mask;

use image::RgbaImage;

use crate::command::{Action, Strength};

/// 按动作分派到具体滤镜，并应用蒙版。
pub fn apply_action(
    action: Action,
    strength: Strength,
    image: &RgbaImage,
    mask: Option<&Mask>,
) -> RgbaImage {
    let filtered = match action {
        Action::Brighten => brighten(image, strength),
        Action::Darken => darken(image, strength),
        Action::Saturate => saturate(image, strength),
        Action::Desaturate => desaturate(image, strength),
        Action::Blur => blur(image, strength),
        Action::Sharpen => sharpen(image, strength),
        Action::Remove => remove(image, strength),
    };

    match mask {
        Some(mask) => mask.blend(image, &filtered),
        None => filtered,
    }
}

/// 对 RGB 三个通道逐像素映射，保留 alpha。
pub(crate) fn map_rgb<F>(image: &RgbaImage, mut f: F) -> RgbaImage
where
    F: FnMut([u8; 3]) -> [u8; 3],
{
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let [r, g, b] = f([r, g, b]);
        pixel.0 = [r, g, b, a];
    }
    out
}

pub(crate) fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn zero_strength_is_identity_for_every_action() {
        let image = RgbaImage::from_fn(9, 9, |x, y| Rgba([(x * 20) as u8, (y * 20) as u8, 90, 200]));

        for action in Action::ALL {
            assert_eq!(
                apply_action(action, Strength::ZERO, &image, None),
                image,
                "action {} should be identity at strength 0",
                action
            );
        }
    }

    #[test]
    fn alpha_channel_is_preserved() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([100, 150, 200, 77]));

        for action in Action::ALL {
            let out = apply_action(action, Strength::new(80), &image, None);
            assert!(out.pixels().all(|p| p.0[3] == 77), "action {} touched alpha", action);
        }
    }
}
