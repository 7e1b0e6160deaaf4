//! 蒙版权重：亮度 255 完全生效，0 保持原图，中间值线性混合。

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};

/// 已解码的蒙版。
#[derive(Debug, Clone)]
pub struct Mask {
    weights: GrayImage,
}

impl Mask {
    /// 由解码后的蒙版图构建，尺寸与目标不一致时重采样到目标尺寸。
    pub fn from_image(mask: &DynamicImage, target_width: u32, target_height: u32) -> Self {
        let luma = mask.to_luma8();
        let weights = if luma.dimensions() == (target_width, target_height) {
            luma
        } else {
            log::debug!(
                "🎭 蒙版尺寸 {}x{} 与图片 {}x{} 不一致，重采样",
                luma.width(),
                luma.height(),
                target_width,
                target_height
            );
            image::imageops::resize(&luma, target_width, target_height, FilterType::Triangle)
        };

        Self { weights }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.weights.dimensions()
    }

    /// 按蒙版权重混合原图与滤镜结果。
    pub fn blend(&self, original: &RgbaImage, filtered: &RgbaImage) -> RgbaImage {
        let mut out = original.clone();

        for ((dst, effect), weight) in out
            .pixels_mut()
            .zip(filtered.pixels())
            .zip(self.weights.pixels())
        {
            let w = weight.0[0] as f32 / 255.0;
            if w <= 0.0 {
                continue;
            }
            for channel in 0..4 {
                let base = dst.0[channel] as f32;
                let target = effect.0[channel] as f32;
                dst.0[channel] = super::to_channel(base + (target - base) * w);
            }
        }

        out
    }
}
