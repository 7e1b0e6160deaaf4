//! # 画布变换模块
//!
//! ## 设计思路
//!
//! 每次变换都产出一块全新的离屏 RGBA 画布（`Surface`），尺寸先过单边与像素总量校验。
//! 画布不跨调用复用，变换函数只依赖入参，天然无共享可变状态。
//! 裁剪先分配再绘制；拉伸直接由重采样结果成为画布，不额外分配空白缓冲。
//!
//! ## 实现思路
//!
//! - crop：百分比区域换算为像素矩形（四舍五入 + 越界截断），画布大小即裁剪大小。
//! - resize：画布精确为目标宽高，整图拉伸填充，不保持宽高比。
//! - scale：宽高同乘百分比后复用 resize，宽高比自然保持。

use image::{DynamicImage, GenericImageView, RgbaImage};
use serde::{Deserialize, Serialize};

use super::pipeline;
use super::{ImageConfig, ImageError};

/// 百分比裁剪区域，取值相对源图宽高，范围 `[0, 100]`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometricRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GeometricRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 整图区域。
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 100.0, 100.0)
    }

    /// 换算为像素矩形。
    ///
    /// 越界部分截断到源图范围内；截断后面积为 0 时返回 `Validation`。
    pub fn to_pixel_rect(&self, natural_width: u32, natural_height: u32) -> Result<PixelRect, ImageError> {
        for (name, value) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !value.is_finite() {
                return Err(ImageError::Validation(format!("裁剪参数 {} 不是有效数字", name)));
            }
        }

        let (x, width) = Self::clamp_axis(self.x, self.width, natural_width);
        let (y, height) = Self::clamp_axis(self.y, self.height, natural_height);

        if width == 0 || height == 0 {
            return Err(ImageError::Validation(format!(
                "裁剪区域为空：({}, {}, {}, {})% 作用于 {}x{}",
                self.x, self.y, self.width, self.height, natural_width, natural_height
            )));
        }

        Ok(PixelRect {
            x,
            y,
            width,
            height,
        })
    }

    fn clamp_axis(offset_pct: f64, extent_pct: f64, natural: u32) -> (u32, u32) {
        let offset_pct = offset_pct.clamp(0.0, 100.0);
        let extent_pct = extent_pct.clamp(0.0, 100.0 - offset_pct);

        let offset = ((offset_pct / 100.0 * natural as f64).round() as u32).min(natural);
        let extent = ((extent_pct / 100.0 * natural as f64).round() as u32).min(natural - offset);
        (offset, extent)
    }
}

/// 源图像素坐标系下的矩形。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 按百分比计算缩放后的尺寸，每边至少 1 像素。
pub fn scaled_dimensions(width: u32, height: u32, scale_percent: f64) -> Result<(u32, u32), ImageError> {
    if !scale_percent.is_finite() || scale_percent <= 0.0 {
        return Err(ImageError::Validation(format!(
            "缩放百分比必须为正数：{}",
            scale_percent
        )));
    }

    let factor = scale_percent / 100.0;
    let scale_side = |side: u32| ((side as f64 * factor).round().min(u32::MAX as f64) as u32).max(1);
    Ok((scale_side(width), scale_side(height)))
}

/// 离屏画布。
pub(crate) struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// 分配一块全新的透明画布。
    pub(crate) fn allocate(width: u32, height: u32, config: &ImageConfig) -> Result<Self, ImageError> {
        Self::check_bounds(width, height, config)?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    /// 把整张源图拉伸到 `width x height`，重采样输出直接作为画布。
    pub(crate) fn stretched(
        source: &DynamicImage,
        width: u32,
        height: u32,
        config: &ImageConfig,
    ) -> Result<Self, ImageError> {
        Self::check_bounds(width, height, config)?;
        Ok(Self {
            pixels: pipeline::resize_exact(source, width, height, config.resize_filter),
        })
    }

    fn check_bounds(width: u32, height: u32, config: &ImageConfig) -> Result<(), ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Surface(format!("画布尺寸无效：{}x{}", width, height)));
        }

        if width > config.max_surface_dimension || height > config.max_surface_dimension {
            return Err(ImageError::Surface(format!(
                "画布尺寸超限：{}x{}（单边限制：{}）",
                width, height, config.max_surface_dimension
            )));
        }

        pipeline::validate_pixel_limits(config, width, height)
            .map_err(|e| ImageError::Surface(format!("无法分配画布：{}", e)))
    }

    /// 把源图的 `rect` 子区域绘制到画布左上角。
    pub(crate) fn draw_region(&mut self, source: &DynamicImage, rect: PixelRect) {
        let region = source.view(rect.x, rect.y, rect.width, rect.height).to_image();
        image::imageops::replace(&mut self.pixels, &region, 0, 0);
    }

    pub(crate) fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// 裁剪：画布大小等于换算后的像素矩形。
pub(crate) fn crop_pixels(
    source: &DynamicImage,
    region: &GeometricRegion,
    config: &ImageConfig,
) -> Result<RgbaImage, ImageError> {
    let (natural_width, natural_height) = source.dimensions();
    let rect = region.to_pixel_rect(natural_width, natural_height)?;

    let mut surface = Surface::allocate(rect.width, rect.height, config)?;
    surface.draw_region(source, rect);
    Ok(surface.into_pixels())
}

/// 拉伸缩放到精确尺寸。
pub(crate) fn resize_pixels(
    source: &DynamicImage,
    target_width: u32,
    target_height: u32,
    config: &ImageConfig,
) -> Result<RgbaImage, ImageError> {
    Surface::stretched(source, target_width, target_height, config).map(Surface::into_pixels)
}

/// 等比缩放。
pub(crate) fn scale_pixels(
    source: &DynamicImage,
    scale_percent: f64,
    config: &ImageConfig,
) -> Result<RgbaImage, ImageError> {
    let (width, height) = source.dimensions();
    let (target_width, target_height) = scaled_dimensions(width, height, scale_percent)?;
    resize_pixels(source, target_width, target_height, config)
}
