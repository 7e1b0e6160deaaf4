//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ImageConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中性能档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - 全部字段带 `#[serde(default)]`，配置文件只需写出想覆盖的项。
//! - `ImagePerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体阈值。
//! - `infer_performance_profile` 用于从当前配置反推档位。

use fast_image_resize as fr;
use image::ImageFormat;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::ImageError;

/// 图片处理配置。
///
/// 字段覆盖了加载、解码、画布分配与编码四个阶段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// 读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 最大重定向次数，避免无限跳转或恶意链路。
    pub max_redirects: usize,
    /// 是否允许访问内网或本地地址（默认关闭，防 SSRF）。
    pub allow_private_network: bool,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 画布单边最大值。
    pub max_surface_dimension: u32,
    /// 缩放滤镜策略。
    pub resize_filter: ResampleFilter,
    /// 输出编码格式。
    pub output_format: OutputFormat,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            max_redirects: 5,
            allow_private_network: false,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            max_surface_dimension: 8192,
            resize_filter: ResampleFilter::Triangle,
            output_format: OutputFormat::Png,
        }
    }
}

/// 缩放滤镜，可序列化的 `FilterType` 镜像。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResampleFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub(crate) fn to_fast_filter(self) -> fr::FilterType {
        match self {
            Self::Nearest => fr::FilterType::Box,
            Self::Triangle => fr::FilterType::Bilinear,
            Self::CatmullRom => fr::FilterType::CatmullRom,
            Self::Gaussian => fr::FilterType::Mitchell,
            Self::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

/// 输出图片格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 无损 PNG，等价于 canvas 默认导出。
    #[default]
    Png,
    /// 无损 WebP。
    Webp,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Result<Self, ImageError> {
        match name.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(ImageError::Validation(format!(
                "不支持的输出格式：{}（可选：png / webp）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
        }
    }
}

/// 图片性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先处理速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ImagePerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use lumenframe::image_handler::ImagePerformanceProfile;
    ///
    /// let p = ImagePerformanceProfile::from_name("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), lumenframe::image_handler::ImageError>(())
    /// ```
    pub fn from_name(profile: &str) -> Result<Self, ImageError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ImageError::Validation(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl ImageConfig {
    /// 基于当前参数反推性能档位。
    pub(crate) fn infer_performance_profile(&self) -> ImagePerformanceProfile {
        match self.resize_filter {
            ResampleFilter::Lanczos3 | ResampleFilter::CatmullRom
                if self.max_surface_dimension >= 16_384 =>
            {
                ImagePerformanceProfile::Quality
            }
            ResampleFilter::Nearest => ImagePerformanceProfile::Speed,
            _ if self.max_surface_dimension <= 4096 => ImagePerformanceProfile::Speed,
            _ => ImagePerformanceProfile::Balanced,
        }
    }

    /// 应用指定性能档位到实际参数。
    pub(crate) fn apply_performance_profile(&mut self, profile: ImagePerformanceProfile) {
        match profile {
            ImagePerformanceProfile::Quality => {
                self.max_surface_dimension = 16_384;
                self.resize_filter = ResampleFilter::Lanczos3;
            }
            ImagePerformanceProfile::Balanced => {
                self.max_surface_dimension = 8192;
                self.resize_filter = ResampleFilter::Triangle;
            }
            ImagePerformanceProfile::Speed => {
                self.max_surface_dimension = 4096;
                self.resize_filter = ResampleFilter::Nearest;
            }
        }
    }
}
