//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `ImageBuffer` / `MaskBuffer` 表示不可变的已编码图片字节
//! - `RawImageData` 表示已加载但未解码的字节
//! - `EncodedImage` 表示一次变换的最终产物

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Serialize;
use std::str::FromStr;

use super::{ImageError, OutputFormat};

/// 不可变的已编码图片字节（PNG / WebP 等）。
///
/// 内部使用 `Bytes`，克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer(Bytes);

impl ImageBuffer {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// 按指定 MIME 输出 Data URL。
    pub fn to_data_uri(&self, mime_type: &str) -> String {
        format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(&self.0)
        )
    }
}

impl FromStr for ImageBuffer {
    type Err = ImageError;

    /// 解析 `data:image/<fmt>;base64,<payload>` 形式的 Data URL。
    fn from_str(data_uri: &str) -> Result<Self, Self::Err> {
        let trimmed = data_uri.trim();
        let (header, payload) = trimmed
            .split_once(',')
            .ok_or_else(|| ImageError::Decode("Data URL 缺少数据段".to_string()))?;

        let header = header.to_lowercase();
        if !header.starts_with("data:image/") || !header.ends_with(";base64") {
            return Err(ImageError::Decode(
                "Data URL 不是 base64 编码的图片".to_string(),
            ));
        }

        general_purpose::STANDARD
            .decode(payload.trim())
            .map(Self::from)
            .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
    }
}

impl From<Vec<u8>> for ImageBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// 蒙版：解码后按亮度决定滤镜作用范围。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskBuffer(pub ImageBuffer);

impl MaskBuffer {
    pub fn as_image(&self) -> &ImageBuffer {
        &self.0
    }
}

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(String),
    /// 网络地址来源。
    Url(String),
    /// 已在内存中的图片字节。
    Buffer(ImageBuffer),
}

impl ImageSource {
    /// 从命令行或请求里的字符串推断来源类型。
    ///
    /// `data:` 前缀视为 Data URL，`http(s)://` 视为网络地址，其余视为文件路径。
    pub fn infer(input: &str) -> Self {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();
        if lowered.starts_with("data:") {
            Self::Base64(trimmed.to_string())
        } else if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::FilePath(trimmed.to_string())
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Bytes,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 变换产物：编码后的字节与尺寸。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub buffer: ImageBuffer,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn to_data_uri(&self) -> String {
        self.buffer.to_data_uri(self.format.mime_type())
    }
}

/// 对外返回的可序列化视图。
#[derive(Debug, Clone, Serialize)]
pub struct EncodedImagePayload {
    pub data_uri: String,
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
}

impl From<&EncodedImage> for EncodedImagePayload {
    fn from(image: &EncodedImage) -> Self {
        Self {
            data_uri: image.to_data_uri(),
            format: image.format.as_str(),
            width: image.width,
            height: image.height,
            byte_size: image.buffer.len(),
        }
    }
}
