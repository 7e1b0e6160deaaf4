//! # AI 生图模块（generation）
//!
//! ## 设计思路
//!
//! 外部文生图服务对核心来说是黑盒：`generate(prompt, style, aspect_ratio) -> ImageBuffer | Error`。
//! 本模块只负责：入参校验、宽高比查表、一次 POST 请求、响应分流与错误映射。
//!
//! ## 实现思路
//!
//! - API Key 等配置通过 `GenerationConfig` 在构造时显式注入，库内不读取环境变量。
//! - `from_env` 仅供二进制入口使用。
//! - 不做重试，失败直接返回 `Upstream` / `Timeout` / `Validation`。

mod aspect;
mod client;

pub use aspect::{DEFAULT_ASPECT_RATIO, SUPPORTED_ASPECT_RATIOS, map_aspect_ratio};
pub use client::{GeneratedImage, GeneratedImagePayload, GenerationClient};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image_handler::{ImageError, OutputFormat};

/// 默认 API Key 环境变量名。
pub const DEFAULT_API_KEY_ENV: &str = "LUMENFRAME_GENERATION_API_KEY";

/// 生图服务配置。
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_key: String,
    pub endpoint: String,
    /// 整体请求超时（秒）。
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 响应体积上限（字节）。
    pub max_response_bytes: u64,
    pub output_format: OutputFormat,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.stability.ai/v2beta/stable-image/generate/core".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 10,
            max_response_bytes: 20 * 1024 * 1024,
            output_format: OutputFormat::Png,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl GenerationConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// 从环境变量读取 API Key，其余字段取默认值。
    pub fn from_env(var: &str) -> Result<Self, ImageError> {
        let api_key = std::env::var(var)
            .map_err(|_| ImageError::Validation(format!("未设置环境变量 {}", var)))?;
        Ok(Self::with_api_key(api_key))
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
