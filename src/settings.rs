//! 应用设置：从 JSON 文件读取图片与生图配置，缺省字段取默认值。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::generation::GenerationConfig;
use crate::image_handler::ImageConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub image: ImageConfig,
    pub generation: GenerationConfig,
}

impl AppSettings {
    pub fn from_json(content: &str) -> Result<Self, AppError> {
        serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("解析设置文件失败: {}", e)))
    }

    /// 读取设置文件；路径为空时使用默认值。
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Err(AppError::Config(format!(
                "设置文件不存在: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let settings = Self::from_json(&content)?;
        log::info!("⚙️ 已加载设置文件: {}", path.display());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("序列化设置失败: {}", e)))
    }
}
