//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `ImageServiceState` 作为调用方持有的服务状态，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` 或宿主统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 生图客户端可选注入，没有 API Key 时本地处理照常可用
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `handler`：本地变换与滤镜编排器
//! - `generator`：生图客户端（未配置时返回 `Validation`）
//! - `set_performance_profile` / `get_performance_profile`：按字符串切换与读取档位

use super::{ImageConfig, ImageError, ImageHandler, ImagePerformanceProfile, OutputFormat};
use crate::generation::{GenerationClient, GenerationConfig};

/// 图片处理服务状态。
///
/// 内部持有 `ImageHandler` 与可选的 `GenerationClient`。
pub struct ImageServiceState {
    handler: ImageHandler,
    generator: Option<GenerationClient>,
}

impl ImageServiceState {
    /// 使用默认配置创建服务状态，不带生图能力。
    ///
    /// # 示例
    /// ```rust
    /// use lumenframe::image_handler::ImageServiceState;
    ///
    /// let service = ImageServiceState::new();
    /// assert!(service.generator().is_err());
    /// ```
    pub fn new() -> Self {
        Self::with_config(ImageConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// # 示例
    /// ```rust
    /// use lumenframe::image_handler::{ImageConfig, ImageServiceState};
    ///
    /// let mut config = ImageConfig::default();
    /// config.allow_private_network = true;
    /// let service = ImageServiceState::with_config(config);
    /// # let _ = service;
    /// ```
    pub fn with_config(config: ImageConfig) -> Self {
        Self {
            handler: ImageHandler::new(config),
            generator: None,
        }
    }

    /// 同时注入生图配置。API Key 为空时视为未配置。
    pub fn with_generation(
        config: ImageConfig,
        generation: GenerationConfig,
    ) -> Result<Self, ImageError> {
        let generator = if generation.is_configured() {
            Some(GenerationClient::new(generation)?)
        } else {
            log::warn!("⚠️ 未提供生图 API Key，生图功能不可用");
            None
        };

        Ok(Self {
            handler: ImageHandler::new(config),
            generator,
        })
    }

    pub fn handler(&self) -> &ImageHandler {
        &self.handler
    }

    pub fn generator(&self) -> Result<&GenerationClient, ImageError> {
        self.generator
            .as_ref()
            .ok_or_else(|| ImageError::Validation("未配置生图服务（缺少 API Key）".to_string()))
    }

    /// 设置性能档位。
    ///
    /// # 示例
    /// ```rust
    /// use lumenframe::image_handler::ImageServiceState;
    ///
    /// let service = ImageServiceState::new();
    /// service.set_performance_profile("speed")?;
    /// # Ok::<(), lumenframe::image_handler::ImageError>(())
    /// ```
    pub fn set_performance_profile(&self, profile: &str) -> Result<(), ImageError> {
        let profile = ImagePerformanceProfile::from_name(profile)?;
        self.handler.set_performance_profile(profile)
    }

    /// 获取当前生效性能档位（字符串）。
    pub fn get_performance_profile(&self) -> Result<String, ImageError> {
        let profile = self.handler.get_performance_profile()?;
        Ok(profile.as_str().to_string())
    }

    pub fn set_output_format(&self, format: &str) -> Result<(), ImageError> {
        self.handler.set_output_format(OutputFormat::from_name(format)?)
    }
}

impl Default for ImageServiceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn service_set_and_get_profile_roundtrip() {
        let service = ImageServiceState::new();

        for profile in ["quality", "balanced", "speed"] {
            service.set_performance_profile(profile).expect("set profile should succeed");
            let current = service.get_performance_profile().expect("get profile should succeed");
            assert_eq!(current, profile);
        }
    }

    #[test]
    fn service_rejects_invalid_profile_and_format() {
        let service = ImageServiceState::new();

        assert!(matches!(
            service.set_performance_profile("unknown-profile"),
            Err(ImageError::Validation(_))
        ));
        assert!(matches!(service.set_output_format("gif"), Err(ImageError::Validation(_))));
        assert!(service.set_output_format("WebP").is_ok());
    }

    #[test]
    fn generator_is_present_only_with_api_key() {
        let without = ImageServiceState::with_generation(
            ImageConfig::default(),
            GenerationConfig::default(),
        )
        .expect("service init");
        assert!(matches!(without.generator(), Err(ImageError::Validation(_))));

        let with = ImageServiceState::with_generation(
            ImageConfig::default(),
            GenerationConfig::with_api_key("key"),
        )
        .expect("service init");
        assert!(with.generator().is_ok());
    }

    #[test]
    fn service_profile_concurrent_mixed_invalid_inputs() {
        let service = Arc::new(ImageServiceState::new());

        let workers = 8;
        let iterations = 120;

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let service = Arc::clone(&service);
            handles.push(thread::spawn(move || {
                let valid_profiles = ["quality", "balanced", "speed"];
                let invalid_profiles = ["", "ultra", "fastest", "balance-d"];

                for i in 0..iterations {
                    if (worker_id + i) % 3 == 0 {
                        let invalid = invalid_profiles[(worker_id + i) % invalid_profiles.len()];
                        let result = service.set_performance_profile(invalid);
                        assert!(matches!(result, Err(ImageError::Validation(_))));
                    } else {
                        let valid = valid_profiles[(worker_id + i) % valid_profiles.len()];
                        service
                            .set_performance_profile(valid)
                            .expect("set valid profile should succeed");
                    }

                    let current = service.get_performance_profile().expect("get profile should succeed");
                    assert!(matches!(current.as_str(), "quality" | "balanced" | "speed"));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("worker thread should not panic");
        }
    }
}
