//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageHandler` 只负责流程编排与配置管理，不直接与任何宿主框架绑定。
//! 每个变换的处理链路固定为：
//! 1. 读取配置快照
//! 2. Load：按来源加载原始字节（异步 I/O）
//! 3. Draw：解码并绘制到新分配的画布
//! 4. Encode：画布编码为 PNG / WebP
//! 5. Resolve：返回 `EncodedImage`
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ImageConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 解码 / 绘制 / 编码是 CPU 密集操作，放到 `spawn_blocking`，不阻塞 async 运行时。
//! - 不做重试、不做缓存，同样的输入每次都重新解码与编码。
//! - 记录 `load/draw/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use image::{DynamicImage, RgbaImage};
use serde::Serialize;

use super::pipeline;
use super::source::RawImageData;
use super::transform::{self, GeometricRegion};
use super::{
    EncodedImage, ImageBuffer, ImageConfig, ImageError, ImagePerformanceProfile, ImageSource, MaskBuffer,
    OutputFormat,
};
use crate::command::{self, Action, ParsedCommand, Strength};
use crate::filters::{self, Mask};

/// 图片处理器。
///
/// 封装了配置状态，并编排各子模块实现完整流程。
pub struct ImageHandler {
    pub(super) config: Arc<RwLock<ImageConfig>>,
}

/// 本地指令处理结果。
#[derive(Debug, Clone)]
pub struct LocalProcessOutcome {
    pub command: ParsedCommand,
    pub image: EncodedImage,
}

/// 本地指令处理结果的可序列化视图。
#[derive(Debug, Clone, Serialize)]
pub struct LocalProcessPayload {
    pub command: ParsedCommand,
    pub image: super::EncodedImagePayload,
}

impl From<&LocalProcessOutcome> for LocalProcessPayload {
    fn from(outcome: &LocalProcessOutcome) -> Self {
        Self {
            command: outcome.command,
            image: (&outcome.image).into(),
        }
    }
}

impl ImageHandler {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use lumenframe::image_handler::{ImageConfig, ImageHandler};
    ///
    /// let handler = ImageHandler::new(ImageConfig::default());
    /// assert!(handler.config_snapshot().is_ok());
    /// ```
    pub fn new(config: ImageConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<ImageConfig, ImageError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ImageError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: ImagePerformanceProfile) -> Result<(), ImageError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换图片性能档位：{:?}（max_surface={}, filter={:?}）",
            profile,
            config.max_surface_dimension,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_performance_profile(&self) -> Result<ImagePerformanceProfile, ImageError> {
        let config = self
            .config
            .read()
            .map_err(|_| ImageError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_performance_profile())
    }

    /// 设置输出编码格式。
    pub fn set_output_format(&self, format: OutputFormat) -> Result<(), ImageError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.output_format = format;
        Ok(())
    }

    /// 只执行 Load 阶段，返回已校验签名的图片字节。
    ///
    /// 蒙版等辅助输入与主图走同一套来源加载与体积校验。
    pub async fn load_buffer(&self, source: ImageSource) -> Result<ImageBuffer, ImageError> {
        let config = self.config_snapshot()?;
        let raw = self.load(source, &config).await?;
        log::debug!("📥 已加载 {} 来源 {} 字节", raw.source_hint, raw.bytes.len());
        Ok(ImageBuffer::new(raw.bytes))
    }

    /// 按百分比区域裁剪。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use lumenframe::image_handler::{GeometricRegion, ImageConfig, ImageHandler, ImageSource};
    ///
    /// # async fn demo() -> Result<(), lumenframe::image_handler::ImageError> {
    /// let handler = ImageHandler::new(ImageConfig::default());
    /// let cropped = handler
    ///     .crop(
    ///         ImageSource::FilePath("photo.png".into()),
    ///         GeometricRegion::new(0.0, 0.0, 50.0, 50.0),
    ///     )
    ///     .await?;
    /// println!("{}", cropped.to_data_uri());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn crop(
        &self,
        source: ImageSource,
        region: GeometricRegion,
    ) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;
        self.run_transform("crop", config, source, move |image, config| {
            transform::crop_pixels(image, &region, config)
        })
        .await
    }

    /// 拉伸缩放到精确尺寸（不保持宽高比）。
    pub async fn resize(
        &self,
        source: ImageSource,
        target_width: u32,
        target_height: u32,
    ) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;
        self.run_transform("resize", config, source, move |image, config| {
            transform::resize_pixels(image, target_width, target_height, config)
        })
        .await
    }

    /// 按百分比等比缩放。
    pub async fn scale(
        &self,
        source: ImageSource,
        scale_percent: f64,
    ) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;
        self.run_transform("scale", config, source, move |image, config| {
            transform::scale_pixels(image, scale_percent, config)
        })
        .await
    }

    /// 应用像素滤镜；提供蒙版时只作用于蒙版区域。
    pub async fn apply_filter(
        &self,
        source: ImageSource,
        action: Action,
        strength: Strength,
        mask: Option<MaskBuffer>,
    ) -> Result<EncodedImage, ImageError> {
        // 蒙版与主图共用同一份配置快照
        let config = self.config_snapshot()?;
        let mask_raw = mask
            .map(|mask| self.load_from_buffer(mask.0, &config))
            .transpose()?;

        self.run_transform(action.as_str(), config, source, move |image, config| {
            let pixels = image.to_rgba8();
            let mask = match &mask_raw {
                Some(raw) => {
                    let decoded = pipeline::decode_image(raw, config)?;
                    Some(Mask::from_image(&decoded, pixels.width(), pixels.height()))
                }
                None => None,
            };
            Ok(filters::apply_action(action, strength, &pixels, mask.as_ref()))
        })
        .await
    }

    /// 本地处理入口：解析指令并在图片上执行对应滤镜。
    pub async fn process_local(
        &self,
        source: ImageSource,
        mask: Option<MaskBuffer>,
        command_text: &str,
    ) -> Result<LocalProcessOutcome, ImageError> {
        let parsed = command::parse_command(command_text);
        log::info!(
            "🪄 本地处理 - 指令: {:?} 动作: {} 强度: {} 蒙版: {}",
            command_text,
            parsed.action,
            parsed.strength,
            mask.is_some()
        );

        let image = self
            .apply_filter(source, parsed.action, parsed.strength, mask)
            .await?;

        Ok(LocalProcessOutcome {
            command: parsed,
            image,
        })
    }

    /// Load → Draw → Encode 的公共骨架，整个调用只使用传入的配置快照。
    async fn run_transform<F>(
        &self,
        operation: &'static str,
        config: ImageConfig,
        source: ImageSource,
        draw: F,
    ) -> Result<EncodedImage, ImageError>
    where
        F: FnOnce(&DynamicImage, &ImageConfig) -> Result<RgbaImage, ImageError> + Send + 'static,
    {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load(source, &config).await?;
        let load_elapsed = load_start.elapsed();

        let draw_start = Instant::now();
        let encoded = tokio::task::spawn_blocking(move || draw_and_encode(raw, &config, draw))
            .await
            .map_err(|e| ImageError::Surface(format!("绘制任务异常终止：{}", e)))??;
        let draw_elapsed = draw_start.elapsed();

        log::info!(
            "✅ {} 完成 - 输出: {}x{} {} load={}ms draw+encode={}ms total={}ms",
            operation,
            encoded.width,
            encoded.height,
            encoded.format.as_str(),
            load_elapsed.as_millis(),
            draw_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(encoded)
    }
}

fn draw_and_encode<F>(
    raw: RawImageData,
    config: &ImageConfig,
    draw: F,
) -> Result<EncodedImage, ImageError>
where
    F: FnOnce(&DynamicImage, &ImageConfig) -> Result<RgbaImage, ImageError>,
{
    let decoded = pipeline::decode_image(&raw, config)?;
    let pixels = draw(&decoded, config)?;
    pipeline::encode_pixels(pixels, config.output_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn source(width: u32, height: u32) -> ImageSource {
        ImageSource::Buffer(ImageBuffer::from(create_png_bytes(width, height)))
    }

    fn decode(encoded: &EncodedImage) -> DynamicImage {
        image::load_from_memory(encoded.buffer.as_bytes()).expect("output should decode")
    }

    #[tokio::test]
    async fn crop_returns_top_left_quadrant() {
        let handler = ImageHandler::new(ImageConfig::default());

        let cropped = handler
            .crop(source(200, 200), GeometricRegion::new(0.0, 0.0, 50.0, 50.0))
            .await
            .expect("crop should succeed");

        let decoded = decode(&cropped).to_rgba8();
        assert_eq!(decoded.dimensions(), (100, 100));
        assert_eq!(decoded.get_pixel(99, 42), &Rgba([99, 42, 141, 255]));
    }

    #[tokio::test]
    async fn scale_doubles_and_halves() {
        let handler = ImageHandler::new(ImageConfig::default());

        let doubled = handler.scale(source(100, 100), 200.0).await.expect("scale up");
        let halved = handler.scale(source(100, 100), 50.0).await.expect("scale down");

        assert_eq!((doubled.width, doubled.height), (200, 200));
        assert_eq!((halved.width, halved.height), (50, 50));
        assert_eq!(decode(&halved).dimensions(), (50, 50));
    }

    #[tokio::test]
    async fn resize_is_exact_regardless_of_aspect() {
        let handler = ImageHandler::new(ImageConfig::default());

        for (w, h) in [(40, 90), (500, 20), (150, 300)] {
            let resized = handler.resize(source(w, h), 300, 150).await.expect("resize");
            assert_eq!(decode(&resized).dimensions(), (300, 150));
        }
    }

    #[tokio::test]
    async fn full_crop_then_resize_matches_direct_resize() {
        let handler = ImageHandler::new(ImageConfig::default());

        let cropped = handler
            .crop(source(64, 48), GeometricRegion::full())
            .await
            .expect("full crop");
        let via_crop = handler
            .resize(ImageSource::Buffer(cropped.buffer.clone()), 30, 20)
            .await
            .expect("resize after crop");
        let direct = handler.resize(source(64, 48), 30, 20).await.expect("direct resize");

        assert_eq!(decode(&via_crop).to_rgba8(), decode(&direct).to_rgba8());
    }

    #[tokio::test]
    async fn invalid_source_is_decode_error_for_every_transform() {
        let handler = ImageHandler::new(ImageConfig::default());
        let bad = || ImageSource::Base64("data:image/png;base64,bm90IGFuIGltYWdl".to_string());

        assert!(matches!(
            handler.crop(bad(), GeometricRegion::full()).await,
            Err(ImageError::Decode(_))
        ));
        assert!(matches!(handler.resize(bad(), 10, 10).await, Err(ImageError::Decode(_))));
        assert!(matches!(handler.scale(bad(), 50.0).await, Err(ImageError::Decode(_))));
        assert!(matches!(
            handler.scale(ImageSource::FilePath("/no/such/file.png".into()), 50.0).await,
            Err(ImageError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn webp_output_format_is_respected() {
        let handler = ImageHandler::new(ImageConfig::default());
        handler.set_output_format(OutputFormat::Webp).expect("set format");

        let scaled = handler.scale(source(20, 20), 50.0).await.expect("scale");

        assert_eq!(scaled.format, OutputFormat::Webp);
        assert_eq!(
            image::guess_format(scaled.buffer.as_bytes()).ok(),
            Some(ImageFormat::WebP)
        );
    }

    #[tokio::test]
    async fn process_local_applies_parsed_action() {
        let handler = ImageHandler::new(ImageConfig::default());

        let outcome = handler
            .process_local(source(16, 16), None, "please DARKEN the room")
            .await
            .expect("process local");

        assert_eq!(outcome.command, ParsedCommand::new(Action::Darken, 50));
        let out = decode(&outcome.image).to_rgba8();
        assert_eq!(out.get_pixel(10, 6), &Rgba([5, 3, 8, 255]));
    }

    #[tokio::test]
    async fn apply_filter_rejects_malformed_mask() {
        let handler = ImageHandler::new(ImageConfig::default());

        let result = handler
            .apply_filter(
                source(8, 8),
                Action::Blur,
                Strength::new(10),
                Some(MaskBuffer(ImageBuffer::from(b"not a mask".to_vec()))),
            )
            .await;

        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[tokio::test]
    async fn mask_is_decoded_under_the_call_config() {
        let mut config = ImageConfig::default();
        config.max_decoded_pixels = 100;
        let handler = ImageHandler::new(config);
        let oversized_mask = MaskBuffer(ImageBuffer::from(create_png_bytes(40, 40)));

        let result = handler
            .apply_filter(source(8, 8), Action::Darken, Strength::new(50), Some(oversized_mask))
            .await;

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[tokio::test]
    async fn load_buffer_returns_source_bytes_untouched() {
        let handler = ImageHandler::new(ImageConfig::default());
        let png = create_png_bytes(6, 6);

        let loaded = handler
            .load_buffer(ImageSource::Buffer(ImageBuffer::from(png.clone())))
            .await
            .expect("load buffer");

        assert_eq!(loaded.as_bytes(), png.as_slice());
    }

    #[test]
    fn performance_profile_can_be_switched() {
        let handler = ImageHandler::new(ImageConfig::default());

        handler
            .set_performance_profile(ImagePerformanceProfile::Speed)
            .expect("switch profile");

        assert_eq!(
            handler.get_performance_profile().ok(),
            Some(ImagePerformanceProfile::Speed)
        );
    }
}
