//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做入参反序列化与结果包装，不承载业务逻辑。
//! 所有实际处理交由 `ImageServiceState`，保持命令函数薄、稳定、易测试。
//!
//! 每个命令都返回 `CommandResponse<T>`：成功时 `data` 有值，
//! 失败时 `error` 携带 `code / stage / message`，错误不会以异常形式逃逸。

use serde::{Deserialize, Serialize};

use super::{
    EncodedImage, EncodedImagePayload, GeometricRegion, ImageError, ImageServiceState,
    ImageSource, LocalProcessPayload, MaskBuffer,
};
use crate::command::{self, Action, ParsedCommand, Strength};
use crate::generation::{DEFAULT_ASPECT_RATIO, GeneratedImagePayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<ImageError> for ImageCommandError {
    fn from(error: ImageError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// 统一的命令返回结构。
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ImageCommandError>,
}

impl<T> CommandResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<ImageCommandError>) -> Self {
        let error = error.into();
        log::warn!("❌ 命令失败 - {} [{}]：{}", error.code, error.stage, error.message);
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn from_result(result: Result<T, ImageError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::fail(error),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CropRequest {
    /// Data URL、本地路径或 http(s) 地址。
    pub source: String,
    pub region: GeometricRegion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResizeRequest {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleRequest {
    pub source: String,
    /// 百分比，100 为原尺寸。
    pub scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    pub source: String,
    pub action: Action,
    pub strength: Strength,
    #[serde(default)]
    pub mask: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRequest {
    pub source: String,
    pub command: String,
    #[serde(default)]
    pub mask: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub style: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseRequest {
    pub command: String,
}

fn payload(result: Result<EncodedImage, ImageError>) -> CommandResponse<EncodedImagePayload> {
    CommandResponse::from_result(result.map(|image| EncodedImagePayload::from(&image)))
}

async fn load_mask(
    state: &ImageServiceState,
    mask: Option<String>,
) -> Result<Option<MaskBuffer>, ImageError> {
    match mask {
        Some(mask) => {
            let buffer = state.handler().load_buffer(ImageSource::infer(&mask)).await?;
            Ok(Some(MaskBuffer(buffer)))
        }
        None => Ok(None),
    }
}

/// 按百分比区域裁剪。
pub async fn crop_image(
    state: &ImageServiceState,
    request: CropRequest,
) -> CommandResponse<EncodedImagePayload> {
    payload(
        state
            .handler()
            .crop(ImageSource::infer(&request.source), request.region)
            .await,
    )
}

/// 拉伸到精确尺寸。
pub async fn resize_image(
    state: &ImageServiceState,
    request: ResizeRequest,
) -> CommandResponse<EncodedImagePayload> {
    payload(
        state
            .handler()
            .resize(ImageSource::infer(&request.source), request.width, request.height)
            .await,
    )
}

/// 等比缩放。
pub async fn scale_image(
    state: &ImageServiceState,
    request: ScaleRequest,
) -> CommandResponse<EncodedImagePayload> {
    payload(
        state
            .handler()
            .scale(ImageSource::infer(&request.source), request.scale)
            .await,
    )
}

/// 直接指定动作与强度应用滤镜。
pub async fn apply_image_filter(
    state: &ImageServiceState,
    request: FilterRequest,
) -> CommandResponse<EncodedImagePayload> {
    let result = async {
        let mask = load_mask(state, request.mask).await?;
        state
            .handler()
            .apply_filter(
                ImageSource::infer(&request.source),
                request.action,
                request.strength,
                mask,
            )
            .await
    }
    .await;

    payload(result)
}

/// 解析自由文本指令并在图片上执行。
pub async fn process_local_image(
    state: &ImageServiceState,
    request: ProcessRequest,
) -> CommandResponse<LocalProcessPayload> {
    let result = async {
        let mask = load_mask(state, request.mask).await?;
        state
            .handler()
            .process_local(ImageSource::infer(&request.source), mask, &request.command)
            .await
    }
    .await;

    CommandResponse::from_result(result.map(|outcome| LocalProcessPayload::from(&outcome)))
}

/// 调用外部服务生成图片。
pub async fn generate_image(
    state: &ImageServiceState,
    request: GenerateRequest,
) -> CommandResponse<GeneratedImagePayload> {
    let result = async {
        let generator = state.generator()?;
        generator
            .generate(&request.prompt, &request.style, &request.aspect_ratio)
            .await
    }
    .await;

    CommandResponse::from_result(result.map(|image| GeneratedImagePayload::from(&image)))
}

/// 只解析指令，不处理图片。解析没有失败路径。
pub fn parse_image_command(request: ParseRequest) -> CommandResponse<ParsedCommand> {
    CommandResponse::ok(command::parse_command(&request.command))
}

/// 切换图片处理性能档位。
pub fn set_image_performance_profile(
    state: &ImageServiceState,
    profile: &str,
) -> CommandResponse<String> {
    CommandResponse::from_result(
        state
            .set_performance_profile(profile)
            .and_then(|_| state.get_performance_profile()),
    )
}

/// 查询当前生效性能档位。
pub fn get_image_performance_profile(state: &ImageServiceState) -> CommandResponse<String> {
    CommandResponse::from_result(state.get_performance_profile())
}
