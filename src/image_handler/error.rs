//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载图片链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! `code()` / `stage()` 给结构化响应使用：前者稳定可比对，后者标明失败阶段。

/// 图片处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// 图片加载或解码失败（来源不可达、非图片、数据损坏）。
    #[error("图片加载失败：{0}")]
    Decode(String),

    /// 无法分配绘制画布。
    #[error("画布错误：{0}")]
    Surface(String),

    /// 画布序列化失败。
    #[error("编码错误：{0}")]
    Encode(String),

    /// 入参不合法（空提示词、非法比例、裁剪区域为空等）。
    #[error("参数错误：{0}")]
    Validation(String),

    /// 外部生图服务返回失败或网络不可用。
    #[error("上游服务错误：{0}")]
    Upstream(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

impl ImageError {
    /// 稳定错误码，供前端或脚本判定。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "E_DECODE",
            Self::Surface(_) => "E_SURFACE",
            Self::Encode(_) => "E_ENCODE",
            Self::Validation(_) => "E_VALIDATION",
            Self::Upstream(_) => "E_UPSTREAM",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
        }
    }

    /// 失败所处的处理阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Decode(_) => "load",
            Self::Surface(_) => "draw",
            Self::Encode(_) => "encode",
            Self::Validation(_) => "validate",
            Self::Upstream(_) => "upstream",
            Self::Timeout(_) => "timeout",
            Self::ResourceLimit(_) => "limit",
        }
    }
}
