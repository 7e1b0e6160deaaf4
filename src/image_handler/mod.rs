//! # 图片处理模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“图片来源识别 → 加载校验 → 解码 → 画布绘制 → 编码 → 命令暴露”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `commands`：仅做请求反序列化与结构化响应包装（薄封装）
//! - `service`：承载可注入状态（`ImageServiceState`）
//! - `handler`：编排 Load → Draw → Encode → Resolve 整条流水线
//! - `loader`：负责 URL/Base64/文件/内存字节加载与安全校验
//! - `pipeline`：负责解码、像素限制、重采样与编码
//! - `transform`：负责百分比区域换算与画布绘制（裁剪/拉伸/缩放）
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型与命令函数，内部细节保持 `mod` 私有。
//! 调用方持有 `ImageServiceState`，提升测试隔离与后续扩展能力。
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! CLI / 宿主调用
//!    ↓
//! commands.rs（请求适配 + CommandResponse）
//!    ↓
//! service.rs（状态持有、服务入口）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + URL/体积安全校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 编码）
//!    ├─ transform.rs（画布分配 + 绘制）
//!    └─ filters（像素滤镜 + 蒙版）
//!    ↓
//! 返回 EncodedImage / ImageError
//! ```
//!
//! ## 分层职责建议
//!
//! - 调用入口变更（命令名/参数）优先改 `commands.rs`
//! - 配置与策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 单阶段行为优化分别改 `loader/pipeline/transform`

pub mod commands;
mod config;
mod error;
mod handler;
mod loader;
mod pipeline;
mod service;
mod source;
mod transform;

pub use commands::{
    CommandResponse,
    ImageCommandError,
    apply_image_filter,
    crop_image,
    generate_image,
    get_image_performance_profile,
    parse_image_command,
    process_local_image,
    resize_image,
    scale_image,
    set_image_performance_profile,
};
pub use config::{ImageConfig, ImagePerformanceProfile, OutputFormat, ResampleFilter};
pub use error::ImageError;
pub use handler::{ImageHandler, LocalProcessOutcome, LocalProcessPayload};
pub use service::ImageServiceState;
pub use source::{EncodedImage, EncodedImagePayload, ImageBuffer, ImageSource, MaskBuffer};
pub use transform::{GeometricRegion, PixelRect, scaled_dimensions};
