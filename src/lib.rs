//! # LumenFrame：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                调用方（CLI / 宿主应用）                   │
//! │                                                          │
//! │  请求 JSON ── commands::* ── CommandResponse<T>          │
//! │       │  (结构化成功/失败，错误不逃逸)                    │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ command ──── 自由文本 → (Action, Strength)            │
//! │  │                                                       │
//! │  ├─ filters ──── 像素滤镜 + 蒙版混合                      │
//! │  │                                                       │
//! │  ├─ image_handler  Load → Draw → Encode → Resolve        │
//! │  │   ├─ loader      Base64/文件/URL/内存字节              │
//! │  │   ├─ transform   裁剪·拉伸·缩放                        │
//! │  │   └─ pipeline    解码·限制·编码                        │
//! │  │                                                       │
//! │  ├─ generation ── 外部文生图黑盒                          │
//! │  ├─ settings ──── JSON 配置文件                           │
//! │  └─ error ─────── AppError (二进制入口统一错误)           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`command`] | 指令解析，关键字有序匹配 |
//! | [`filters`] | 提亮、压暗、饱和度、模糊、锐化、移除，支持蒙版 |
//! | [`image_handler`] | 图片加载、画布变换、编码与命令层 |
//! | [`generation`] | 文生图客户端与宽高比映射 |
//! | [`settings`] | 配置文件加载 |
//! | [`error`] | 统一错误类型 `AppError` |

pub mod command;
pub mod error;
pub mod filters;
pub mod generation;
pub mod image_handler;
pub mod settings;
