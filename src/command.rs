//! 指令解析模块
//!
//! # 设计思路
//!
//! 用户以自由文本描述想要的效果（如 “brighten the sky a bit”），
//! 本模块按关键字把文本映射为离散的 `(Action, Strength)`。
//!
//! # 实现思路
//!
//! - 统一转小写后按固定顺序逐条匹配子串，命中即返回。
//! - 顺序即优先级：brighten → darken → saturate → desaturate → blur →
//!   sharpen → smooth（即 blur 5）→ remove，全部未命中回落到 brighten 30。
//! - 解析没有失败路径。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image_handler::ImageError;

/// 滤镜动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Brighten,
    Darken,
    Saturate,
    Desaturate,
    Blur,
    Sharpen,
    Remove,
}

impl Action {
    /// 全部动作，按解析优先级排列。
    pub const ALL: [Action; 7] = [
        Action::Brighten,
        Action::Darken,
        Action::Saturate,
        Action::Desaturate,
        Action::Blur,
        Action::Sharpen,
        Action::Remove,
    ];

    /// 从外部字符串解析动作名（大小写不敏感）。
    pub fn from_name(name: &str) -> Result<Self, ImageError> {
        let normalized = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| {
                ImageError::Validation(format!(
                    "未知滤镜动作：{}（可选：brighten / darken / saturate / desaturate / blur / sharpen / remove）",
                    normalized
                ))
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brighten => "brighten",
            Self::Darken => "darken",
            Self::Saturate => "saturate",
            Self::Desaturate => "desaturate",
            Self::Blur => "blur",
            Self::Sharpen => "sharpen",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 效果强度，取值 0~100。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Strength(u8);

impl Strength {
    pub const MAX: u8 = 100;
    pub const ZERO: Strength = Strength(0);

    /// 超出 100 的取值截断为 100。
    pub fn new(value: u32) -> Self {
        Self(value.min(Self::MAX as u32) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 归一化到 `[0, 1]`。
    pub fn fraction(self) -> f32 {
        self.0 as f32 / Self::MAX as f32
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// 强度减半（向下取整），用于复合滤镜。
    pub fn halved(self) -> Self {
        Self(self.0 / 2)
    }
}

impl From<u32> for Strength {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Strength> for u32 {
    fn from(value: Strength) -> Self {
        value.0 as u32
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 解析结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub action: Action,
    pub strength: Strength,
}

impl ParsedCommand {
    pub const fn new(action: Action, strength: u8) -> Self {
        Self {
            action,
            strength: Strength(strength),
        }
    }
}

/// 未命中任何关键字时的结果。
pub const DEFAULT_COMMAND: ParsedCommand = ParsedCommand::new(Action::Brighten, 30);

/// 子串匹配谓词。
enum Keyword {
    /// 包含即命中。
    Plain(&'static str),
    /// 包含且至少一处出现不以 `prefix` 开头。
    NotPrefixedBy {
        keyword: &'static str,
        prefix: &'static str,
    },
}

impl Keyword {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Keyword::Plain(keyword) => lowered.contains(keyword),
            Keyword::NotPrefixedBy { keyword, prefix } => lowered
                .match_indices(keyword)
                .any(|(idx, _)| !lowered[..idx].ends_with(prefix)),
        }
    }
}

/// 有序规则表，顺序不可调整。
const RULES: [(Keyword, ParsedCommand); 8] = [
    (Keyword::Plain("brighten"), ParsedCommand::new(Action::Brighten, 50)),
    (Keyword::Plain("darken"), ParsedCommand::new(Action::Darken, 50)),
    (
        Keyword::NotPrefixedBy {
            keyword: "saturate",
            prefix: "de",
        },
        ParsedCommand::new(Action::Saturate, 50),
    ),
    (Keyword::Plain("desaturate"), ParsedCommand::new(Action::Desaturate, 50)),
    (Keyword::Plain("blur"), ParsedCommand::new(Action::Blur, 10)),
    (Keyword::Plain("sharpen"), ParsedCommand::new(Action::Sharpen, 50)),
    (Keyword::Plain("smooth"), ParsedCommand::new(Action::Blur, 5)),
    (Keyword::Plain("remove"), ParsedCommand::new(Action::Remove, 70)),
];

/// 将自由文本指令解析为 `(Action, Strength)`。
///
/// # 示例
/// ```rust
/// use lumenframe::command::{parse_command, Action};
///
/// let parsed = parse_command("Please BLUR this");
/// assert_eq!(parsed.action, Action::Blur);
/// assert_eq!(parsed.strength.get(), 10);
/// ```
pub fn parse_command(command: &str) -> ParsedCommand {
    let lowered = command.to_lowercase();

    let parsed = RULES
        .iter()
        .find(|(keyword, _)| keyword.matches(&lowered))
        .map(|(_, parsed)| *parsed)
        .unwrap_or(DEFAULT_COMMAND);

    log::debug!(
        "🧭 指令解析：{:?} -> {} @{}",
        command,
        parsed.action,
        parsed.strength
    );

    parsed
}
