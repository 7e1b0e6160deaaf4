//! 宽高比映射：把前端可选的比例收敛到服务端支持的比例集合。

/// 服务端支持的比例。
pub const SUPPORTED_ASPECT_RATIOS: [&str; 9] =
    ["16:9", "1:1", "21:9", "2:3", "3:2", "4:5", "5:4", "9:16", "9:21"];

/// 无法识别时的回落比例。
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// 固定查表映射，未知输入回落到 1:1。
pub fn map_aspect_ratio(input: &str) -> &'static str {
    match input.trim() {
        "1:1" => "1:1",
        "16:9" => "16:9",
        "9:16" => "9:16",
        "4:3" => "3:2",
        "3:4" => "2:3",
        "3:2" => "3:2",
        "2:3" => "2:3",
        "21:9" => "21:9",
        other => {
            log::debug!("未知宽高比 {:?}，回落到 {}", other, DEFAULT_ASPECT_RATIO);
            DEFAULT_ASPECT_RATIO
        }
    }
}
