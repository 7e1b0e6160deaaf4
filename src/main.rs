//! # LumenFrame：命令行入口
//!
//! 本文件仅负责参数解析、配置加载与结果输出。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lumenframe::command::{Action, Strength};
use lumenframe::error::AppError;
use lumenframe::generation::{DEFAULT_API_KEY_ENV, DEFAULT_ASPECT_RATIO, GenerationConfig};
use lumenframe::image_handler::{
    self, CommandResponse, GeometricRegion, ImageBuffer, ImageError, ImageServiceState,
    commands::{
        CropRequest, FilterRequest, GenerateRequest, ParseRequest, ProcessRequest, ResizeRequest,
        ScaleRequest,
    },
};
use lumenframe::settings::AppSettings;
use serde::Serialize;
use serde_json::Value;

/// 图片变换、指令滤镜与 AI 生图
#[derive(Parser, Debug)]
#[command(name = "lumenframe")]
#[command(about = "🖼️ Crop, resize, filter or generate images and print a JSON result")]
struct Cli {
    /// JSON 设置文件
    #[arg(long, global = true, help = "Path to a JSON settings file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Abort the whole operation after this many seconds")]
    timeout_secs: Option<u64>,

    #[arg(long, global = true, help = "Performance profile: quality, balanced, speed")]
    profile: Option<String>,

    #[arg(long, global = true, help = "Output encoding: png or webp")]
    format: Option<String>,

    /// 结果图片写入的文件或目录
    #[arg(short, long, global = true, help = "Write the resulting image to this file or directory")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crop a percentage region
    Crop {
        source: String,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        #[arg(long, default_value_t = 100.0)]
        width: f64,
        #[arg(long, default_value_t = 100.0)]
        height: f64,
    },
    /// Stretch to exact pixel dimensions
    Resize {
        source: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Scale uniformly by a percentage
    Scale {
        source: String,
        #[arg(long)]
        percent: f64,
    },
    /// Apply one filter with an explicit strength
    Filter {
        source: String,
        #[arg(long, help = "brighten, darken, saturate, desaturate, blur, sharpen, remove")]
        action: String,
        #[arg(long, default_value_t = 50)]
        strength: u32,
        #[arg(long)]
        mask: Option<String>,
    },
    /// Parse a free-text command and apply it
    Process {
        source: String,
        command: String,
        #[arg(long)]
        mask: Option<String>,
    },
    /// Only parse a free-text command
    Parse { command: String },
    /// Generate an image from a prompt
    Generate {
        prompt: String,
        #[arg(long, default_value = "")]
        style: String,
        #[arg(long, default_value = DEFAULT_ASPECT_RATIO)]
        aspect_ratio: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let state = match build_state(&cli) {
        Ok(state) => state,
        Err(err) => {
            log::error!("初始化失败: {err}");
            return ExitCode::from(2);
        }
    };

    let timeout_secs = cli.timeout_secs;
    let output = cli.output.clone();
    let run = dispatch(&state, cli.command);

    let response = match timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), run).await {
            Ok(response) => response,
            Err(_) => to_json(&CommandResponse::<()>::fail(ImageError::Timeout(format!(
                "操作超过 {} 秒未完成",
                secs
            )))),
        },
        None => run.await,
    };

    let response = match response {
        Ok(value) => value,
        Err(err) => {
            log::error!("输出结果失败: {err}");
            return ExitCode::from(2);
        }
    };

    if let Some(output) = output.as_deref() {
        if let Err(err) = save_output(&response, output) {
            log::error!("保存结果图片失败: {err}");
            return ExitCode::from(2);
        }
    }

    match serde_json::to_string_pretty(&response) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            log::error!("输出结果失败: {err}");
            return ExitCode::from(2);
        }
    }

    exit_code_for(&response)
}

/// 成功为 0，结构化失败为 1；初始化与输出错误在 `main` 中返回 2。
fn exit_code_for(response: &Value) -> ExitCode {
    if response["success"].as_bool().unwrap_or(false) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_state(cli: &Cli) -> Result<ImageServiceState, AppError> {
    let settings = AppSettings::load(cli.config.as_deref())?;

    let mut generation = settings.generation;
    if !generation.is_configured() {
        if let Ok(from_env) = GenerationConfig::from_env(DEFAULT_API_KEY_ENV) {
            generation.api_key = from_env.api_key;
        }
    }

    let state = ImageServiceState::with_generation(settings.image, generation)?;
    if let Some(profile) = cli.profile.as_deref() {
        state.set_performance_profile(profile)?;
    }
    if let Some(format) = cli.format.as_deref() {
        state.set_output_format(format)?;
    }
    Ok(state)
}

async fn dispatch(state: &ImageServiceState, command: Commands) -> Result<Value, AppError> {
    match command {
        Commands::Crop {
            source,
            x,
            y,
            width,
            height,
        } => {
            let request = CropRequest {
                source,
                region: GeometricRegion::new(x, y, width, height),
            };
            to_json(&image_handler::crop_image(state, request).await)
        }
        Commands::Resize {
            source,
            width,
            height,
        } => {
            let request = ResizeRequest {
                source,
                width,
                height,
            };
            to_json(&image_handler::resize_image(state, request).await)
        }
        Commands::Scale { source, percent } => {
            let request = ScaleRequest {
                source,
                scale: percent,
            };
            to_json(&image_handler::scale_image(state, request).await)
        }
        Commands::Filter {
            source,
            action,
            strength,
            mask,
        } => {
            let action = match Action::from_name(&action) {
                Ok(action) => action,
                Err(err) => return to_json(&CommandResponse::<()>::fail(err)),
            };
            let request = FilterRequest {
                source,
                action,
                strength: Strength::new(strength),
                mask,
            };
            to_json(&image_handler::apply_image_filter(state, request).await)
        }
        Commands::Process {
            source,
            command,
            mask,
        } => {
            let request = ProcessRequest {
                source,
                command,
                mask,
            };
            to_json(&image_handler::process_local_image(state, request).await)
        }
        Commands::Parse { command } => {
            to_json(&image_handler::parse_image_command(ParseRequest { command }))
        }
        Commands::Generate {
            prompt,
            style,
            aspect_ratio,
        } => {
            let request = GenerateRequest {
                prompt,
                style,
                aspect_ratio,
            };
            to_json(&image_handler::generate_image(state, request).await)
        }
    }
}

fn to_json<T: Serialize>(response: &CommandResponse<T>) -> Result<Value, AppError> {
    serde_json::to_value(response)
        .map_err(|e| AppError::Config(format!("序列化结果失败: {}", e)))
}

/// 把响应中的 Data URL 写成文件；目标是目录时按时间戳命名。
fn save_output(response: &Value, output: &Path) -> Result<(), AppError> {
    let data = &response["data"];
    let Some(data_uri) = data["data_uri"]
        .as_str()
        .or_else(|| data["image"]["data_uri"].as_str())
    else {
        log::warn!("⚠️ 结果中没有图片，跳过保存");
        return Ok(());
    };

    let buffer: ImageBuffer = data_uri.parse()?;
    let path = if output.is_dir() {
        output.join(format!(
            "lumenframe-{}.{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S"),
            extension_for(data_uri)
        ))
    } else {
        output.to_path_buf()
    };

    std::fs::write(&path, buffer.as_bytes())?;
    log::info!("💾 已保存结果图片: {} ({} 字节)", path.display(), buffer.len());
    Ok(())
}

fn extension_for(data_uri: &str) -> &'static str {
    let mime = data_uri
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or_default();
    match mime {
        "image/webp" => "webp",
        "image/jpeg" => "jpg",
        _ => "png",
    }
}
