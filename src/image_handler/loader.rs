//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（Base64 / 本地文件 / URL / 内存字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验。目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - Base64：Data URL 解析 + 解码前体积估算。
//! - 文件：metadata 体积限制 + 异步读取。
//! - URL：协议 + 主机安全 + 重定向限制 + 内容类型 + 分块下载体积校验。
//! - 所有来源最终都过一次文件签名（magic bytes）校验。
//! - 加载阶段的失败一律映射为 `ImageError::Decode`，体积超限为 `ResourceLimit`。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use std::time::Duration;

use super::source::RawImageData;
use super::{ImageBuffer, ImageConfig, ImageError, ImageHandler, ImageSource};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// `data:image/<subtype>;base64,` 前缀。
static DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^data:image/([a-z0-9.+-]+)(?:;[a-z0-9=.+-]+)*;base64,")
        .expect("data uri regex is valid")
});

impl ImageHandler {
    /// 按来源加载原始字节。
    pub(crate) async fn load(
        &self,
        source: ImageSource,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        match source {
            ImageSource::Base64(data) => self.load_from_base64(&data, config),
            ImageSource::FilePath(path) => self.load_from_file(&path, config).await,
            ImageSource::Url(url) => self.load_from_url(&url, config).await,
            ImageSource::Buffer(buffer) => self.load_from_buffer(buffer, config),
        }
    }

    pub(super) fn load_from_base64(
        &self,
        data: &str,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(Self::oversized("Base64 解码后", bytes.len() as u64, config));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "base64",
        })
    }

    pub(super) async fn load_from_file(
        &self,
        path: &str,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ImageError::Decode(format!("无法访问文件 {}：{}", path, e)))?;

        if !metadata.is_file() {
            return Err(ImageError::Decode(format!("路径不是文件：{}", path)));
        }
        if metadata.len() > config.max_file_size {
            return Err(Self::oversized("文件", metadata.len(), config));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImageError::Decode(format!("读取文件失败 {}：{}", path, e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "file",
        })
    }

    pub(super) fn load_from_buffer(
        &self,
        buffer: ImageBuffer,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        if buffer.len() as u64 > config.max_file_size {
            return Err(Self::oversized("图片", buffer.len() as u64, config));
        }
        Self::validate_image_signature(buffer.as_bytes())?;

        Ok(RawImageData {
            bytes: buffer.into_bytes(),
            source_hint: "buffer",
        })
    }

    pub(super) async fn load_from_url(
        &self,
        url: &str,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        log::info!("🌐 开始下载图片 - URL: {}", Self::redact_url_for_log(url));

        Self::validate_url_safety(url, config)?;
        let bytes = self.download(url, config).await?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "url",
        })
    }

    /// 下载并校验响应：状态码、内容类型与体积。
    pub(super) async fn download(
        &self,
        url: &str,
        config: &ImageConfig,
    ) -> Result<Vec<u8>, ImageError> {
        let client = Self::build_http_client(config)?;

        let mut response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(e, url, config))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Decode(format!(
                "HTTP {}：{}",
                status.as_u16(),
                Self::status_message(status.as_u16())
            )));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !Self::is_image_content_type(content_type) {
                return Err(ImageError::Decode(format!(
                    "响应内容类型不是图片：{}",
                    content_type
                )));
            }
        }

        if let Some(length) = response.content_length() {
            if length > config.max_file_size {
                return Err(Self::oversized("下载内容", length, config));
            }
        }

        let mut buffer = Vec::with_capacity(BUFFER_INITIAL_CAPACITY);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::map_reqwest_error(e, url, config))?
        {
            if (buffer.len() + chunk.len()) as u64 > config.max_file_size {
                return Err(Self::oversized(
                    "下载内容",
                    (buffer.len() + chunk.len()) as u64,
                    config,
                ));
            }
            buffer.extend_from_slice(&chunk);
        }

        log::debug!(
            "📦 下载完成 - URL: {} 大小: {} 字节",
            Self::redact_url_for_log(url),
            buffer.len()
        );

        Ok(buffer)
    }

    fn build_http_client(config: &ImageConfig) -> Result<reqwest::Client, ImageError> {
        let max_redirects = config.max_redirects;
        let allow_private_network = config.allow_private_network;

        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error("重定向次数过多");
            }
            if !allow_private_network && Self::is_private_target(attempt.url()) {
                return attempt.error("重定向目标为内网或本地地址");
            }
            attempt.follow()
        });

        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(policy)
            .build()
            .map_err(|e| ImageError::Decode(format!("HTTP 客户端初始化失败：{}", e)))
    }

    /// 请求前的 URL 安全校验：协议白名单 + 内网拦截。
    fn validate_url_safety(url: &str, config: &ImageConfig) -> Result<(), ImageError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ImageError::Decode(format!("URL 格式错误：{}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ImageError::Decode(format!("不支持的协议：{}", other)));
            }
        }

        if parsed.host_str().is_none() {
            return Err(ImageError::Decode("URL 缺少主机名".to_string()));
        }

        if !config.allow_private_network && Self::is_private_target(&parsed) {
            return Err(ImageError::Decode(format!(
                "禁止访问内网或本地地址：{}",
                Self::redact_url_for_log(url)
            )));
        }

        Ok(())
    }

    fn is_private_target(url: &reqwest::Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');

        match host.parse::<IpAddr>() {
            Ok(ip) => Self::is_private_or_local_ip(ip),
            Err(_) => Self::is_local_hostname(host),
        }
    }

    fn is_local_hostname(host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local")
    }

    fn is_private_or_local_ip(ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                if v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || v4.is_multicast()
                {
                    return true;
                }

                let octets = v4.octets();
                octets[0] == 0
                    || (octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000)
            }
            IpAddr::V6(v6) => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    || v6.is_unique_local()
                    || v6.is_unicast_link_local()
                    || v6.is_multicast()
            }
        }
    }

    fn is_image_content_type(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().to_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }

    /// 日志中去掉 query 与 fragment，避免泄露签名参数。
    pub(crate) fn redact_url_for_log(url: &str) -> String {
        match reqwest::Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => "<invalid-url>".to_string(),
        }
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ImageError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ImageError> {
        let normalized = data.trim();

        let payload = if normalized
            .get(..5)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
        {
            let prefix = DATA_URI_PREFIX.find(normalized).ok_or_else(|| {
                ImageError::Decode("Data URL 不是 base64 编码的图片".to_string())
            })?;
            &normalized[prefix.end()..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
    }

    fn map_reqwest_error(e: reqwest::Error, url: &str, config: &ImageConfig) -> ImageError {
        let err_msg = Self::sanitize_error_message_with_redacted_url(&e.to_string(), url);

        if e.is_timeout() {
            ImageError::Decode(format!("下载超时（{}秒）", config.download_timeout))
        } else if e.is_redirect() {
            ImageError::Decode(format!("重定向被拒绝：{}", err_msg))
        } else if e.is_connect() {
            ImageError::Decode(format!("无法连接：{}", err_msg))
        } else {
            ImageError::Decode(format!("请求失败：{}", err_msg))
        }
    }

    fn sanitize_error_message_with_redacted_url(error_msg: &str, url: &str) -> String {
        let redacted = Self::redact_url_for_log(url);
        error_msg.replace(url, &redacted)
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }

    fn oversized(what: &str, size: u64, config: &ImageConfig) -> ImageError {
        ImageError::ResourceLimit(format!(
            "{}体积过大：{:.2} MB（限制：{:.2} MB）",
            what,
            size as f64 / 1024.0 / 1024.0,
            config.max_file_size as f64 / 1024.0 / 1024.0
        ))
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    pub(crate) fn validate_image_signature(bytes: &[u8]) -> Result<(), ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Decode("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| ImageError::Decode("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ImageError::Decode(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
