//! 生图客户端：一次 multipart POST，响应分流为图片字节或结构化错误。

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use serde::Serialize;
use serde_json::Value;

use super::{GenerationConfig, map_aspect_ratio};
use crate::image_handler::{ImageBuffer, ImageError, ImageHandler};

const BUFFER_INITIAL_CAPACITY: usize = 64 * 1024;
/// 错误信息中原始响应文本的最大长度。
const MAX_ERROR_TEXT_LEN: usize = 512;

/// 生图结果。
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub buffer: ImageBuffer,
    pub mime_type: String,
    /// 实际发送给服务端的宽高比。
    pub aspect_ratio: &'static str,
}

impl GeneratedImage {
    pub fn to_data_uri(&self) -> String {
        self.buffer.to_data_uri(&self.mime_type)
    }
}

/// 生图结果的可序列化视图。
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImagePayload {
    pub data_uri: String,
    pub mime_type: String,
    pub aspect_ratio: String,
    pub byte_size: usize,
}

impl From<&GeneratedImage> for GeneratedImagePayload {
    fn from(image: &GeneratedImage) -> Self {
        Self {
            data_uri: image.to_data_uri(),
            mime_type: image.mime_type.clone(),
            aspect_ratio: image.aspect_ratio.to_string(),
            byte_size: image.buffer.len(),
        }
    }
}

/// 文生图服务客户端。
pub struct GenerationClient {
    http: reqwest::Client,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ImageError::Upstream(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// 按提示词生成图片。
    ///
    /// 空提示词在发起任何网络请求前就返回 `Validation`。
    pub async fn generate(
        &self,
        prompt: &str,
        style: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, ImageError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::Validation("提示词不能为空".to_string()));
        }

        let mapped_ratio = map_aspect_ratio(aspect_ratio);
        let style = style.trim();
        let form = self.build_form(prompt, style, mapped_ratio);

        log::info!(
            "🎨 请求生图 - 风格: {:?} 比例: {} -> {} 提示词长度: {}",
            style,
            aspect_ratio,
            mapped_ratio,
            prompt.chars().count()
        );

        let mut response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&text);
            log::warn!("⚠️ 生图服务返回错误 - HTTP {}：{}", status.as_u16(), message);
            return Err(ImageError::Upstream(format!(
                "HTTP {}：{}",
                status.as_u16(),
                message
            )));
        }

        let limit = self.config.max_response_bytes;
        if let Some(length) = response.content_length() {
            if length > limit {
                return Err(oversized(length, limit));
            }
        }

        let mut buffer = Vec::with_capacity(BUFFER_INITIAL_CAPACITY);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_reqwest_error(e))?
        {
            let next_len = (buffer.len() + chunk.len()) as u64;
            if next_len > limit {
                return Err(oversized(next_len, limit));
            }
            buffer.extend_from_slice(&chunk);
        }

        ImageHandler::validate_image_signature(&buffer)
            .map_err(|e| ImageError::Upstream(format!("生图服务返回的不是图片：{}", e)))?;
        let mime_type = infer::get(&buffer)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| self.config.output_format.mime_type().to_string());

        log::info!("✅ 生图完成 - {} {} 字节", mime_type, buffer.len());

        Ok(GeneratedImage {
            buffer: ImageBuffer::from(buffer),
            mime_type,
            aspect_ratio: mapped_ratio,
        })
    }

    /// 服务端只接受 `multipart/form-data`；风格为空时不发送 `style_preset`。
    fn build_form(&self, prompt: &str, style: &str, aspect_ratio: &'static str) -> Form {
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("aspect_ratio", aspect_ratio)
            .text("output_format", self.config.output_format.as_str());

        if style.is_empty() {
            form
        } else {
            form.text("style_preset", style.to_string())
        }
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> ImageError {
        if e.is_timeout() {
            ImageError::Timeout(format!("生图请求超时（{}秒）", self.config.timeout_secs))
        } else if e.is_connect() {
            ImageError::Upstream(format!("无法连接生图服务：{}", e))
        } else {
            ImageError::Upstream(format!("生图请求失败：{}", e))
        }
    }
}

/// 从错误响应中取出可读信息：依次尝试 `message`、`errors`、`error`，否则用原文。
fn extract_error_message(text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text).ok().and_then(|value| {
        ["message", "errors", "error"]
            .iter()
            .find_map(|key| value.get(*key).map(describe_value))
    });

    from_json.unwrap_or_else(|| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            "未知错误".to_string()
        } else {
            trimmed.chars().take(MAX_ERROR_TEXT_LEN).collect()
        }
    })
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(describe_value)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn oversized(size: u64, limit: u64) -> ImageError {
    ImageError::ResourceLimit(format!(
        "生图响应体积过大：{:.2} MB（限制：{:.2} MB）",
        size as f64 / 1024.0 / 1024.0,
        limit as f64 / 1024.0 / 1024.0
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn png_bytes() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(4, 4))
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode png");
        cursor.into_inner()
    }

    fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            content_type,
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    /// 读取完整请求（头部 + Content-Length 指定的正文）后回写响应，返回收到的请求文本。
    fn serve_once(response: Vec<u8>) -> (u16, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let port = listener.local_addr().expect("read local addr failed").port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).expect("read request failed");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let is_multipart = text[..header_end]
                        .to_ascii_lowercase()
                        .contains("multipart/form-data");
                    // 分块发送的表单没有 Content-Length，以结束分隔符为准
                    let body_done = if content_length == 0 && is_multipart {
                        text[header_end + 4..].contains("--\r\n")
                            && text.ends_with("\r\n\r\n")
                    } else {
                        request.len() >= header_end + 4 + content_length
                    };
                    if body_done {
                        break;
                    }
                }
            }

            // 客户端可能提前断开（如体积超限），写失败不影响断言
            let _ = stream.write_all(&response);
            let _ = stream.flush();
            String::from_utf8_lossy(&request).into_owned()
        });

        (port, server)
    }

    /// 取出 multipart 正文中某个文本字段的值。
    fn form_field(request: &str, name: &str) -> Option<String> {
        let marker = format!("name=\"{}\"\r\n\r\n", name);
        let start = request.find(&marker)? + marker.len();
        let end = request[start..].find("\r\n")?;
        Some(request[start..start + end].to_string())
    }

    fn client_for(port: u16) -> GenerationClient {
        let mut config = GenerationConfig::with_api_key("test-key");
        config.endpoint = format!("http://127.0.0.1:{}/generate", port);
        GenerationClient::new(config).expect("client")
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_request() {
        // 端口 9 上没有服务，若发出请求会得到 Upstream 而不是 Validation
        let mut config = GenerationConfig::with_api_key("k");
        config.endpoint = "http://127.0.0.1:9/generate".to_string();
        let client = GenerationClient::new(config).expect("client");

        let result = client.generate("   ", "photographic", "1:1").await;

        assert!(matches!(result, Err(ImageError::Validation(_))));
    }

    #[tokio::test]
    async fn successful_generation_sends_mapped_request() {
        let png = png_bytes();
        let (port, server) = serve_once(http_response("200 OK", "image/png", &png));

        let image = client_for(port)
            .generate("a lighthouse at dusk", "cinematic", "4:3")
            .await
            .expect("generation should succeed");
        let request = server.join().expect("server thread failed");

        assert_eq!(image.buffer.as_bytes(), png.as_slice());
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.aspect_ratio, "3:2");

        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /generate"));
        assert!(lower.contains("authorization: bearer test-key"));
        assert!(lower.contains("accept: image/*"));
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert_eq!(form_field(&request, "prompt").as_deref(), Some("a lighthouse at dusk"));
        assert_eq!(form_field(&request, "style_preset").as_deref(), Some("cinematic"));
        assert_eq!(form_field(&request, "aspect_ratio").as_deref(), Some("3:2"));
        assert_eq!(form_field(&request, "output_format").as_deref(), Some("png"));
    }

    #[tokio::test]
    async fn empty_style_is_left_out_of_the_form() {
        let png = png_bytes();
        let (port, server) = serve_once(http_response("200 OK", "image/png", &png));

        client_for(port)
            .generate("a quiet harbor", "   ", "9:16")
            .await
            .expect("generation should succeed");
        let request = server.join().expect("server thread failed");

        assert_eq!(form_field(&request, "prompt").as_deref(), Some("a quiet harbor"));
        assert_eq!(form_field(&request, "aspect_ratio").as_deref(), Some("9:16"));
        assert!(form_field(&request, "style_preset").is_none());
    }

    #[tokio::test]
    async fn error_status_becomes_upstream_with_vendor_message() {
        let body = br#"{"name":"bad_request","errors":["prompt is too long","style unknown"]}"#;
        let (port, server) =
            serve_once(http_response("400 Bad Request", "application/json", body));

        let result = client_for(port).generate("x", "anime", "1:1").await;
        server.join().expect("server thread failed");

        match result {
            Err(ImageError::Upstream(message)) => {
                assert!(message.contains("400"));
                assert!(message.contains("prompt is too long"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_image_success_body_is_upstream_error() {
        let (port, server) = serve_once(http_response("200 OK", "text/plain", b"hello"));

        let result = client_for(port).generate("cat", "", "1:1").await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(ImageError::Upstream(_))));
    }

    #[tokio::test]
    async fn oversized_response_is_resource_limit() {
        let png = png_bytes();
        let (port, server) = serve_once(http_response("200 OK", "image/png", &png));

        let mut config = GenerationConfig::with_api_key("k");
        config.endpoint = format!("http://127.0.0.1:{}/generate", port);
        config.max_response_bytes = 8;
        let client = GenerationClient::new(config).expect("client");

        let result = client.generate("cat", "", "1:1").await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn error_message_falls_back_through_known_fields() {
        assert_eq!(extract_error_message(r#"{"message":"quota"}"#), "quota");
        assert_eq!(extract_error_message(r#"{"error":"denied"}"#), "denied");
        assert_eq!(extract_error_message("plain failure"), "plain failure");
        assert_eq!(extract_error_message(""), "未知错误");
    }
}
