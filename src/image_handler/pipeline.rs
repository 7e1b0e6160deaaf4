//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像”与“画布 → 字节”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码
//! 4. 绘制阶段结束后按配置格式编码为 PNG / WebP

use fast_image_resize as fr;
use image::{DynamicImage, GenericImageView, ImageReader, RgbaImage};
use std::io::Cursor;

use super::source::{EncodedImage, RawImageData};
use super::{ImageBuffer, ImageConfig, ImageError, OutputFormat, ResampleFilter};

/// 将原始字节解码为图像。
pub(crate) fn decode_image(
    raw: &RawImageData,
    config: &ImageConfig,
) -> Result<DynamicImage, ImageError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(&raw.bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    let decoded = image::load_from_memory(&raw.bytes)
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

    let (width, height) = decoded.dimensions();
    validate_pixel_limits(config, width, height)?;

    log::debug!(
        "🖼️ 图片解码成功 - 来源: {} 尺寸: {}x{}",
        raw.source_hint,
        width,
        height
    );

    Ok(decoded)
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
}

/// 校验像素数量是否超过配置上限。
pub(crate) fn validate_pixel_limits(
    config: &ImageConfig,
    width: u32,
    height: u32,
) -> Result<(), ImageError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(
    config: &ImageConfig,
    width: u32,
    height: u32,
) -> Result<(), ImageError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ImageError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 把画布像素编码为目标格式。
pub(crate) fn encode_pixels(
    pixels: RgbaImage,
    format: OutputFormat,
) -> Result<EncodedImage, ImageError> {
    let (width, height) = pixels.dimensions();
    let mut cursor = Cursor::new(Vec::new());

    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut cursor, format.image_format())
        .map_err(|e| ImageError::Encode(format!("{} 编码失败：{}", format.as_str(), e)))?;

    let bytes = cursor.into_inner();
    if bytes.is_empty() {
        return Err(ImageError::Encode("编码结果为空".to_string()));
    }

    Ok(EncodedImage {
        buffer: ImageBuffer::from(bytes),
        format,
        width,
        height,
    })
}

/// 拉伸缩放到精确尺寸；`fast_image_resize` 失败时回退 `image::resize_exact`。
pub(crate) fn resize_exact(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: ResampleFilter,
) -> RgbaImage {
    match resize_with_fast_image_resize(image, target_width, target_height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::resize_exact：{}", err);
            image
                .resize_exact(target_width, target_height, filter.to_image_filter())
                .to_rgba8()
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: ResampleFilter,
) -> Result<RgbaImage, ImageError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
            .map_err(|e| ImageError::Surface(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Surface(format!("fast_image_resize 执行失败：{}", e)))?;

    RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ImageError::Surface("fast_image_resize 输出缓冲长度异常".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{ImageFormat, Rgba};

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

    fn raw(bytes: Vec<u8>) -> RawImageData {
        RawImageData {
            bytes: Bytes::from(bytes),
            source_hint: "test",
        }
    }

    #[test]
    fn decode_reads_dimensions() {
        let decoded = decode_image(&raw(create_png_bytes(64, 32)), &ImageConfig::default())
            .expect("decode should succeed");

        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn decode_rejects_too_many_pixels() {
        let mut config = ImageConfig::default();
        config.max_decoded_pixels = 1_000;

        let result = decode_image(&raw(create_png_bytes(100, 100)), &config);

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn decode_rejects_truncated_png() {
        let mut png = create_png_bytes(32, 32);
        png.truncate(40);

        let result = decode_image(&raw(png), &ImageConfig::default());

        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn encode_webp_round_trips_dimensions() {
        let pixels = RgbaImage::from_pixel(12, 7, Rgba([10, 20, 30, 255]));

        let encoded = encode_pixels(pixels, OutputFormat::Webp).expect("webp encode");
        let decoded = image::load_from_memory_with_format(encoded.buffer.as_bytes(), ImageFormat::WebP)
            .expect("webp decode");

        assert_eq!((encoded.width, encoded.height), (12, 7));
        assert_eq!(decoded.dimensions(), (12, 7));
        assert!(encoded.to_data_uri().starts_with("data:image/webp;base64,"));
    }

    #[test]
    fn resize_exact_stretches_to_target() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 10, Rgba([1, 2, 3, 255])));

        let resized = resize_exact(&image, 15, 30, ResampleFilter::Triangle);

        assert_eq!(resized.dimensions(), (15, 30));
        let pixel = resized.get_pixel(7, 20);
        for (actual, expected) in pixel.0.iter().zip([1u8, 2, 3, 255]) {
            assert!(actual.abs_diff(expected) <= 1);
        }
    }
}
