use crate::core::interfaces::ImageOptimizer;
use crate::core::models::{extension_of, ImageOptimizeOptions};
use crate::utils::{KilnError, Logger, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static SVG_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title(\s[^>]*)?>.*?</title>").expect("valid title regex"));
static SVG_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static SVG_INTER_TAG_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s+<").expect("valid whitespace regex"));

/// Lossless-first image optimizer; output is never larger than the input
#[derive(Clone, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize_bytes(bytes: &[u8], path: &Path, options: &ImageOptimizeOptions) -> Result<Vec<u8>> {
        let optimized = match extension_of(path).as_deref() {
            Some("png") => Self::optimize_png(bytes, options.png_speed)?,
            Some("jpg") | Some("jpeg") => Self::optimize_jpeg(bytes, options.jpeg_quality)?,
            Some("svg") => Self::optimize_svg(bytes, options)?,
            // GIFs are never re-encoded, so they stay non-interlaced
            _ => return Ok(bytes.to_vec()),
        };

        if optimized.len() < bytes.len() {
            Logger::debug(&format!(
                "🖼️  {}: {} → {} bytes",
                path.display(),
                bytes.len(),
                optimized.len()
            ));
            Ok(optimized)
        } else {
            Ok(bytes.to_vec())
        }
    }

    fn optimize_png(bytes: &[u8], speed: u8) -> Result<Vec<u8>> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| KilnError::transform("images", format!("PNG decode failed: {}", e)))?;

        let compression = match speed {
            0..=3 => CompressionType::Best,
            4..=7 => CompressionType::Default,
            _ => CompressionType::Fast,
        };

        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive)
            .write_image(img.as_bytes(), img.width(), img.height(), img.color())
            .map_err(|e| KilnError::transform("images", format!("PNG encode failed: {}", e)))?;
        Ok(out)
    }

    fn optimize_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|e| KilnError::transform("images", format!("JPEG decode failed: {}", e)))?;
        let rgb = img.to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| KilnError::transform("images", format!("JPEG encode failed: {}", e)))?;
        Ok(out)
    }

    fn optimize_svg(bytes: &[u8], options: &ImageOptimizeOptions) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(bytes)
            .map_err(|e| KilnError::transform("images", format!("SVG is not UTF-8: {}", e)))?;

        let mut svg = source.to_string();
        if options.svg_remove_comments {
            svg = SVG_COMMENT.replace_all(&svg, "").into_owned();
        }
        if options.svg_remove_title {
            svg = SVG_TITLE.replace_all(&svg, "").into_owned();
        }
        svg = SVG_INTER_TAG_SPACE.replace_all(svg.trim(), "><").into_owned();

        Ok(svg.into_bytes())
    }
}

#[async_trait::async_trait]
impl ImageOptimizer for ImageProcessor {
    async fn optimize(
        &self,
        bytes: Vec<u8>,
        path: &Path,
        options: &ImageOptimizeOptions,
    ) -> Result<Vec<u8>> {
        let path_buf = path.to_path_buf();
        let options = options.clone();

        let result = tokio::task::spawn_blocking(move || {
            let optimized = Self::optimize_bytes(&bytes, &path_buf, &options);
            (optimized, bytes)
        })
        .await
        .map_err(|e| KilnError::build(format!("Image task failed: {}", e)))?;

        match result {
            (Ok(optimized), _) => Ok(optimized),
            (Err(e), original) => {
                Logger::warn(&format!("{} left unoptimized: {}", path.display(), e));
                Ok(original)
            }
        }
    }
}
