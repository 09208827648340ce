//! Image fetching: resolve a reference to bytes, then normalise for embedding.
//!
//! Records carry their photos as a comma-separated list of links, usually
//! Google Drive share links. A share link points at an HTML viewer, so it is
//! rewritten to Drive's direct-download form before fetching.
//!
//! Normalisation flattens any transparency onto white, caps the width at
//! `max_image_width` (Lanczos3, aspect kept) and re-encodes as JPEG. Phone
//! photos are routinely 4000 px wide; without the cap a ten-photo record
//! produces a DOCX that LibreOffice takes minutes to lay out.
//!
//! Every failure here is an [`ImageError`]: the image is skipped, the report
//! is still produced.

use crate::config::ReportConfig;
use crate::error::{ImageError, ReportError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, Rgba};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// A downloaded image, normalised to JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// The reference the image was fetched from, as written in the record.
    pub url: String,
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:image/jpeg;base64,…` for HTML embedding.
    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.to_base64())
    }

    /// Re-encode as PNG; DOCX media parts written by docx-rs are PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, ImageError> {
        let img = image::load_from_memory(&self.bytes).map_err(|e| ImageError::EncodeFailed {
            url: self.url.clone(),
            detail: e.to_string(),
        })?;
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| ImageError::EncodeFailed {
                url: self.url.clone(),
                detail: e.to_string(),
            })?;
        Ok(buf)
    }

    /// Display height for a given display width, keeping the aspect ratio.
    pub fn scaled_height(&self, display_width: f64) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        display_width * self.height as f64 / self.width as f64
    }
}

/// Outcome of fetching every reference in one cell.
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    /// Successfully fetched images, in reference order.
    pub images: Vec<EncodedImage>,
    /// References that were skipped.
    pub errors: Vec<ImageError>,
}

/// Where images come from.
///
/// The generator is generic over this so tests can serve images from memory.
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    /// Fetch and normalise one image reference.
    async fn fetch(&self, reference: &str) -> Result<EncodedImage, ImageError>;

    /// Fetch every reference of a comma-separated cell, sequentially.
    ///
    /// Failures are logged and collected, never propagated.
    async fn fetch_all(&self, cell: &str) -> ImageBatch {
        let mut batch = ImageBatch::default();
        for reference in parse_image_urls(cell) {
            match self.fetch(&reference).await {
                Ok(img) => batch.images.push(img),
                Err(e) => {
                    warn!("Skipping image: {}", e);
                    batch.errors.push(e);
                }
            }
        }
        batch
    }
}

/// Fetches images over HTTP with a shared client.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_width: u32,
    jpeg_quality: u8,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64, max_width: u32, jpeg_quality: u8) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReportError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout_secs,
            max_width,
            jpeg_quality,
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        Self::new(
            config.image_timeout_secs,
            config.max_image_width,
            config.jpeg_quality,
        )
    }
}

impl ImageSource for HttpImageFetcher {
    async fn fetch(&self, reference: &str) -> Result<EncodedImage, ImageError> {
        let url = resolve_download_url(reference)?;
        debug!("Fetching image {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ImageError::Timeout {
                    url: reference.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ImageError::DownloadFailed {
                    url: reference.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpStatus {
                url: reference.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ImageError::Timeout {
                    url: reference.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ImageError::DownloadFailed {
                    url: reference.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        // Decoding and resampling are CPU-bound.
        let owned = reference.to_string();
        let (max_width, quality) = (self.max_width, self.jpeg_quality);
        tokio::task::spawn_blocking(move || normalize_image(&owned, &bytes, max_width, quality))
            .await
            .map_err(|e| ImageError::EncodeFailed {
                url: reference.to_string(),
                detail: format!("normalise task panicked: {}", e),
            })?
    }
}

static DRIVE_ID_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"id=([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").unwrap(),
    ]
});

/// Split a comma-separated image cell into trimmed, non-empty references.
pub fn parse_image_urls(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract the file id from a Google Drive link.
pub fn drive_file_id(url: &str) -> Option<&str> {
    DRIVE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Direct-download URL for a Drive file id.
pub fn direct_download_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={}", file_id)
}

/// Turn a record's image reference into the URL to GET.
pub fn resolve_download_url(reference: &str) -> Result<String, ImageError> {
    let reference = reference.trim();
    if !(reference.starts_with("http://") || reference.starts_with("https://")) {
        return Err(ImageError::InvalidReference {
            reference: reference.to_string(),
        });
    }
    if reference.contains("drive.google.com") {
        return drive_file_id(reference)
            .map(direct_download_url)
            .ok_or_else(|| ImageError::DriveIdMissing {
                url: reference.to_string(),
            });
    }
    Ok(reference.to_string())
}

/// Decode, flatten, downscale and JPEG-encode raw image bytes.
pub fn normalize_image(
    url: &str,
    bytes: &[u8],
    max_width: u32,
    jpeg_quality: u8,
) -> Result<EncodedImage, ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::NotAnImage {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    let mut rgb = flatten_onto_white(&img);
    if rgb.width() > max_width {
        let new_height =
            ((rgb.height() as u64 * max_width as u64) / rgb.width() as u64).max(1) as u32;
        debug!(
            "Downscaling {} from {}x{} to {}x{}",
            url,
            rgb.width(),
            rgb.height(),
            max_width,
            new_height
        );
        rgb = image::imageops::resize(&rgb, max_width, new_height, FilterType::Lanczos3);
    }

    let (width, height) = rgb.dimensions();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| ImageError::EncodeFailed {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

    Ok(EncodedImage {
        url: url.to_string(),
        bytes: buf,
        width,
        height,
    })
}

/// Composite over a white background; opaque images are converted directly.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
