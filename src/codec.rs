//! Codec collaborator: decoding, probing, and transcoding image bytes.
//!
//! The pipeline core never touches pixels. Everything pixel-shaped goes
//! through the [`Codec`] trait so phases stay backend-agnostic and tests can
//! run against a mock. The production implementation is [`ImageCodec`] -
//! pure Rust over the `image` crate, no system dependencies.
//!
//! Error semantics matter here: a **decode** failure means the input bytes
//! are not a usable image, which the pipeline treats as a rejection (bad
//! data is expected in large scraped collections). An **encode** failure
//! means our own output path broke, which is an item failure.

use crate::config::OutputFormat;
use crate::types::ImageAttributes;
use image::ImageReader;
use image::codecs::{jpeg::JpegEncoder, png::PngEncoder, webp::WebPEncoder};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Conversion parameters handed to [`Codec::transcode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSpec {
    pub format: OutputFormat,
    /// Passed through to the encoder unchanged; the core does not
    /// reinterpret quality values.
    pub quality: u32,
    pub resize_if_larger: bool,
    pub max_dimensions: [u32; 2],
}

/// Pixel-level operations the pipeline delegates.
pub trait Codec: Sync {
    /// Read dimensions and format without a full pixel decode.
    fn probe(&self, bytes: &[u8]) -> Result<ImageAttributes, CodecError>;

    /// Decode, optionally downscale, and re-encode per `spec`.
    fn transcode(&self, bytes: &[u8], spec: &ConvertSpec) -> Result<Vec<u8>, CodecError>;
}

/// Production codec over the `image` crate.
#[derive(Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageCodec {
    fn probe(&self, bytes: &[u8]) -> Result<ImageAttributes, CodecError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| CodecError::Decode("unrecognized image format".into()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(ImageAttributes {
            width,
            height,
            // "image/jpeg" -> "jpeg"
            format: format
                .to_mime_type()
                .trim_start_matches("image/")
                .to_string(),
            size_bytes: bytes.len() as u64,
        })
    }

    fn transcode(&self, bytes: &[u8], spec: &ConvertSpec) -> Result<Vec<u8>, CodecError> {
        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let [max_w, max_h] = spec.max_dimensions;
        let img = if spec.resize_if_larger && (decoded.width() > max_w || decoded.height() > max_h)
        {
            // Fit within the bounds, preserving aspect ratio.
            decoded.resize(max_w, max_h, image::imageops::FilterType::Lanczos3)
        } else {
            decoded
        };

        let mut out = Vec::new();
        match spec.format {
            OutputFormat::Jpeg => {
                let quality = spec.quality.clamp(1, 100) as u8;
                let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
                img.to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new(Cursor::new(&mut out));
                img.write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            OutputFormat::Webp => {
                let encoder = WebPEncoder::new_lossless(Cursor::new(&mut out));
                img.to_rgba8()
                    .write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
        }
        Ok(out)
    }
}
