//! Image encoding: `RgbaImage` → encoded artifact bytes.
//!
//! The two published page images are the durable record of what the host
//! signed, so they are encoded at maximum quality: PNG with the best
//! compression setting (lossless), or JPEG at the configured quality when the
//! persistence side wants smaller files. [`EncodedImage::data_uri`] wraps the
//! bytes the way browser-side collaborators expect them.

use crate::config::ArtifactFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// An encoded raster artifact.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Encode `img` in `format` at maximum quality.
pub fn encode_artifact(
    img: &RgbaImage,
    format: ArtifactFormat,
) -> Result<EncodedImage, image::ImageError> {
    let (width, height) = img.dimensions();
    let mut buf = Vec::new();

    match format {
        ArtifactFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
            encoder.write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        ArtifactFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
    }

    debug!(
        "Encoded {}x{} artifact → {} bytes {}",
        width,
        height,
        buf.len(),
        format.mime_type()
    );

    Ok(EncodedImage {
        width,
        height,
        mime_type: format.mime_type(),
        bytes: buf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(40, 30, |x, y| Rgba([(x * 6) as u8, (y * 8) as u8, 128, 255]))
    }

    #[test]
    fn png_is_lossless() {
        let img = sample();
        let enc = encode_artifact(&img, ArtifactFormat::Png).expect("encode should succeed");
        assert_eq!(enc.mime_type, "image/png");
        assert_eq!((enc.width, enc.height), (40, 30));
        let decoded = image::load_from_memory(&enc.bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_decodes_to_same_size() {
        let enc = encode_artifact(&sample(), ArtifactFormat::Jpeg { quality: 100 }).unwrap();
        assert_eq!(enc.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&enc.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn data_uri_is_valid_base64() {
        let enc = encode_artifact(&sample(), ArtifactFormat::Png).unwrap();
        let uri = enc.data_uri();
        let payload = uri.strip_prefix("data:image/png;base64,").expect("prefix");
        assert_eq!(STANDARD.decode(payload).unwrap(), enc.bytes);
    }
}
