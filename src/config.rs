//! Configuration types for a signing session.
//!
//! All session behaviour is controlled through [`SigningConfig`], built via
//! its [`SigningConfigBuilder`]. Every knob that the capture pipeline depends
//! on lives here so two runs can be diffed by their config alone.

use crate::error::SigningError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed wait between resetting the scroll position and capturing, in ms.
///
/// Covers the gap between binding the signature into the contract and the
/// signature region being painted, on surfaces that cannot report layout
/// completion themselves.
pub const LAYOUT_SETTLE_DELAY_MS: u64 = 500;

/// Snapshots shorter than this (in snapshot pixels) are rejected by the splitter.
pub const MINIMUM_CAPTURE_HEIGHT: u32 = 500;

/// Configuration for one signing session.
///
/// Built via [`SigningConfig::builder()`] or using [`SigningConfig::default()`].
///
/// # Example
/// ```rust
/// use contract_sign::{PageSize, SigningConfig};
///
/// let config = SigningConfig::builder()
///     .scale_factor(2)
///     .page_size(PageSize::LETTER)
///     .settle_delay_ms(250)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Pixel density of the snapshot relative to layout units. Range: 1–4. Default: 2.
    ///
    /// The published page images are a compliance artifact, so they are
    /// captured at twice the layout resolution by default to keep small
    /// print legible.
    pub scale_factor: u32,

    /// How the pipeline waits for layout before capturing. Default: fixed delay.
    pub settle: SettleStrategy,

    /// Settle delay in milliseconds. Default: [`LAYOUT_SETTLE_DELAY_MS`].
    ///
    /// With [`SettleStrategy::LayoutSignal`] this is the upper bound on the
    /// wait rather than a fixed sleep.
    pub settle_delay_ms: u64,

    /// Minimum snapshot height accepted by the splitter. Default: [`MINIMUM_CAPTURE_HEIGHT`].
    pub minimum_capture_height: u32,

    /// Upper bound on snapshot pixels (width × height). Default: 40 000 000.
    pub max_snapshot_pixels: u64,

    /// Page format of the downloadable PDF. Default: A4.
    pub page_size: PageSize,

    /// Encoding of the two published page images. Default: PNG.
    pub artifact_format: ArtifactFormat,

    /// Contract layout width in layout units. Default: 794 (A4 at 96 DPI).
    pub document_width: u32,

    /// Height of the scrollable viewport in layout units. Default: 600.
    pub viewport_height: u32,

    /// Distance from the bottom that still counts as "read to the end". Default: 10.
    pub scroll_end_tolerance: u32,

    /// Signature pad canvas width in pixels. Default: 500.
    pub signature_pad_width: u32,

    /// Signature pad canvas height in pixels. Default: 200.
    pub signature_pad_height: u32,

    /// Pen diameter in pixels. Default: 3.0.
    pub stroke_width: f32,

    /// TrueType/OpenType font for contract text. If None, text is greeked.
    pub font_path: Option<PathBuf>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            scale_factor: 2,
            settle: SettleStrategy::default(),
            settle_delay_ms: LAYOUT_SETTLE_DELAY_MS,
            minimum_capture_height: MINIMUM_CAPTURE_HEIGHT,
            max_snapshot_pixels: 40_000_000,
            page_size: PageSize::A4,
            artifact_format: ArtifactFormat::default(),
            document_width: 794,
            viewport_height: 600,
            scroll_end_tolerance: 10,
            signature_pad_width: 500,
            signature_pad_height: 200,
            stroke_width: 3.0,
            font_path: None,
        }
    }
}

impl SigningConfig {
    /// Create a new builder for `SigningConfig`.
    pub fn builder() -> SigningConfigBuilder {
        SigningConfigBuilder {
            config: Self::default(),
        }
    }

    /// The settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Builder for [`SigningConfig`].
#[derive(Debug)]
pub struct SigningConfigBuilder {
    config: SigningConfig,
}

impl SigningConfigBuilder {
    pub fn scale_factor(mut self, scale: u32) -> Self {
        self.config.scale_factor = scale.clamp(1, 4);
        self
    }

    pub fn settle(mut self, strategy: SettleStrategy) -> Self {
        self.config.settle = strategy;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn minimum_capture_height(mut self, px: u32) -> Self {
        self.config.minimum_capture_height = px;
        self
    }

    pub fn max_snapshot_pixels(mut self, px: u64) -> Self {
        self.config.max_snapshot_pixels = px;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn artifact_format(mut self, format: ArtifactFormat) -> Self {
        self.config.artifact_format = format;
        self
    }

    pub fn document_width(mut self, width: u32) -> Self {
        self.config.document_width = width;
        self
    }

    pub fn viewport_height(mut self, height: u32) -> Self {
        self.config.viewport_height = height;
        self
    }

    pub fn scroll_end_tolerance(mut self, px: u32) -> Self {
        self.config.scroll_end_tolerance = px;
        self
    }

    pub fn signature_pad_size(mut self, width: u32, height: u32) -> Self {
        self.config.signature_pad_width = width;
        self.config.signature_pad_height = height;
        self
    }

    pub fn stroke_width(mut self, width: f32) -> Self {
        self.config.stroke_width = width;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SigningConfig, SigningError> {
        let c = &self.config;
        if c.scale_factor == 0 {
            return Err(SigningError::InvalidConfig(
                "Scale factor must be ≥ 1".into(),
            ));
        }
        if c.document_width == 0 || c.viewport_height == 0 {
            return Err(SigningError::InvalidConfig(format!(
                "Document width and viewport height must be positive, got {}x{}",
                c.document_width, c.viewport_height
            )));
        }
        if !c.page_size.is_valid() {
            return Err(SigningError::InvalidConfig(format!(
                "Page edges must be {}–{} pt, got {}x{} pt",
                PageSize::MIN_EDGE,
                PageSize::MAX_EDGE,
                c.page_size.width,
                c.page_size.height
            )));
        }
        if let ArtifactFormat::Jpeg { quality } = c.artifact_format {
            if !(1..=100).contains(&quality) {
                return Err(SigningError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        if c.signature_pad_width == 0 || c.signature_pad_height == 0 {
            return Err(SigningError::InvalidConfig(
                "Signature pad must have a non-zero size".into(),
            ));
        }
        if !(c.stroke_width > 0.0) {
            return Err(SigningError::InvalidConfig(format!(
                "Stroke width must be positive, got {}",
                c.stroke_width
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the capture pipeline waits for the signature region to be painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettleStrategy {
    /// Sleep for `settle_delay_ms`. (default)
    #[default]
    FixedDelay,
    /// Poll the surface's layout-stable signal, giving up after `settle_delay_ms`.
    LayoutSignal,
}

/// Encoding used for the two published page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArtifactFormat {
    /// Lossless PNG at best compression. (default)
    #[default]
    Png,
    /// JPEG at the given quality (1–100).
    Jpeg { quality: u8 },
}

impl ArtifactFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "image/png",
            ArtifactFormat::Jpeg { .. } => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// A PDF page format in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// ISO A4, 210 × 297 mm.
    pub const A4: PageSize = PageSize {
        width: 595.28,
        height: 841.89,
    };

    /// US Letter, 8.5 × 11 in.
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    /// Smallest accepted page edge, in points.
    pub const MIN_EDGE: f64 = 1.0;

    /// Largest accepted page edge, in points (the PDF 1.4 page limit).
    pub const MAX_EDGE: f64 = 14_400.0;

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both edges are finite and within [`MIN_EDGE`](Self::MIN_EDGE)..=[`MAX_EDGE`](Self::MAX_EDGE).
    pub fn is_valid(&self) -> bool {
        let edges = Self::MIN_EDGE..=Self::MAX_EDGE;
        edges.contains(&self.width) && edges.contains(&self.height)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::A4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let c = SigningConfig::default();
        assert_eq!(c.scale_factor, 2);
        assert_eq!(c.settle_delay(), Duration::from_millis(500));
        assert_eq!(c.minimum_capture_height, 500);
        assert_eq!(c.page_size, PageSize::A4);
        assert_eq!(c.artifact_format, ArtifactFormat::Png);
    }

    #[test]
    fn scale_factor_is_clamped() {
        let c = SigningConfig::builder().scale_factor(9).build().unwrap();
        assert_eq!(c.scale_factor, 4);
        let c = SigningConfig::builder().scale_factor(0).build().unwrap();
        assert_eq!(c.scale_factor, 1);
    }

    #[test]
    fn rejects_bad_jpeg_quality() {
        let err = SigningConfig::builder()
            .artifact_format(ArtifactFormat::Jpeg { quality: 0 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
    }

    #[test]
    fn rejects_degenerate_page_size() {
        let err = SigningConfig::builder()
            .page_size(PageSize::new(595.0, 0.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unbounded_page_size() {
        for size in [
            PageSize::new(f64::INFINITY, 842.0),
            PageSize::new(595.0, f64::NAN),
            PageSize::new(595.0, 1e-300),
            PageSize::new(1e9, 842.0),
        ] {
            let err = SigningConfig::builder().page_size(size).build().unwrap_err();
            assert!(matches!(err, SigningError::InvalidConfig(_)), "accepted {size:?}");
        }
        assert!(PageSize::LETTER.is_valid());
    }

    #[test]
    fn rejects_zero_stroke() {
        assert!(SigningConfig::builder().stroke_width(0.0).build().is_err());
    }
}
