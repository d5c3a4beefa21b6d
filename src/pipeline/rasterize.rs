//! Rasterisation: snapshot a laid-out render surface into one pixel buffer.
//!
//! ## Why settle before capturing?
//!
//! The signature region only exists after the user signs, so its layout and
//! paint happen right before the capture is requested. Capturing a surface
//! whose last layout pass has not landed yields a snapshot without the
//! signature. [`settle`] resets the scroll position, forces a synchronous
//! reflow and then either waits for the surface's own layout-stable signal
//! or, on surfaces that have none, sleeps for the configured settle delay.
//! [`capture`] re-checks the measured size as a second line of defence.

use crate::config::{SettleStrategy, SigningConfig};
use crate::error::CaptureFailure;
use image::RgbaImage;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

/// Poll interval for [`SettleStrategy::LayoutSignal`].
const LAYOUT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Something that can be scrolled, laid out and painted in full.
pub trait RenderSurface {
    /// Reset the viewport to the top of the content.
    fn scroll_to_top(&mut self);

    /// Run a layout pass now.
    fn reflow(&mut self);

    /// Whether the last layout pass has been painted. Surfaces without a
    /// signal report true.
    fn is_layout_stable(&self) -> bool {
        true
    }

    /// Content root size in layout units; (0, 0) before the first layout.
    fn content_size(&self) -> (u32, u32);

    /// Paint the whole content (not just the viewport) at `scale` pixels per unit.
    fn paint(&self, scale: u32) -> Result<RgbaImage, String>;
}

/// An immutable pixel buffer captured from a render surface.
///
/// Cloning is cheap; the pixels are shared.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    pixels: Arc<RgbaImage>,
    scale: u32,
}

impl RasterSnapshot {
    pub fn new(pixels: RgbaImage, scale: u32) -> Self {
        Self {
            pixels: Arc::new(pixels),
            scale: scale.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Bring the surface into a capturable state: top of document, fresh layout, settled paint.
pub async fn settle<S: RenderSurface + ?Sized>(surface: &mut S, config: &SigningConfig) {
    surface.scroll_to_top();
    surface.reflow();

    let delay = config.settle_delay();
    match config.settle {
        SettleStrategy::FixedDelay => {
            debug!("Settling for {}ms before capture", delay.as_millis());
            sleep(delay).await;
        }
        SettleStrategy::LayoutSignal => {
            let deadline = Instant::now() + delay;
            while !surface.is_layout_stable() {
                if Instant::now() >= deadline {
                    warn!(
                        "Layout not stable after {}ms; capturing anyway",
                        delay.as_millis()
                    );
                    break;
                }
                sleep(LAYOUT_POLL_INTERVAL).await;
            }
        }
    }
}

/// Snapshot the full content of `surface` at the configured scale.
pub fn capture<S: RenderSurface + ?Sized>(
    surface: &S,
    config: &SigningConfig,
) -> Result<RasterSnapshot, CaptureFailure> {
    let (width, height) = surface.content_size();
    if width == 0 || height == 0 {
        return Err(CaptureFailure::NotLaidOut { width, height });
    }

    let scale = config.scale_factor.max(1);
    let expected_width = width.saturating_mul(scale);
    let expected_height = height.saturating_mul(scale);
    if expected_width as u64 * expected_height as u64 > config.max_snapshot_pixels {
        return Err(CaptureFailure::TooLarge {
            width: expected_width,
            height: expected_height,
            limit: config.max_snapshot_pixels,
        });
    }

    let pixels = surface.paint(scale).map_err(CaptureFailure::Surface)?;
    if pixels.dimensions() != (expected_width, expected_height) {
        return Err(CaptureFailure::DimensionMismatch {
            expected_width,
            expected_height,
            actual_width: pixels.width(),
            actual_height: pixels.height(),
        });
    }

    info!(
        "Captured {}x{} px snapshot at {}x",
        expected_width, expected_height, scale
    );
    Ok(RasterSnapshot::new(pixels, scale))
}
