//! Two-way split of a snapshot into the published page images.
//!
//! The split is a pure function of the snapshot: the top half takes rows
//! `[0, split_point)`, the bottom half takes `[split_point, height)`, with
//! `split_point = round(height / 2)`. Every row lands in exactly one half,
//! both halves keep the full width, and splitting the same snapshot twice
//! produces byte-identical encodings.

use crate::config::SigningConfig;
use crate::error::SplitFailure;
use crate::pipeline::encode::{encode_artifact, EncodedImage};
use crate::pipeline::rasterize::RasterSnapshot;
use image::imageops;
use serde::Serialize;
use tracing::{debug, info};

/// The two published halves of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitResult {
    pub split_point: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub top: EncodedImage,
    pub bottom: EncodedImage,
}

impl SplitResult {
    /// Hand the halves over in page order.
    pub fn into_pages(self) -> [EncodedImage; 2] {
        [self.top, self.bottom]
    }
}

/// Row at which the bottom half starts: `height / 2`, rounding halves up.
pub fn split_point(height: u32) -> u32 {
    height / 2 + height % 2
}

/// Split `snapshot` into two independently encoded halves.
pub fn split(snapshot: &RasterSnapshot, config: &SigningConfig) -> Result<SplitResult, SplitFailure> {
    let (width, height) = (snapshot.width(), snapshot.height());
    if height < config.minimum_capture_height {
        return Err(SplitFailure::TooSmall {
            height,
            minimum: config.minimum_capture_height,
        });
    }

    let at = split_point(height);
    debug!("Splitting {}x{} snapshot at row {}", width, height, at);

    let top = encode_half(snapshot, "top", 0, at, config)?;
    let bottom = encode_half(snapshot, "bottom", at, height - at, config)?;

    info!(
        "Split snapshot into {}x{} ({} bytes) + {}x{} ({} bytes)",
        top.width,
        top.height,
        top.len(),
        bottom.width,
        bottom.height,
        bottom.len()
    );

    Ok(SplitResult {
        split_point: at,
        source_width: width,
        source_height: height,
        top,
        bottom,
    })
}

/// Crop rows `[y, y + rows)` at full width and encode them.
fn encode_half(
    snapshot: &RasterSnapshot,
    half: &str,
    y: u32,
    rows: u32,
    config: &SigningConfig,
) -> Result<EncodedImage, SplitFailure> {
    let width = snapshot.width();
    if width == 0 || rows == 0 {
        return Err(SplitFailure::EmptyCrop {
            half: half.to_string(),
            width,
            height: rows,
        });
    }

    let crop = imageops::crop_imm(snapshot.pixels(), 0, y, width, rows).to_image();
    let image = encode_artifact(&crop, config.artifact_format).map_err(|e| SplitFailure::Encoding {
        half: half.to_string(),
        detail: e.to_string(),
    })?;
    if image.is_empty() {
        return Err(SplitFailure::Encoding {
            half: half.to_string(),
            detail: "encoder produced an empty payload".to_string(),
        });
    }
    Ok(image)
}
