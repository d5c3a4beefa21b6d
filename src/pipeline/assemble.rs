//! Multi-page PDF assembly from one tall snapshot.
//!
//! The snapshot is scaled to the page width and laid over as many fixed-size
//! pages as its scaled height needs. Every page draws the *same* image XObject,
//! shifted up by the height already placed on earlier pages; the page's
//! MediaBox clips the rest. The image is embedded once and referenced from
//! every page, so file size does not grow with the page count.
//!
//! This transform is independent of the two-way split: it reads the same
//! immutable snapshot and never touches the published halves.

use crate::config::PageSize;
use crate::error::AssemblyFailure;
use crate::pipeline::rasterize::RasterSnapshot;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

/// Remaining heights below this (in points) are float noise, not content.
const HEIGHT_EPSILON: f64 = 1e-6;

/// Name of the shared image resource on every page.
const IMAGE_NAME: &str = "Im0";

/// One page of the assembled document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PdfPage {
    pub index: usize,
    /// Vertical position of the image top relative to the page top, in points. Zero or negative.
    pub offset: f64,
}

/// A tiled multi-page PDF.
#[derive(Clone, Serialize)]
pub struct PdfDocument {
    pub page_size: PageSize,
    pub scaled_image_height: f64,
    pub pages: Vec<PdfPage>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_size", &self.page_size)
            .field("scaled_image_height", &self.scaled_image_height)
            .field("pages", &self.pages.len())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl PdfDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Height of a `width`×`height` image once scaled to `page_width`.
pub fn scaled_height(width: u32, height: u32, page_width: f64) -> f64 {
    height as f64 * page_width / width as f64
}

/// Per-page image offsets for an image of `scaled` points over pages of `page_height`.
///
/// Page 1 sits at offset 0; each further page is added while unplaced height
/// remains and shifts the image up by everything placed so far.
pub fn tile_offsets(scaled: f64, page_height: f64) -> Vec<f64> {
    let mut offsets = vec![0.0];
    let mut placed = page_height;
    let mut height_left = scaled - page_height;
    while height_left > HEIGHT_EPSILON {
        offsets.push(-placed);
        placed += page_height;
        height_left -= page_height;
    }
    offsets
}

/// Tile `snapshot` across pages of `page_size`.
pub fn assemble(snapshot: &RasterSnapshot, page_size: PageSize) -> Result<PdfDocument, AssemblyFailure> {
    let (width, height) = (snapshot.width(), snapshot.height());
    if width == 0 || height == 0 {
        return Err(AssemblyFailure::EmptySnapshot { width, height });
    }
    if !page_size.is_valid() {
        return Err(AssemblyFailure::InvalidPageSize {
            width: page_size.width.to_string(),
            height: page_size.height.to_string(),
        });
    }

    let scaled = scaled_height(width, height, page_size.width);
    let offsets = tile_offsets(scaled, page_size.height);
    debug!(
        "Tiling {}x{} px snapshot as {:.2} pt over {} page(s)",
        width,
        height,
        scaled,
        offsets.len()
    );

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    // PDF images have no alpha here; the snapshot is painted on opaque paper.
    let rgb = DynamicImage::ImageRgba8(snapshot.pixels().clone()).to_rgb8();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            IMAGE_NAME => image_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(offsets.len());
    let mut pages = Vec::with_capacity(offsets.len());
    for (index, &offset) in offsets.iter().enumerate() {
        // PDF space is bottom-up: the image's lower edge sits `offset + scaled` below the page top.
        let y = page_size.height - (offset + scaled);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (page_size.width as f32).into(),
                        0.into(),
                        0.into(),
                        (scaled as f32).into(),
                        0.into(),
                        (y as f32).into(),
                    ],
                ),
                Operation::new("Do", vec![IMAGE_NAME.into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| AssemblyFailure::Encoding(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
        pages.push(PdfPage { index, offset });
    }

    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (page_size.width as f32).into(),
                (page_size.height as f32).into(),
            ],
        },
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("contract-sign"),
    });
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AssemblyFailure::Encoding(e.to_string()))?;

    info!("Assembled {}-page PDF ({} bytes)", pages.len(), bytes.len());
    Ok(PdfDocument {
        page_size,
        scaled_image_height: scaled,
        pages,
        bytes,
    })
}

static RE_FILENAME_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// File name offered for download: `Contract_<Counterparty_Name>.pdf`.
pub fn download_filename(counterparty: &str) -> String {
    let slug = RE_FILENAME_UNSAFE.replace_all(counterparty.trim(), "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "Contract.pdf".to_string()
    } else {
        format!("Contract_{slug}.pdf")
    }
}
