//! The contract document: layout, viewport and paint.
//!
//! [`ContractRenderer`] lays the contract out as one tall column in layout
//! units (CSS-pixel-like). Layout is synchronous and runs whenever an input
//! changes, so the content size is always current by the time anything asks
//! for it. Painting renders the full column, not only the viewport.

use crate::config::SigningConfig;
use crate::error::SigningError;
use crate::pipeline::rasterize::RenderSurface;
use crate::render::scroll::{ScrollState, ScrollSubscription, ScrollTracker};
use crate::render::text::TextPainter;
use chrono::NaiveDate;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MARGIN: f32 = 48.0;
const TITLE_SIZE: f32 = 24.0;
const SECTION_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;
const LINE_SPACING: f32 = 1.5;
const PARAGRAPH_GAP: f32 = 12.0;
const SECTION_GAP: f32 = 24.0;
const SIGNATURE_MAX_HEIGHT: f32 = 120.0;
const STAMP_SIZE: f32 = 18.0;
const STAMP_PADDING: f32 = 6.0;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT: Rgba<u8> = Rgba([31, 41, 55, 255]);
const MUTED: Rgba<u8> = Rgba([107, 114, 128, 255]);
const RULE: Rgba<u8> = Rgba([209, 213, 219, 255]);
const STAMP: Rgba<u8> = Rgba([22, 163, 74, 255]);

/// One numbered clause of the contract body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub heading: String,
    pub body: String,
}

/// Everything the contract shows about the agreement and the counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub title: String,
    /// The platform side of the agreement.
    pub provider_name: String,
    /// The host signing the agreement.
    pub counterparty_name: String,
    pub counterparty_email: String,
    #[serde(default)]
    pub counterparty_phone: Option<String>,
    pub effective_date: NaiveDate,
    pub clauses: Vec<Clause>,
}

impl ContractMetadata {
    /// A standard host agreement for `name`.
    pub fn host_agreement(
        provider: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        effective_date: NaiveDate,
    ) -> Self {
        let clause = |heading: &str, body: &str| Clause {
            heading: heading.to_string(),
            body: body.to_string(),
        };
        Self {
            title: "Host Services Agreement".to_string(),
            provider_name: provider.into(),
            counterparty_name: name.into(),
            counterparty_email: email.into(),
            counterparty_phone: None,
            effective_date,
            clauses: vec![
                clause(
                    "Scope",
                    "The host lists accommodation on the platform and accepts bookings made \
                     through it. The platform provides the booking, messaging and payment \
                     services described in this agreement.",
                ),
                clause(
                    "Listings",
                    "The host keeps every listing accurate and current, including availability, \
                     pricing, house rules and any fees charged on arrival. Listings that are \
                     misleading may be suspended without notice.",
                ),
                clause(
                    "Bookings and Cancellations",
                    "Confirmed bookings are binding on the host. Cancellations by the host are \
                     permitted only under the cancellation policy shown on the listing at the \
                     time of booking, and may incur the penalties set out in that policy.",
                ),
                clause(
                    "Payments",
                    "Guest payments are collected by the platform and paid out to the host after \
                     check-in, less the service fee. Payout timing depends on the payout method \
                     registered in the host profile.",
                ),
                clause(
                    "Standards of Care",
                    "The host maintains the property in a safe, clean and habitable condition and \
                     complies with all local laws, permits and tax obligations that apply to \
                     short-term rentals.",
                ),
                clause(
                    "Liability",
                    "Each party is responsible for its own acts and omissions. Nothing in this \
                     agreement limits liability that cannot be limited by law.",
                ),
                clause(
                    "Term and Termination",
                    "This agreement starts on the effective date and continues until terminated by \
                     either party with thirty days written notice. Obligations for bookings made \
                     before termination survive it.",
                ),
            ],
        }
    }
}

/// A signature slot or stamp position, in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
struct TextLine {
    text: String,
    x: f32,
    y: f32,
    size: f32,
    color: Rgba<u8>,
}

#[derive(Debug, Clone, Default)]
struct Layout {
    lines: Vec<TextLine>,
    rules: Vec<Region>,
    signature: Option<Region>,
    stamp: Option<Region>,
    height: u32,
}

/// Lays out, scrolls and paints one contract.
#[derive(Debug)]
pub struct ContractRenderer {
    metadata: ContractMetadata,
    painter: TextPainter,
    width: u32,
    viewport_height: u32,
    scroll_offset: u32,
    signature: Option<RgbaImage>,
    layout: Layout,
    generation: u64,
    tracker: ScrollTracker,
}

impl ContractRenderer {
    /// Build a renderer for `metadata`, loading the configured font if any.
    pub fn new(metadata: ContractMetadata, config: &SigningConfig) -> Result<Self, SigningError> {
        let painter = TextPainter::load(config.font_path.as_deref())?;
        Ok(Self::with_painter(metadata, config, painter))
    }

    pub fn with_painter(
        metadata: ContractMetadata,
        config: &SigningConfig,
        painter: TextPainter,
    ) -> Self {
        let mut renderer = Self {
            metadata,
            painter,
            width: config.document_width,
            viewport_height: config.viewport_height,
            scroll_offset: 0,
            signature: None,
            layout: Layout::default(),
            generation: 0,
            tracker: ScrollTracker::new(config.scroll_end_tolerance),
        };
        renderer.reflow();
        renderer
    }

    pub fn metadata(&self) -> &ContractMetadata {
        &self.metadata
    }

    // ── Signature binding ────────────────────────────────────────────────

    /// Bind or unbind the signature image; re-lays out before returning.
    pub fn set_signature(&mut self, signature: Option<RgbaImage>) {
        let was_bound = self.signature.is_some();
        self.signature = signature;
        if was_bound != self.signature.is_some() {
            debug!(
                "Signature {}",
                if was_bound { "unbound" } else { "bound" }
            );
        }
        self.reflow();
    }

    pub fn has_signature(&self) -> bool {
        self.signature.is_some()
    }

    /// Where the signature image is drawn, when one is bound.
    pub fn signature_region(&self) -> Option<Region> {
        self.layout.signature
    }

    /// Where the "SIGNED" stamp is drawn, when a signature is bound.
    pub fn stamp_region(&self) -> Option<Region> {
        self.layout.stamp
    }

    /// Incremented on every layout pass.
    pub fn layout_generation(&self) -> u64 {
        self.generation
    }

    // ── Viewport ─────────────────────────────────────────────────────────

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    pub fn max_scroll_offset(&self) -> u32 {
        self.layout.height.saturating_sub(self.viewport_height)
    }

    /// Scroll to `offset`, clamped to the content.
    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll_offset = offset.min(self.max_scroll_offset());
        self.tracker
            .observe(self.scroll_offset, self.viewport_height, self.layout.height);
    }

    /// Scroll by `delta` layout units; negative scrolls up.
    pub fn scroll_by(&mut self, delta: i64) {
        let target = (self.scroll_offset as i64 + delta).max(0);
        self.scroll_to(u32::try_from(target).unwrap_or(u32::MAX));
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.tracker.state()
    }

    /// Subscribe to scroll-completion; closed when the renderer is dropped.
    pub fn subscribe_scroll_end(&self) -> ScrollSubscription {
        self.tracker.subscribe()
    }

    // ── Layout ───────────────────────────────────────────────────────────

    fn layout_pass(&self) -> Layout {
        let meta = &self.metadata;
        let content_width = (self.width as f32 - 2.0 * MARGIN).max(1.0);
        let mut out = Layout::default();
        let mut y = MARGIN;

        let para = |out: &mut Layout, y: &mut f32, text: &str, size: f32, color: Rgba<u8>| {
            for line in self.painter.wrap(text, size, content_width) {
                out.lines.push(TextLine {
                    text: line,
                    x: MARGIN,
                    y: *y,
                    size,
                    color,
                });
                *y += size * LINE_SPACING;
            }
        };

        para(&mut out, &mut y, &meta.title, TITLE_SIZE, TEXT);
        para(
            &mut out,
            &mut y,
            &format!("Effective {}", meta.effective_date.format("%B %-d, %Y")),
            BODY_SIZE,
            MUTED,
        );
        y += PARAGRAPH_GAP;
        out.rules.push(Region {
            x: MARGIN,
            y,
            width: content_width,
            height: 1.0,
        });
        y += SECTION_GAP;

        para(&mut out, &mut y, "Parties", SECTION_SIZE, TEXT);
        para(
            &mut out,
            &mut y,
            &format!("Provider: {}", meta.provider_name),
            BODY_SIZE,
            TEXT,
        );
        para(
            &mut out,
            &mut y,
            &format!("Host: {}", meta.counterparty_name),
            BODY_SIZE,
            TEXT,
        );
        para(
            &mut out,
            &mut y,
            &format!("Email: {}", meta.counterparty_email),
            BODY_SIZE,
            TEXT,
        );
        if let Some(ref phone) = meta.counterparty_phone {
            para(&mut out, &mut y, &format!("Phone: {phone}"), BODY_SIZE, TEXT);
        }
        y += SECTION_GAP;

        for (i, clause) in meta.clauses.iter().enumerate() {
            para(
                &mut out,
                &mut y,
                &format!("{}. {}", i + 1, clause.heading),
                HEADING_SIZE,
                TEXT,
            );
            para(&mut out, &mut y, &clause.body, BODY_SIZE, TEXT);
            y += PARAGRAPH_GAP;
        }

        y += SECTION_GAP - PARAGRAPH_GAP;
        out.rules.push(Region {
            x: MARGIN,
            y,
            width: content_width,
            height: 1.0,
        });
        y += SECTION_GAP;
        para(&mut out, &mut y, "Signature", SECTION_SIZE, TEXT);

        match &self.signature {
            Some(sig) if sig.width() > 0 && sig.height() > 0 => {
                let aspect = sig.height() as f32 / sig.width() as f32;
                let mut width = (sig.width() as f32).min(content_width);
                let mut height = width * aspect;
                if height > SIGNATURE_MAX_HEIGHT {
                    height = SIGNATURE_MAX_HEIGHT;
                    width = height / aspect;
                }
                out.signature = Some(Region {
                    x: MARGIN,
                    y,
                    width,
                    height,
                });
                y += height + PARAGRAPH_GAP;

                let stamp_width =
                    self.painter.measure("SIGNED", STAMP_SIZE) + 2.0 * STAMP_PADDING;
                let stamp_height = STAMP_SIZE * LINE_SPACING + STAMP_PADDING;
                out.stamp = Some(Region {
                    x: MARGIN,
                    y,
                    width: stamp_width,
                    height: stamp_height,
                });
                out.lines.push(TextLine {
                    text: "SIGNED".to_string(),
                    x: MARGIN + STAMP_PADDING,
                    y: y + STAMP_PADDING / 2.0,
                    size: STAMP_SIZE,
                    color: STAMP,
                });
                y += stamp_height + PARAGRAPH_GAP;
                para(
                    &mut out,
                    &mut y,
                    &format!(
                        "Signed electronically by {} on {}",
                        meta.counterparty_name,
                        meta.effective_date.format("%Y-%m-%d")
                    ),
                    BODY_SIZE,
                    MUTED,
                );
            }
            _ => {
                y += SIGNATURE_MAX_HEIGHT / 2.0;
                out.rules.push(Region {
                    x: MARGIN,
                    y,
                    width: content_width / 2.0,
                    height: 1.0,
                });
                y += PARAGRAPH_GAP;
                para(&mut out, &mut y, "Awaiting signature", BODY_SIZE, MUTED);
            }
        }

        out.height = (y + MARGIN).ceil() as u32;
        out
    }

    fn paint_full(&self, width: u32, height: u32, scale: u32) -> RgbaImage {
        let s = scale as f32;
        let mut canvas = RgbaImage::from_pixel(width, height, PAPER);

        for rule in &self.layout.rules {
            draw_filled_rect_mut(&mut canvas, scaled_rect(rule, s), RULE);
        }

        if let (Some(region), Some(sig)) = (self.layout.signature, &self.signature) {
            let w = ((region.width * s).round() as u32).max(1);
            let h = ((region.height * s).round() as u32).max(1);
            let resized = imageops::resize(sig, w, h, FilterType::Lanczos3);
            imageops::overlay(
                &mut canvas,
                &resized,
                (region.x * s).round() as i64,
                (region.y * s).round() as i64,
            );
        }

        if let Some(stamp) = self.layout.stamp {
            let outer = scaled_rect(&stamp, s);
            draw_hollow_rect_mut(&mut canvas, outer, STAMP);
            if outer.width() > 2 && outer.height() > 2 {
                let inner = Rect::at(outer.left() + 1, outer.top() + 1)
                    .of_size(outer.width() - 2, outer.height() - 2);
                draw_hollow_rect_mut(&mut canvas, inner, STAMP);
            }
        }

        for line in &self.layout.lines {
            self.painter
                .draw(&mut canvas, &line.text, line.x, line.y, line.size, scale, line.color);
        }

        canvas
    }
}

fn scaled_rect(region: &Region, s: f32) -> Rect {
    Rect::at((region.x * s).round() as i32, (region.y * s).round() as i32).of_size(
        ((region.width * s).round() as u32).max(1),
        ((region.height * s).round() as u32).max(1),
    )
}

impl RenderSurface for ContractRenderer {
    fn scroll_to_top(&mut self) {
        self.scroll_to(0);
    }

    fn reflow(&mut self) {
        self.layout = self.layout_pass();
        self.generation += 1;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
        self.tracker
            .observe(self.scroll_offset, self.viewport_height, self.layout.height);
        debug!(
            "Laid out contract: {}x{} (generation {}, signed: {})",
            self.width,
            self.layout.height,
            self.generation,
            self.signature.is_some()
        );
    }

    fn content_size(&self) -> (u32, u32) {
        (self.width, self.layout.height)
    }

    fn paint(&self, scale: u32) -> Result<RgbaImage, String> {
        if self.width == 0 || self.layout.height == 0 {
            return Err("nothing laid out".to_string());
        }
        let scale = scale.max(1);
        let size = self
            .width
            .checked_mul(scale)
            .zip(self.layout.height.checked_mul(scale))
            .filter(|&(w, h)| {
                (w as u64 * h as u64)
                    .checked_mul(4)
                    .is_some_and(|bytes| usize::try_from(bytes).is_ok())
            });
        let Some((width, height)) = size else {
            return Err(format!(
                "{}x{} at scale {} does not fit in a pixel buffer",
                self.width, self.layout.height, scale
            ));
        };
        Ok(self.paint_full(width, height, scale))
    }
}
