//! Freehand signature capture.
//!
//! [`SignaturePad`] accumulates pen strokes as point lists and only turns them
//! into pixels when asked to export. Keeping the vector form around means
//! `clear()` is trivial and an export always reflects every completed stroke,
//! independent of the order in which the host delivered pointer events.

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ink colour of exported signatures.
pub const INK: Rgba<u8> = Rgba([17, 24, 39, 255]);

/// A pen position in pad pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One continuous pen-down → pen-up movement.
pub type Stroke = Vec<Point>;

/// A drawing surface that accumulates strokes and exports them as a raster.
#[derive(Debug, Clone)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    stroke_width: f32,
    strokes: Vec<Stroke>,
    active: Option<Stroke>,
}

impl SignaturePad {
    pub fn new(width: u32, height: u32, stroke_width: f32) -> Self {
        Self {
            width,
            height,
            stroke_width,
            strokes: Vec::new(),
            active: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when nothing has been drawn since creation or the last `clear()`.
    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|s| s.is_empty())
            && self.active.as_ref().map_or(true, |s| s.is_empty())
    }

    /// Completed strokes, in drawing order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Pen down. An unfinished stroke is completed first.
    pub fn begin_stroke(&mut self, at: Point) {
        self.end_stroke();
        self.active = Some(vec![at]);
    }

    /// Pen move. Starts a stroke if the pen was not down.
    pub fn extend_stroke(&mut self, to: Point) {
        match self.active.as_mut() {
            Some(stroke) => stroke.push(to),
            None => self.active = Some(vec![to]),
        }
    }

    /// Pen up. Returns true if a stroke was completed.
    pub fn end_stroke(&mut self) -> bool {
        match self.active.take() {
            Some(stroke) if !stroke.is_empty() => {
                debug!("Stroke completed with {} points", stroke.len());
                self.strokes.push(stroke);
                true
            }
            _ => false,
        }
    }

    /// Replay whole strokes, e.g. loaded from a recording.
    pub fn replay(&mut self, strokes: &[Stroke]) {
        for stroke in strokes {
            let mut points = stroke.iter();
            if let Some(first) = points.next() {
                self.begin_stroke(*first);
                for p in points {
                    self.extend_stroke(*p);
                }
                self.end_stroke();
            }
        }
    }

    /// Drop every stroke.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
    }

    /// Rasterize all strokes onto a transparent canvas of the pad's size.
    ///
    /// Returns `None` when the pad is empty; callers guard with [`is_empty`](Self::is_empty).
    pub fn export_image(&self) -> Option<RgbaImage> {
        if self.is_empty() {
            return None;
        }
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, Rgba([0, 0, 0, 0]));
        let radius = (self.stroke_width / 2.0).max(0.5);
        for stroke in self.strokes.iter().chain(self.active.iter()) {
            paint_stroke(&mut canvas, stroke, radius);
        }
        Some(canvas)
    }

    /// Like [`export_image`](Self::export_image), cropped to the inked area plus `padding`.
    pub fn export_trimmed(&self, padding: u32) -> Option<RgbaImage> {
        let full = self.export_image()?;
        let (x0, y0, x1, y1) = ink_bounds(&full)?;
        let x = x0.saturating_sub(padding);
        let y = y0.saturating_sub(padding);
        let w = (x1 + padding + 1).min(full.width()) - x;
        let h = (y1 + padding + 1).min(full.height()) - y;
        Some(imageops::crop_imm(&full, x, y, w, h).to_image())
    }
}

/// Stamp round brush dabs along each segment so fast pen moves stay connected.
///
/// Segments are clipped to the canvas grown by the brush radius first, so the
/// work per segment is bounded by the canvas size whatever the input points.
fn paint_stroke(canvas: &mut RgbaImage, stroke: &[Point], radius: f32) {
    let r = radius.round().max(1.0) as i32;
    let spacing = (radius / 2.0).max(0.5);
    let margin = r as f32 + 1.0;
    let bounds = Bounds {
        min_x: -margin,
        min_y: -margin,
        max_x: canvas.width() as f32 + margin,
        max_y: canvas.height() as f32 + margin,
    };

    let mut points = stroke.iter();
    let Some(mut prev) = points.next().copied() else {
        return;
    };
    if bounds.contains(prev) {
        dab(canvas, prev, r);
    }

    for &next in points {
        if let Some((from, to)) = bounds.clip(prev, next) {
            let (dx, dy) = (to.x - from.x, to.y - from.y);
            let len = (dx * dx + dy * dy).sqrt();
            let steps = (len / spacing).ceil().max(1.0) as u32;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                dab(canvas, Point::new(from.x + dx * t, from.y + dy * t), r);
            }
        }
        prev = next;
    }
}

fn dab(canvas: &mut RgbaImage, at: Point, radius: i32) {
    draw_filled_circle_mut(canvas, (at.x.round() as i32, at.y.round() as i32), radius, INK);
}

/// Axis-aligned clip rectangle in pad pixels.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Bounds {
    fn contains(&self, p: Point) -> bool {
        (self.min_x..=self.max_x).contains(&p.x) && (self.min_y..=self.max_y).contains(&p.y)
    }

    /// Liang–Barsky clip of the segment `a`→`b`. `None` when it misses the
    /// rectangle or has a non-finite endpoint.
    fn clip(&self, a: Point, b: Point) -> Option<(Point, Point)> {
        if ![a.x, a.y, b.x, b.y].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
        for (p, q) in [
            (-dx, a.x - self.min_x),
            (dx, self.max_x - a.x),
            (-dy, a.y - self.min_y),
            (dy, self.max_y - a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                t0 = t0.max(t);
            } else {
                t1 = t1.min(t);
            }
            if t0 > t1 {
                return None;
            }
        }
        Some((
            Point::new(a.x + dx * t0, a.y + dy * t0),
            Point::new(a.x + dx * t1, a.y + dy * t1),
        ))
    }
}

/// Inclusive bounding box of non-transparent pixels.
fn ink_bounds(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in img.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}
