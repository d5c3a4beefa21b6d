//! Text measurement and drawing for the contract renderer.
//!
//! With a configured TrueType font, text is laid out with real glyph
//! advances and drawn through `imageproc`. Without one, each word is drawn as
//! a solid bar whose width follows a fixed per-character advance ("greeked"
//! text). Greeked output is font-independent and bit-for-bit reproducible,
//! which is what tests and headless runs without font files need.

use crate::error::SigningError;
use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::info;

/// Greeked glyph advance as a fraction of the font size.
const GREEK_ADVANCE: f32 = 0.5;
/// Greeked inter-word gap as a fraction of the font size.
const GREEK_SPACE: f32 = 0.3;

/// Measures and draws text in layout units, scaling at draw time.
pub struct TextPainter {
    font: Option<FontVec>,
}

impl std::fmt::Debug for TextPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPainter")
            .field("font", &self.font.as_ref().map(|_| "<FontVec>"))
            .finish()
    }
}

impl TextPainter {
    /// A painter that greeks all text.
    pub fn greeked() -> Self {
        Self { font: None }
    }

    /// Load the font at `path`, or greek text when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self, SigningError> {
        let Some(path) = path else {
            return Ok(Self::greeked());
        };
        let data = std::fs::read(path).map_err(|e| SigningError::FontLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| SigningError::FontLoad {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        info!("Loaded contract font from {}", path.display());
        Ok(Self { font: Some(font) })
    }

    pub fn is_greeked(&self) -> bool {
        self.font.is_none()
    }

    /// Width of `text` at `size` in layout units.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(size), font, text).0 as f32,
            None => {
                let words: Vec<&str> = text.split_whitespace().collect();
                let chars: usize = words.iter().map(|w| w.chars().count()).sum();
                let gaps = words.len().saturating_sub(1);
                chars as f32 * size * GREEK_ADVANCE + gaps as f32 * size * GREEK_SPACE
            }
        }
    }

    /// Greedy word wrap to `max_width`. Over-long words get a line of their own.
    pub fn wrap(&self, text: &str, size: f32, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if self.measure(&candidate, size) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Draw one line with its top-left corner at (`x`, `y`) layout units.
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        scale: u32,
        color: Rgba<u8>,
    ) {
        let s = scale as f32;
        match &self.font {
            Some(font) => draw_text_mut(
                canvas,
                color,
                (x * s).round() as i32,
                (y * s).round() as i32,
                PxScale::from(size * s),
                font,
                text,
            ),
            None => {
                let bar_top = y + size * 0.3;
                let bar_height = size * 0.45;
                let mut cursor = x;
                for word in text.split_whitespace() {
                    let width = word.chars().count() as f32 * size * GREEK_ADVANCE;
                    let rect = Rect::at((cursor * s).round() as i32, (bar_top * s).round() as i32)
                        .of_size(
                            ((width * s).round() as u32).max(1),
                            ((bar_height * s).round() as u32).max(1),
                        );
                    draw_filled_rect_mut(canvas, rect, color);
                    cursor += width + size * GREEK_SPACE;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeked_measure_is_linear_in_characters() {
        let p = TextPainter::greeked();
        assert_eq!(p.measure("abcd", 10.0), 20.0);
        assert_eq!(p.measure("ab cd", 10.0), 23.0);
        assert_eq!(p.measure("", 10.0), 0.0);
    }

    #[test]
    fn wrap_respects_width() {
        let p = TextPainter::greeked();
        let lines = p.wrap("one two three four five six seven", 10.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(p.measure(line, 10.0) <= 60.0 || !line.contains(' '), "{line}");
        }
        assert_eq!(lines.join(" "), "one two three four five six seven");
    }

    #[test]
    fn long_word_gets_its_own_line() {
        let p = TextPainter::greeked();
        let lines = p.wrap("a supercalifragilistic b", 10.0, 40.0);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn greeked_draw_marks_pixels_at_scale() {
        let p = TextPainter::greeked();
        let mut canvas = RgbaImage::from_pixel(200, 60, Rgba([255, 255, 255, 255]));
        p.draw(&mut canvas, "ink", 10.0, 0.0, 20.0, 2, Rgba([0, 0, 0, 255]));
        // bar spans x 20..80, y 12..30 at scale 2
        assert_eq!(canvas.get_pixel(40, 20), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(100, 20), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn missing_font_is_a_load_error() {
        let err = TextPainter::load(Some(Path::new("/no/such/font.ttf"))).unwrap_err();
        assert!(matches!(err, SigningError::FontLoad { .. }));
    }
}
