//! Pipeline stages for capturing a signed contract.
//!
//! Each submodule implements exactly one transformation step. The split and
//! the PDF are siblings, not a chain: both read the same snapshot.
//!
//! ## Data Flow
//!
//! ```text
//!                         ┌──▶ split ──▶ encode ──▶ publisher
//! surface ──▶ rasterize ──┤
//!  (render)   (snapshot)  └──▶ assemble ──────────▶ download sink
//! ```
//!
//! 1. [`rasterize`]: settle the surface and paint it in full at the capture
//!    scale
//! 2. [`split`]: cut the snapshot into two full-width halves at
//!    `round(h/2)`
//! 3. [`encode`]: max-quality PNG (or JPEG) for each half
//! 4. [`assemble`]: tile the snapshot over fixed-size PDF pages

pub mod assemble;
pub mod encode;
pub mod rasterize;
pub mod split;
