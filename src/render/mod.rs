//! The contract as a scrollable, paintable surface.
//!
//! [`document`] lays the contract out and paints it, [`text`] draws glyphs (or
//! greeked bars without a font), and [`scroll`] tracks whether the reader has
//! reached the end.

pub mod document;
pub mod scroll;
pub mod text;
