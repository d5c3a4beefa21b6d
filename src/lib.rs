//! # contract-sign
//!
//! Read, sign and capture a contract: the signing step of a host-onboarding flow.
//!
//! ## Why this crate?
//!
//! Signing a contract on screen looks like a form, but the record it leaves
//! behind is a picture: the contract as the signer saw it, with their ink and
//! a stamp bound in. This crate renders the contract to a tall raster surface,
//! gates signing on having scrolled to the end, captures a freehand
//! signature, and then snapshots the signed contract once. That one snapshot
//! becomes two artifacts: exactly two page images handed to a publisher, and
//! a multi-page PDF offered as a download.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Review ──▶ Signing ──▶ Confirmation
//!                            │
//!                            ├─ 1. Settle     scroll to top, reflow, wait for layout
//!                            ├─ 2. Rasterize  paint the whole contract at 2x
//!                            ├─ 3. Split      two halves at round(h/2) (spawn_blocking)
//!                            ├─ 4. Publish    DocumentPublisher::publish([top, bottom])
//!                            └─ 5. Assemble   A4 PDF tiled from the same snapshot → DownloadSink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contract_sign::{
//!     CollectingPublisher, ContractMetadata, MemorySink, Point, SigningConfig, SigningWorkflow,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//!     let metadata = ContractMetadata::host_agreement("StayWell", "Jane Doe", "jane@example.com", date);
//!     let publisher = Arc::new(CollectingPublisher::new());
//!
//!     let mut wf = SigningWorkflow::open(
//!         metadata,
//!         SigningConfig::default(),
//!         publisher.clone(),
//!         Arc::new(MemorySink::new()),
//!     )?;
//!     wf.read_to_end();
//!     wf.next()?;
//!     wf.pen_down(Point::new(10.0, 80.0))?;
//!     wf.pen_move(Point::new(300.0, 120.0))?;
//!     wf.pen_up()?;
//!
//!     let report = wf.confirm().await?;
//!     eprintln!("published: {}, pdf: {:?}", report.published, report.pdf_summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `contract-sign` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! contract-sign = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capture;
pub mod collab;
pub mod config;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod signature;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capture::{run_capture, Collaborators};
pub use collab::{CollectingPublisher, DirectorySink, DocumentPublisher, DownloadSink, MemorySink};
pub use config::{ArtifactFormat, PageSize, SettleStrategy, SigningConfig, SigningConfigBuilder};
pub use error::{AssemblyFailure, CaptureFailure, GateViolation, SigningError, SplitFailure};
pub use observer::{CaptureStage, NoopObserver, Notice, NoticeLevel, Observer, SessionObserver};
pub use output::{CaptureReport, PdfSummary, SessionView, SplitSummary};
pub use pipeline::assemble::{assemble, download_filename, PdfDocument};
pub use pipeline::encode::EncodedImage;
pub use pipeline::rasterize::{capture as rasterize, RasterSnapshot, RenderSurface};
pub use pipeline::split::{split, SplitResult};
pub use render::document::{Clause, ContractMetadata, ContractRenderer};
pub use render::scroll::{ScrollState, ScrollSubscription};
pub use session::{ContractSession, Step};
pub use signature::{Point, SignaturePad, Stroke};
pub use workflow::SigningWorkflow;
