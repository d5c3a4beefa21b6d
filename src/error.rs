//! Error types for the contract-sign library.
//!
//! Two tiers of error reflect two distinct failure modes:
//!
//! * [`SigningError`] is **fatal** to the call that returned it. The
//!   configuration is invalid, a font could not be loaded, an output file
//!   could not be written. Returned as `Err(SigningError)`.
//!
//! * [`GateViolation`], [`CaptureFailure`], [`SplitFailure`] and
//!   [`AssemblyFailure`] are **session-scoped**. The user tried to advance too
//!   early, or one stage of the capture pipeline failed. None of them is fatal
//!   to the host. The stage failures are stored in
//!   [`crate::output::CaptureReport`] so callers can see exactly which
//!   artifact was produced and which was not.
//!   [`CaptureReport::check`](crate::output::CaptureReport::check) lifts the
//!   first one into a [`SigningError`] for callers that need every artifact.
//!
//! Every session-scoped failure is also surfaced to the user through
//! [`crate::observer::SessionObserver::on_notice`].

use crate::session::Step;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the contract-sign library.
#[derive(Debug, Error)]
pub enum SigningError {
    // ── Session errors ────────────────────────────────────────────────────
    /// A workflow transition was attempted without its precondition.
    #[error(transparent)]
    Gate(#[from] GateViolation),

    /// The rasterizer could not produce a snapshot.
    #[error(transparent)]
    Capture(#[from] CaptureFailure),

    /// The snapshot could not be split into the two published pages.
    #[error(transparent)]
    Split(#[from] SplitFailure),

    /// The multi-page PDF could not be assembled or offered.
    #[error(transparent)]
    Assembly(#[from] AssemblyFailure),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured TrueType font could not be read or parsed.
    #[error("Failed to load font '{path}': {detail}")]
    FontLoad { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The user tried to advance the workflow without satisfying a precondition.
///
/// Recovered locally: the session does not change state and the user sees a
/// warning.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GateViolation {
    /// Review → Signing before the contract was scrolled to the end.
    #[error("Please read the whole contract before signing: scroll to the end of the document.")]
    UnreadDocument,

    /// Signing → Confirmation with an empty signature.
    #[error("Please draw your signature before confirming.")]
    MissingSignature,

    /// The action is not available in the current step.
    #[error("'{action}' is not available during the {step} step")]
    WrongStep { action: String, step: Step },

    /// The session was asked to close (or re-capture) while a capture is running.
    #[error("The signed document is still being generated; please wait.")]
    CaptureInFlight,

    /// Re-confirming after the document was already captured and published.
    #[error("This contract has already been signed and published.")]
    AlreadyCompleted,

    /// Any action after the session was closed.
    #[error("This signing session has been closed.")]
    SessionClosed,
}

/// The render surface could not be snapshotted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CaptureFailure {
    /// The content root measured zero in one dimension.
    #[error("Contract is not laid out yet ({width}x{height}); capture aborted")]
    NotLaidOut { width: u32, height: u32 },

    /// The scaled snapshot would exceed the pixel budget.
    #[error("Snapshot of {width}x{height} px exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },

    /// The painted buffer does not match the measured layout.
    #[error("Painted surface is {actual_width}x{actual_height} px, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The underlying paint operation failed.
    #[error("Rendering surface failed during capture: {0}")]
    Surface(String),
}

/// The snapshot could not be partitioned into the two published page images.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SplitFailure {
    /// The snapshot is suspiciously short; content was likely hidden or not rendered.
    #[error("Captured document is only {height} px tall (minimum {minimum} px); parts of the contract were not rendered")]
    TooSmall { height: u32, minimum: u32 },

    /// A crop produced a zero-area image.
    #[error("The {half} half of the split is empty ({width}x{height})")]
    EmptyCrop {
        half: String,
        width: u32,
        height: u32,
    },

    /// Encoding a half failed or produced no bytes.
    #[error("Failed to encode the {half} half: {detail}")]
    Encoding { half: String, detail: String },
}

/// The downloadable PDF could not be produced or offered.
///
/// Never invalidates images that were already published.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AssemblyFailure {
    /// The snapshot has a zero dimension.
    #[error("Cannot assemble a PDF from an empty {width}x{height} snapshot")]
    EmptySnapshot { width: u32, height: u32 },

    /// The requested page size is not finite or outside the accepted edge range.
    #[error("Invalid page size {width}x{height} pt")]
    InvalidPageSize { width: String, height: String },

    /// Serialising the PDF failed.
    #[error("PDF generation failed: {0}")]
    Encoding(String),

    /// The download sink refused the file.
    #[error("Could not save '{file_name}': {detail}")]
    Offer { file_name: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_violation_wraps_transparently() {
        let e: SigningError = GateViolation::UnreadDocument.into();
        assert!(e.to_string().contains("scroll to the end"), "got: {e}");
    }

    #[test]
    fn wrong_step_display() {
        let e = GateViolation::WrongStep {
            action: "clear signature".into(),
            step: Step::Review,
        };
        let msg = e.to_string();
        assert!(msg.contains("clear signature"), "got: {msg}");
        assert!(msg.contains("Review"), "got: {msg}");
    }

    #[test]
    fn too_small_display() {
        let e = SplitFailure::TooSmall {
            height: 10,
            minimum: 500,
        };
        let msg = e.to_string();
        assert!(msg.contains("10 px"));
        assert!(msg.contains("500 px"));
    }

    #[test]
    fn not_laid_out_display() {
        let e = CaptureFailure::NotLaidOut {
            width: 0,
            height: 1200,
        };
        assert!(e.to_string().contains("0x1200"));
    }

    #[test]
    fn stage_failures_serialize() {
        let e = AssemblyFailure::Offer {
            file_name: "Contract_Jane.pdf".into(),
            detail: "disk full".into(),
        };
        let json = serde_json::to_string(&e).expect("serialize");
        assert!(json.contains("Contract_Jane.pdf"));
    }
}
