//! The signing workflow state machine.
//!
//! ```text
//!   Review ──(read to end)──▶ Signing ──(signature present)──▶ Confirmation
//!                              │  ▲                               │
//!                              └──┘ clear signature               └─ re-confirm (retry)
//! ```
//!
//! Gates never mutate state when they reject: a refused transition leaves the
//! session exactly as it was. `Confirmation` is terminal; the only actions
//! available there are re-running a failed capture and closing.

use crate::error::GateViolation;
use crate::pipeline::encode::EncodedImage;
use crate::render::document::ContractMetadata;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// The active step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Review,
    Signing,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Review, Step::Signing, Step::Confirmation];

    /// Zero-based position in the progress indicator.
    pub fn index(self) -> usize {
        match self {
            Step::Review => 0,
            Step::Signing => 1,
            Step::Confirmation => 2,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Review => "Review",
            Step::Signing => "Signing",
            Step::Confirmation => "Confirmation",
        })
    }
}

/// State of one signing session, from opening the contract to closing it.
#[derive(Debug, Clone)]
pub struct ContractSession {
    metadata: ContractMetadata,
    step: Step,
    has_read_to_end: bool,
    signature_image: Option<RgbaImage>,
    is_capturing: bool,
    published_images: Vec<EncodedImage>,
    last_error: Option<String>,
    completed: bool,
    capture_attempts: u32,
    closed: bool,
}

impl ContractSession {
    pub fn new(metadata: ContractMetadata) -> Self {
        Self {
            metadata,
            step: Step::Review,
            has_read_to_end: false,
            signature_image: None,
            is_capturing: false,
            published_images: Vec::new(),
            last_error: None,
            completed: false,
            capture_attempts: 0,
            closed: false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn metadata(&self) -> &ContractMetadata {
        &self.metadata
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn has_read_to_end(&self) -> bool {
        self.has_read_to_end
    }

    pub fn signature_image(&self) -> Option<&RgbaImage> {
        self.signature_image.as_ref()
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing
    }

    /// Empty until a capture publishes; exactly two images afterwards.
    pub fn published_images(&self) -> &[EncodedImage] {
        &self.published_images
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True once the split halves were published.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn capture_attempts(&self) -> u32 {
        self.capture_attempts
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Record that the reader reached the end. Latching; returns true the first time.
    pub fn mark_read_to_end(&mut self) -> bool {
        if self.closed || self.has_read_to_end {
            return false;
        }
        self.has_read_to_end = true;
        debug!("Contract read to the end");
        true
    }

    /// Review → Signing.
    pub fn advance_to_signing(&mut self) -> Result<(), GateViolation> {
        self.require_step(Step::Review, "continue to signing")?;
        if !self.has_read_to_end {
            return Err(GateViolation::UnreadDocument);
        }
        self.step = Step::Signing;
        info!("Step Review → Signing");
        Ok(())
    }

    /// Bind the exported signature. Only while signing.
    pub fn set_signature(&mut self, image: RgbaImage) -> Result<(), GateViolation> {
        self.require_step(Step::Signing, "sign")?;
        debug!("Signature set ({}x{})", image.width(), image.height());
        self.signature_image = Some(image);
        Ok(())
    }

    /// Drop the signature and any capture results; the step is unchanged.
    pub fn clear_signature(&mut self) -> Result<(), GateViolation> {
        self.require_step(Step::Signing, "clear signature")?;
        self.signature_image = None;
        self.is_capturing = false;
        self.published_images.clear();
        debug!("Signature cleared");
        Ok(())
    }

    /// Signing → Confirmation, or a retry of a failed capture in Confirmation.
    ///
    /// On success the session is marked capturing; the caller must run the
    /// capture pipeline, which ends with [`ContractSession::finish_capture`].
    pub fn confirm(&mut self) -> Result<(), GateViolation> {
        if self.closed {
            return Err(GateViolation::SessionClosed);
        }
        match self.step {
            Step::Review => {
                return Err(GateViolation::WrongStep {
                    action: "confirm".to_string(),
                    step: self.step,
                })
            }
            Step::Signing => {
                if self.signature_image.is_none() {
                    return Err(GateViolation::MissingSignature);
                }
                self.step = Step::Confirmation;
                info!("Step Signing → Confirmation");
            }
            Step::Confirmation => {
                if self.completed {
                    return Err(GateViolation::AlreadyCompleted);
                }
                if self.is_capturing {
                    return Err(GateViolation::CaptureInFlight);
                }
                info!("Retrying capture (attempt {})", self.capture_attempts + 1);
            }
        }
        self.is_capturing = true;
        self.capture_attempts += 1;
        self.last_error = None;
        Ok(())
    }

    /// Record the outcome of a capture run started by [`ContractSession::confirm`].
    ///
    /// `published` carries the two page images when the split was published;
    /// `error` is the message shown to the user when any stage failed.
    pub fn finish_capture(&mut self, published: Option<[EncodedImage; 2]>, error: Option<String>) {
        self.is_capturing = false;
        if let Some(images) = published {
            self.published_images = images.into();
            self.completed = true;
        }
        self.last_error = error;
    }

    /// End the session. Refused while a capture is running.
    pub fn close(&mut self) -> Result<(), GateViolation> {
        if self.closed {
            return Ok(());
        }
        if self.is_capturing {
            return Err(GateViolation::CaptureInFlight);
        }
        self.closed = true;
        info!("Session closed at step {}", self.step);
        Ok(())
    }

    fn require_step(&self, step: Step, action: &str) -> Result<(), GateViolation> {
        if self.closed {
            return Err(GateViolation::SessionClosed);
        }
        if self.step != step {
            return Err(GateViolation::WrongStep {
                action: action.to_string(),
                step: self.step,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::Rgba;

    fn session() -> ContractSession {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        ContractSession::new(ContractMetadata::host_agreement(
            "StayWell",
            "Jane Doe",
            "jane@example.com",
            date,
        ))
    }

    fn ink() -> RgbaImage {
        RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]))
    }

    fn page(height: u32) -> EncodedImage {
        EncodedImage {
            width: 10,
            height,
            mime_type: "image/png",
            bytes: vec![1, 2, 3],
        }
    }

    fn signing() -> ContractSession {
        let mut s = session();
        s.mark_read_to_end();
        s.advance_to_signing().unwrap();
        s
    }

    #[test]
    fn unread_document_blocks_signing() {
        let mut s = session();
        assert_eq!(s.advance_to_signing(), Err(GateViolation::UnreadDocument));
        assert_eq!(s.step(), Step::Review);
    }

    #[test]
    fn read_to_end_latches() {
        let mut s = session();
        assert!(s.mark_read_to_end());
        assert!(!s.mark_read_to_end());
        assert!(s.has_read_to_end());
    }

    #[test]
    fn confirm_without_signature_is_rejected() {
        let mut s = signing();
        assert_eq!(s.confirm(), Err(GateViolation::MissingSignature));
        assert_eq!(s.step(), Step::Signing);
        assert!(!s.is_capturing());
        assert_eq!(s.capture_attempts(), 0);
    }

    #[test]
    fn confirm_starts_capture() {
        let mut s = signing();
        s.set_signature(ink()).unwrap();
        s.confirm().unwrap();
        assert_eq!(s.step(), Step::Confirmation);
        assert!(s.is_capturing());
        assert_eq!(s.capture_attempts(), 1);
    }

    #[test]
    fn clear_keeps_step_and_resets_signature() {
        let mut s = signing();
        s.set_signature(ink()).unwrap();
        s.clear_signature().unwrap();
        assert_eq!(s.step(), Step::Signing);
        assert!(s.signature_image().is_none());
        assert!(s.published_images().is_empty());
        assert_eq!(s.confirm(), Err(GateViolation::MissingSignature));
    }

    #[test]
    fn clear_outside_signing_is_wrong_step() {
        let mut s = session();
        let err = s.clear_signature().unwrap_err();
        assert!(matches!(err, GateViolation::WrongStep { step: Step::Review, .. }));
    }

    #[test]
    fn failed_capture_allows_retry() {
        let mut s = signing();
        s.set_signature(ink()).unwrap();
        s.confirm().unwrap();
        assert_eq!(s.confirm(), Err(GateViolation::CaptureInFlight));

        s.finish_capture(None, Some("capture failed".into()));
        assert!(!s.is_capturing());
        assert_eq!(s.last_error(), Some("capture failed"));
        assert_eq!(s.step(), Step::Confirmation);

        s.confirm().unwrap();
        assert_eq!(s.capture_attempts(), 2);
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn published_capture_completes() {
        let mut s = signing();
        s.set_signature(ink()).unwrap();
        s.confirm().unwrap();
        s.finish_capture(Some([page(3), page(2)]), None);
        assert!(s.is_completed());
        assert_eq!(s.published_images().len(), 2);
        assert_eq!(s.confirm(), Err(GateViolation::AlreadyCompleted));
    }

    #[test]
    fn close_is_refused_while_capturing() {
        let mut s = signing();
        s.set_signature(ink()).unwrap();
        s.confirm().unwrap();
        assert_eq!(s.close(), Err(GateViolation::CaptureInFlight));
        s.finish_capture(None, None);
        s.close().unwrap();
        assert!(s.is_closed());
        assert_eq!(s.confirm(), Err(GateViolation::SessionClosed));
    }
}
