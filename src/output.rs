//! Output types: what a capture run produced and what the UI should show.

use crate::error::{AssemblyFailure, CaptureFailure, SigningError, SplitFailure};
use crate::observer::Notice;
use crate::pipeline::assemble::PdfDocument;
use crate::pipeline::split::SplitResult;
use crate::session::{ContractSession, Step};
use serde::Serialize;
use std::path::PathBuf;

// ── Capture report ───────────────────────────────────────────────────────────

/// Dimensions of the snapshot a capture run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

/// The two published halves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitSummary {
    pub split_point: u32,
    pub width: u32,
    pub top_height: u32,
    pub bottom_height: u32,
    pub top_bytes: usize,
    pub bottom_bytes: usize,
}

impl From<&SplitResult> for SplitSummary {
    fn from(r: &SplitResult) -> Self {
        Self {
            split_point: r.split_point,
            width: r.source_width,
            top_height: r.top.height,
            bottom_height: r.bottom.height,
            top_bytes: r.top.len(),
            bottom_bytes: r.bottom.len(),
        }
    }
}

/// The PDF offered for download.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfSummary {
    pub file_name: String,
    pub page_count: usize,
    pub bytes: usize,
    /// Where the sink stored the file, when it stores files at all.
    pub location: Option<PathBuf>,
}

impl PdfSummary {
    pub fn new(file_name: String, doc: &PdfDocument, location: Option<PathBuf>) -> Self {
        Self {
            file_name,
            page_count: doc.page_count(),
            bytes: doc.bytes.len(),
            location,
        }
    }
}

/// Outcome of one run of the capture pipeline.
///
/// Each stage's result is kept separately: a PDF failure never hides a
/// successful publication, and a split failure still reports the PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    pub attempt: u32,
    pub snapshot: Option<SnapshotSummary>,
    pub capture_error: Option<CaptureFailure>,
    /// `None` when capture failed and the split never ran.
    pub split: Option<Result<SplitSummary, SplitFailure>>,
    pub published: bool,
    /// `None` when capture failed and assembly never ran.
    pub pdf: Option<Result<PdfSummary, AssemblyFailure>>,
    pub duration_ms: u64,
}

impl CaptureReport {
    /// The run published both page images.
    pub fn is_success(&self) -> bool {
        self.published
    }

    pub fn split_error(&self) -> Option<&SplitFailure> {
        self.split.as_ref().and_then(|r| r.as_ref().err())
    }

    pub fn pdf_error(&self) -> Option<&AssemblyFailure> {
        self.pdf.as_ref().and_then(|r| r.as_ref().err())
    }

    pub fn pdf_summary(&self) -> Option<&PdfSummary> {
        self.pdf.as_ref().and_then(|r| r.as_ref().ok())
    }

    /// The first stage that failed, as a fatal error for callers that need
    /// every artifact.
    pub fn check(&self) -> Result<(), SigningError> {
        if let Some(e) = &self.capture_error {
            return Err(e.clone().into());
        }
        if let Some(e) = self.split_error() {
            return Err(e.clone().into());
        }
        match self.pdf_error() {
            Some(e) => Err(e.clone().into()),
            None => Ok(()),
        }
    }

    /// Message for the failure banner: the first stage that failed.
    pub fn error_message(&self) -> Option<String> {
        self.check().err().map(|e| e.to_string())
    }
}

// ── Session view ─────────────────────────────────────────────────────────────

/// Position of a step relative to the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIndicator {
    pub step: Step,
    pub label: &'static str,
    pub state: StepState,
}

/// Everything the UI needs to draw the current session, as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub step: Step,
    pub steps: Vec<StepIndicator>,
    /// Scroll-completion banner, shown during review.
    pub scroll_banner: Option<String>,
    pub can_advance: bool,
    pub can_clear: bool,
    pub can_confirm: bool,
    /// Spinner state.
    pub is_capturing: bool,
    pub completed: bool,
    pub published_pages: usize,
    pub capture_attempts: u32,
    /// Success or failure banner.
    pub banner: Option<Notice>,
}

impl SessionView {
    pub fn of(session: &ContractSession) -> Self {
        let step = session.step();
        let steps = Step::ALL
            .iter()
            .map(|&s| StepIndicator {
                step: s,
                label: match s {
                    Step::Review => "Read",
                    Step::Signing => "Sign",
                    Step::Confirmation => "Confirm",
                },
                state: match s.index().cmp(&step.index()) {
                    std::cmp::Ordering::Less => StepState::Done,
                    std::cmp::Ordering::Equal if session.is_completed() => StepState::Done,
                    std::cmp::Ordering::Equal => StepState::Current,
                    std::cmp::Ordering::Greater => StepState::Upcoming,
                },
            })
            .collect();

        let scroll_banner = (step == Step::Review).then(|| {
            if session.has_read_to_end() {
                "You have read the whole contract. Continue to sign it.".to_string()
            } else {
                "Scroll to the end of the contract to continue.".to_string()
            }
        });

        let banner = if session.is_capturing() {
            Some(Notice::info("Generating your signed contract..."))
        } else if let Some(e) = session.last_error() {
            Some(Notice::error(e))
        } else if session.is_completed() {
            Some(Notice::success("Contract signed and published."))
        } else {
            None
        };

        let open = !session.is_closed();
        Self {
            step,
            steps,
            scroll_banner,
            can_advance: open && step == Step::Review && session.has_read_to_end(),
            can_clear: open && step == Step::Signing && session.signature_image().is_some(),
            can_confirm: open
                && !session.is_capturing()
                && !session.is_completed()
                && match step {
                    Step::Review => false,
                    Step::Signing => session.signature_image().is_some(),
                    Step::Confirmation => true,
                },
            is_capturing: session.is_capturing(),
            completed: session.is_completed(),
            published_pages: session.published_images().len(),
            capture_attempts: session.capture_attempts(),
            banner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoticeLevel;
    use crate::render::document::ContractMetadata;
    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};

    fn session() -> ContractSession {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        ContractSession::new(ContractMetadata::host_agreement("StayWell", "Jane Doe", "jane@example.com", date))
    }

    #[test]
    fn review_view_shows_scroll_banner() {
        let view = SessionView::of(&session());
        assert_eq!(view.step, Step::Review);
        assert!(!view.can_advance);
        assert!(view.scroll_banner.unwrap().contains("Scroll to the end"));
        assert_eq!(view.steps[0].state, StepState::Current);
        assert_eq!(view.steps[2].state, StepState::Upcoming);
    }

    #[test]
    fn signing_view_enables_confirm_with_signature() {
        let mut s = session();
        s.mark_read_to_end();
        s.advance_to_signing().unwrap();
        assert!(!SessionView::of(&s).can_confirm);

        s.set_signature(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))).unwrap();
        let view = SessionView::of(&s);
        assert!(view.can_confirm);
        assert!(view.can_clear);
        assert!(view.scroll_banner.is_none());
        assert_eq!(view.steps[0].state, StepState::Done);
    }

    #[test]
    fn failed_capture_shows_error_banner() {
        let mut s = session();
        s.mark_read_to_end();
        s.advance_to_signing().unwrap();
        s.set_signature(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))).unwrap();
        s.confirm().unwrap();
        assert!(SessionView::of(&s).is_capturing);

        s.finish_capture(None, Some("too small".into()));
        let view = SessionView::of(&s);
        assert_eq!(view.banner.unwrap().level, NoticeLevel::Error);
        assert!(view.can_confirm);
    }

    #[test]
    fn error_message_prefers_earliest_stage() {
        let report = CaptureReport {
            attempt: 1,
            snapshot: None,
            capture_error: None,
            split: Some(Err(SplitFailure::TooSmall { height: 10, minimum: 500 })),
            published: false,
            pdf: Some(Err(AssemblyFailure::Encoding("x".into()))),
            duration_ms: 0,
        };
        assert!(report.error_message().unwrap().contains("10 px"));
        assert!(!report.is_success());
        assert!(matches!(
            report.check(),
            Err(SigningError::Split(SplitFailure::TooSmall { height: 10, .. }))
        ));
    }

    #[test]
    fn pdf_failure_after_publication_fails_the_check() {
        let report = CaptureReport {
            attempt: 2,
            snapshot: None,
            capture_error: None,
            split: None,
            published: true,
            pdf: Some(Err(AssemblyFailure::Encoding("x".into()))),
            duration_ms: 0,
        };
        assert!(report.is_success());
        assert!(matches!(report.check(), Err(SigningError::Assembly(_))));
    }
}
