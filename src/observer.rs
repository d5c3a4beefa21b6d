//! Observer trait for user-visible session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::workflow::SigningWorkflow::with_observer`] to receive notices and
//! capture progress as the session moves through its steps.
//!
//! # Why callbacks instead of channels?
//!
//! The host decides how a notice reaches the user: a toast, a terminal
//! spinner, a log line. The library only promises that every failure is
//! reported through [`SessionObserver::on_notice`] and never swallowed.
//!
//! # Example
//!
//! ```rust
//! use contract_sign::{Notice, NoticeLevel, SessionObserver};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Toasts(Mutex<Vec<String>>);
//!
//! impl SessionObserver for Toasts {
//!     fn on_notice(&self, notice: &Notice) {
//!         if notice.level == NoticeLevel::Error {
//!             self.0.lock().unwrap().push(notice.message.clone());
//!         }
//!     }
//! }
//! ```

use crate::output::CaptureReport;
use crate::session::Step;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message meant for the person signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Stage of the capture pipeline currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureStage {
    Settling,
    Rasterizing,
    Splitting,
    Publishing,
    Assembling,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureStage::Settling => "Waiting for layout",
            CaptureStage::Rasterizing => "Rendering contract",
            CaptureStage::Splitting => "Splitting pages",
            CaptureStage::Publishing => "Publishing pages",
            CaptureStage::Assembling => "Building PDF",
        })
    }
}

/// Called by the workflow as the session progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SessionObserver: Send + Sync {
    /// A message for the user. Every gate violation and stage failure arrives here.
    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }

    fn on_step_changed(&self, from: Step, to: Step) {
        let _ = (from, to);
    }

    /// The reader reached the end of the contract for the first time.
    fn on_read_to_end(&self) {}

    /// A capture run began; `attempt` is 1 for the first run.
    fn on_capture_start(&self, attempt: u32) {
        let _ = attempt;
    }

    fn on_capture_stage(&self, stage: CaptureStage) {
        let _ = stage;
    }

    fn on_capture_finish(&self, report: &CaptureReport) {
        let _ = report;
    }
}

/// The default observer: ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Shared observer handle as stored by the workflow.
pub type Observer = Arc<dyn SessionObserver>;
