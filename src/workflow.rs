//! The signing workflow: one contract, one signer, one session.
//!
//! [`SigningWorkflow`] owns the renderer, the signature pad and the session,
//! and routes user input between them:
//!
//! ```text
//!  scroll ──▶ ContractRenderer ──(scroll subscription)──▶ ContractSession.has_read_to_end
//!  pen    ──▶ SignaturePad ──(export on stroke end)──▶ renderer + session signature
//!  confirm ─▶ ContractSession.confirm ──▶ capture::run_capture(renderer)
//! ```
//!
//! Every rejected action is logged, reported to the observer as a warning and
//! returned to the caller; it never changes state.

use crate::capture::{run_capture, Collaborators};
use crate::collab::{DocumentPublisher, DownloadSink};
use crate::config::SigningConfig;
use crate::error::{GateViolation, SigningError};
use crate::observer::{Notice, NoopObserver, Observer};
use crate::output::{CaptureReport, SessionView};
use crate::render::document::{ContractMetadata, ContractRenderer};
use crate::render::scroll::ScrollSubscription;
use crate::session::{ContractSession, Step};
use crate::signature::{Point, SignaturePad, Stroke};
use std::sync::Arc;
use tracing::{debug, warn};

/// Blank margin kept around the signer's ink when it is bound into the contract.
const SIGNATURE_TRIM_PADDING: u32 = 8;

pub struct SigningWorkflow {
    config: SigningConfig,
    session: ContractSession,
    renderer: ContractRenderer,
    pad: SignaturePad,
    scroll: ScrollSubscription,
    publisher: Arc<dyn DocumentPublisher>,
    sink: Arc<dyn DownloadSink>,
    observer: Observer,
}

impl std::fmt::Debug for SigningWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningWorkflow")
            .field("session", &self.session)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl SigningWorkflow {
    /// Open a session for `metadata`. Loads the configured font, lays the contract out.
    pub fn open(
        metadata: ContractMetadata,
        config: SigningConfig,
        publisher: Arc<dyn DocumentPublisher>,
        sink: Arc<dyn DownloadSink>,
    ) -> Result<Self, SigningError> {
        let renderer = ContractRenderer::new(metadata.clone(), &config)?;
        Ok(Self::with_renderer(renderer, metadata, config, publisher, sink))
    }

    /// Open a session around an already-built renderer.
    pub fn with_renderer(
        renderer: ContractRenderer,
        metadata: ContractMetadata,
        config: SigningConfig,
        publisher: Arc<dyn DocumentPublisher>,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        let pad = SignaturePad::new(
            config.signature_pad_width,
            config.signature_pad_height,
            config.stroke_width,
        );
        let scroll = renderer.subscribe_scroll_end();
        let mut workflow = Self {
            config,
            session: ContractSession::new(metadata),
            renderer,
            pad,
            scroll,
            publisher,
            sink,
            observer: Arc::new(NoopObserver),
        };
        // A contract shorter than the viewport is read as soon as it opens.
        workflow.sync_read_state();
        workflow
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn session(&self) -> &ContractSession {
        &self.session
    }

    pub fn renderer(&self) -> &ContractRenderer {
        &self.renderer
    }

    pub fn pad(&self) -> &SignaturePad {
        &self.pad
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn step(&self) -> Step {
        self.session.step()
    }

    pub fn view(&self) -> SessionView {
        SessionView::of(&self.session)
    }

    // ── Review ───────────────────────────────────────────────────────────

    pub fn scroll_to(&mut self, offset: u32) {
        self.renderer.scroll_to(offset);
        self.sync_read_state();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        self.renderer.scroll_by(delta);
        self.sync_read_state();
    }

    /// Scroll one viewport at a time until the end is reached.
    pub fn read_to_end(&mut self) {
        let page = i64::from(self.renderer.viewport_height().max(1));
        while !self.scroll.has_reached_end()
            && self.renderer.scroll_offset() < self.renderer.max_scroll_offset()
        {
            self.scroll_by(page);
        }
        self.sync_read_state();
    }

    /// Review → Signing.
    pub fn next(&mut self) -> Result<Step, GateViolation> {
        let from = self.session.step();
        self.gate(|s| s.advance_to_signing())?;
        self.observer.on_step_changed(from, Step::Signing);
        Ok(Step::Signing)
    }

    fn sync_read_state(&mut self) {
        if self.scroll.has_reached_end() && self.session.mark_read_to_end() {
            self.observer.on_read_to_end();
            self.observer
                .on_notice(&Notice::info("You have reached the end of the contract."));
        }
    }

    // ── Signing ──────────────────────────────────────────────────────────

    pub fn pen_down(&mut self, at: Point) -> Result<(), GateViolation> {
        self.require_signing("draw")?;
        self.pad.begin_stroke(at);
        Ok(())
    }

    pub fn pen_move(&mut self, to: Point) -> Result<(), GateViolation> {
        self.require_signing("draw")?;
        self.pad.extend_stroke(to);
        Ok(())
    }

    /// Finish the stroke and bind the updated signature into the contract.
    pub fn pen_up(&mut self) -> Result<(), GateViolation> {
        self.require_signing("draw")?;
        if self.pad.end_stroke() {
            self.bind_signature()?;
        }
        Ok(())
    }

    /// Draw previously recorded strokes, then bind the result.
    pub fn replay_strokes(&mut self, strokes: &[Stroke]) -> Result<(), GateViolation> {
        self.require_signing("draw")?;
        self.pad.replay(strokes);
        self.bind_signature()
    }

    /// Wipe the pad and unbind the signature; stays in Signing.
    pub fn clear_signature(&mut self) -> Result<(), GateViolation> {
        self.gate(|s| s.clear_signature())?;
        self.pad.clear();
        self.renderer.set_signature(None);
        Ok(())
    }

    fn bind_signature(&mut self) -> Result<(), GateViolation> {
        let Some(image) = self.pad.export_trimmed(SIGNATURE_TRIM_PADDING) else {
            return Ok(());
        };
        debug!("Binding {}x{} signature", image.width(), image.height());
        self.gate(|s| s.set_signature(image.clone()))?;
        self.renderer.set_signature(Some(image));
        Ok(())
    }

    fn require_signing(&self, action: &str) -> Result<(), GateViolation> {
        let result = if self.session.is_closed() {
            Err(GateViolation::SessionClosed)
        } else if self.session.step() != Step::Signing {
            Err(GateViolation::WrongStep {
                action: action.to_string(),
                step: self.session.step(),
            })
        } else {
            Ok(())
        };
        result.inspect_err(|e| self.report(e))
    }

    // ── Confirmation ─────────────────────────────────────────────────────

    /// Signing → Confirmation and run the capture pipeline; also retries a failed run.
    pub async fn confirm(&mut self) -> Result<CaptureReport, SigningError> {
        let from = self.session.step();
        self.gate(|s| s.confirm())?;
        if from != Step::Confirmation {
            self.observer.on_step_changed(from, Step::Confirmation);
        }

        let collab = Collaborators {
            publisher: self.publisher.as_ref(),
            sink: self.sink.as_ref(),
            observer: self.observer.as_ref(),
        };
        run_capture(&mut self.session, &mut self.renderer, collab, &self.config).await
    }

    /// End the session. Refused while a capture is running.
    pub fn close(&mut self) -> Result<SessionView, GateViolation> {
        self.gate(|s| s.close())?;
        Ok(self.view())
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    /// Apply a session transition; report and return any violation.
    fn gate<T>(
        &mut self,
        f: impl FnOnce(&mut ContractSession) -> Result<T, GateViolation>,
    ) -> Result<T, GateViolation> {
        f(&mut self.session).inspect_err(|e| self.report(e))
    }

    fn report(&self, violation: &GateViolation) {
        warn!("Rejected at step {}: {}", self.session.step(), violation);
        self.observer.on_notice(&Notice::warning(violation.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{CollectingPublisher, MemorySink};
    use chrono::NaiveDate;

    fn workflow() -> (SigningWorkflow, Arc<CollectingPublisher>) {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let metadata = ContractMetadata::host_agreement("StayWell", "Jane Doe", "jane@example.com", date);
        let config = SigningConfig::builder().scale_factor(1).build().unwrap();
        let publisher = Arc::new(CollectingPublisher::new());
        let wf = SigningWorkflow::open(metadata, config, publisher.clone(), Arc::new(MemorySink::new()))
            .unwrap();
        (wf, publisher)
    }

    fn sign(wf: &mut SigningWorkflow) {
        wf.pen_down(Point::new(20.0, 100.0)).unwrap();
        wf.pen_move(Point::new(200.0, 60.0)).unwrap();
        wf.pen_move(Point::new(380.0, 140.0)).unwrap();
        wf.pen_up().unwrap();
    }

    #[test]
    fn partial_scroll_keeps_gate_closed() {
        let (mut wf, _) = workflow();
        wf.scroll_by(50);
        assert!(!wf.session().has_read_to_end());
        assert_eq!(wf.next(), Err(GateViolation::UnreadDocument));
        assert_eq!(wf.step(), Step::Review);
    }

    #[test]
    fn reading_to_end_opens_gate() {
        let (mut wf, _) = workflow();
        wf.read_to_end();
        assert!(wf.session().has_read_to_end());
        // Scrolling back up does not revoke it.
        wf.scroll_to(0);
        assert_eq!(wf.next(), Ok(Step::Signing));
    }

    #[test]
    fn pen_outside_signing_is_rejected() {
        let (mut wf, _) = workflow();
        let err = wf.pen_down(Point::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, GateViolation::WrongStep { step: Step::Review, .. }));
        assert!(wf.pad().is_empty());
    }

    #[test]
    fn stroke_binds_signature_into_contract() {
        let (mut wf, _) = workflow();
        wf.read_to_end();
        wf.next().unwrap();
        sign(&mut wf);
        assert!(wf.session().signature_image().is_some());
        assert!(wf.renderer().has_signature());
        assert!(wf.renderer().signature_region().is_some());

        wf.clear_signature().unwrap();
        assert!(wf.pad().is_empty());
        assert!(!wf.renderer().has_signature());
        assert_eq!(wf.step(), Step::Signing);
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_runs_capture_once() {
        let (mut wf, publisher) = workflow();
        wf.read_to_end();
        wf.next().unwrap();
        sign(&mut wf);

        let report = wf.confirm().await.unwrap();
        assert!(report.is_success(), "{:?}", report.error_message());
        assert_eq!(publisher.count(), 1);
        assert_eq!(wf.step(), Step::Confirmation);
        assert!(wf.close().is_ok());
    }
}
