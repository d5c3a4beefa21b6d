//! Integration tests for the signing workflow and capture pipeline.
//!
//! The pipeline tests drive `run_capture` against small synthetic surfaces so
//! each failure mode can be triggered on demand; the workflow tests use the
//! real contract renderer end to end. Time is paused, so the 500 ms settle
//! delay costs nothing.
//!
//! Run with:
//!   cargo test --test workflow -- --nocapture

use chrono::NaiveDate;
use contract_sign::pipeline::assemble::{scaled_height, tile_offsets};
use contract_sign::{
    assemble, run_capture, split, AssemblyFailure, CaptureFailure, Collaborators,
    CollectingPublisher, ContractMetadata, ContractSession, DirectorySink, DownloadSink,
    GateViolation, MemorySink, Notice, NoticeLevel, NoopObserver, PageSize, Point, RasterSnapshot,
    RenderSurface, SessionObserver, SigningConfig, SigningWorkflow, SplitFailure, Step,
};
use image::{Rgba, RgbaImage};
use std::cell::Cell;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn metadata() -> ContractMetadata {
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    ContractMetadata::host_agreement("StayWell", "Jane Doe", "jane@example.com", date)
}

fn config() -> SigningConfig {
    SigningConfig::builder().scale_factor(1).build().unwrap()
}

/// A session already confirmed and waiting for its capture.
fn confirmed_session() -> ContractSession {
    let mut s = ContractSession::new(metadata());
    s.mark_read_to_end();
    s.advance_to_signing().unwrap();
    s.set_signature(RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 255])))
        .unwrap();
    s.confirm().unwrap();
    s
}

/// A plain surface of `width`×`height` layout units with a gradient so
/// halves are distinguishable. Paint fails while `failures_left > 0`.
struct Sheet {
    width: u32,
    height: u32,
    failures_left: Cell<u32>,
}

impl Sheet {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            failures_left: Cell::new(0),
        }
    }

    fn failing_once(width: u32, height: u32) -> Self {
        let s = Self::new(width, height);
        s.failures_left.set(1);
        s
    }
}

impl RenderSurface for Sheet {
    fn scroll_to_top(&mut self) {}
    fn reflow(&mut self) {}
    fn content_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
    fn paint(&self, scale: u32) -> Result<RgbaImage, String> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err("graphics context lost".into());
        }
        let h = self.height * scale;
        Ok(RgbaImage::from_fn(self.width * scale, h, |_, y| {
            let v = (y * 255 / h.max(1)) as u8;
            Rgba([v, v, v, 255])
        }))
    }
}

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<Notice>>,
    steps: Mutex<Vec<(Step, Step)>>,
}

impl Recorder {
    fn levels(&self) -> Vec<NoticeLevel> {
        self.notices.lock().unwrap().iter().map(|n| n.level).collect()
    }

    fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl SessionObserver for Recorder {
    fn on_notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn on_step_changed(&self, from: Step, to: Step) {
        self.steps.lock().unwrap().push((from, to));
    }
}

/// Refuses every file.
struct FullDisk;

impl DownloadSink for FullDisk {
    fn offer(&self, _file_name: &str, _bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        Err(io::Error::other("no space left on device"))
    }
}

fn sign(wf: &mut SigningWorkflow) {
    wf.pen_down(Point::new(30.0, 120.0)).unwrap();
    wf.pen_move(Point::new(150.0, 50.0)).unwrap();
    wf.pen_move(Point::new(300.0, 150.0)).unwrap();
    wf.pen_move(Point::new(450.0, 70.0)).unwrap();
    wf.pen_up().unwrap();
}

// ── Split and assembly ───────────────────────────────────────────────────────

#[test]
fn test_happy_path_dimensions() {
    let snapshot = RasterSnapshot::new(
        RgbaImage::from_pixel(2000, 4000, Rgba([255, 255, 255, 255])),
        2,
    );
    let result = split(&snapshot, &config()).unwrap();
    assert_eq!((result.top.width, result.top.height), (2000, 2000));
    assert_eq!((result.bottom.width, result.bottom.height), (2000, 2000));

    let page = PageSize::new(595.0, 842.0);
    let scaled = scaled_height(2000, 4000, page.width);
    assert_eq!(tile_offsets(scaled, page.height).len(), 2);
}

#[test]
fn test_pdf_pages_follow_aspect_ratio() {
    // Same aspect ratio as the 2000×4000 scenario, small enough to embed quickly.
    let snapshot = RasterSnapshot::new(
        RgbaImage::from_pixel(200, 400, Rgba([255, 255, 255, 255])),
        1,
    );
    let pdf = assemble(&snapshot, PageSize::new(595.0, 842.0)).unwrap();
    assert_eq!(pdf.page_count(), 2);
    assert_eq!(pdf.scaled_image_height, 1190.0);

    let doc = lopdf::Document::load_mem(&pdf.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn test_pdf_page_coverage_on_a4() {
    for (w, h) in [(794u32, 1123u32), (1588, 9000), (300, 10)] {
        let scaled = scaled_height(w, h, PageSize::A4.width);
        let offsets = tile_offsets(scaled, PageSize::A4.height);
        let expected = (scaled / PageSize::A4.height).ceil().max(1.0) as usize;
        assert_eq!(offsets.len(), expected, "{w}x{h}");
        for (i, offset) in offsets.iter().enumerate() {
            let expected_offset = -(i as f64) * PageSize::A4.height;
            assert!((offset - expected_offset).abs() < 1e-6);
        }
    }
}

#[test]
fn test_split_completeness_for_odd_heights() {
    for height in [500u32, 501, 999, 1333] {
        let snapshot = RasterSnapshot::new(RgbaImage::from_pixel(17, height, Rgba([9, 9, 9, 255])), 1);
        let r = split(&snapshot, &config()).unwrap();
        assert_eq!(r.top.height + r.bottom.height, height);
        assert_eq!(r.top.width, 17);
        assert_eq!(r.bottom.width, 17);
        assert!(r.top.height >= r.bottom.height);
    }
}

// ── Capture pipeline ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_undersized_capture_never_publishes() {
    let publisher = CollectingPublisher::new();
    let sink = MemorySink::new();
    let recorder = Recorder::default();
    let collab = Collaborators {
        publisher: &publisher,
        sink: &sink,
        observer: &recorder,
    };
    let mut session = confirmed_session();

    let report = run_capture(&mut session, &mut Sheet::new(300, 10), collab, &config())
        .await
        .unwrap();

    assert_eq!(
        report.split_error(),
        Some(&SplitFailure::TooSmall {
            height: 10,
            minimum: 500
        })
    );
    assert!(!report.published);
    assert_eq!(publisher.count(), 0);
    assert!(session.published_images().is_empty());
    assert!(!session.is_completed());
    assert!(!session.is_capturing());
    assert_eq!(session.step(), Step::Confirmation);
    assert!(session.last_error().unwrap().contains("10 px"));
    assert!(recorder.errors().iter().any(|m| m.contains("10 px")));

    // The PDF is independent of the split and is still offered.
    assert_eq!(sink.file_names(), vec!["Contract_Jane_Doe.pdf".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_then_retry() {
    let publisher = CollectingPublisher::new();
    let sink = MemorySink::new();
    let recorder = Recorder::default();
    let collab = Collaborators {
        publisher: &publisher,
        sink: &sink,
        observer: &recorder,
    };
    let mut session = confirmed_session();
    let mut surface = Sheet::failing_once(400, 700);

    let first = run_capture(&mut session, &mut surface, collab, &config())
        .await
        .unwrap();
    assert_eq!(
        first.capture_error,
        Some(CaptureFailure::Surface("graphics context lost".into()))
    );
    assert!(first.split.is_none());
    assert!(first.pdf.is_none());
    assert_eq!(publisher.count(), 0);
    assert!(sink.file_names().is_empty());
    assert!(!session.is_capturing());
    assert_eq!(session.step(), Step::Confirmation);
    assert_eq!(recorder.errors().len(), 1);

    // Re-confirming re-runs the whole pipeline.
    session.confirm().unwrap();
    let second = run_capture(&mut session, &mut surface, collab, &config())
        .await
        .unwrap();
    assert!(second.is_success());
    assert_eq!(second.attempt, 2);
    assert_eq!(publisher.count(), 1);
    assert!(session.is_completed());
    assert_eq!(session.last_error(), None);
    assert_eq!(session.confirm(), Err(GateViolation::AlreadyCompleted));

    let split = second.split.unwrap().unwrap();
    assert_eq!(split.top_height + split.bottom_height, 700);
    assert_eq!(split.split_point, 350);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_split_failure_has_same_shape() {
    let publisher = CollectingPublisher::new();
    let sink = MemorySink::new();
    let collab = Collaborators {
        publisher: &publisher,
        sink: &sink,
        observer: &NoopObserver,
    };
    let mut session = confirmed_session();
    let mut surface = Sheet::new(300, 40);

    let first = run_capture(&mut session, &mut surface, collab, &config())
        .await
        .unwrap();
    session.confirm().unwrap();
    let second = run_capture(&mut session, &mut surface, collab, &config())
        .await
        .unwrap();

    assert_eq!(first.split, second.split);
    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(publisher.count(), 0);
    assert_eq!(session.capture_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pdf_failure_keeps_publication() {
    let publisher = CollectingPublisher::new();
    let recorder = Recorder::default();
    let collab = Collaborators {
        publisher: &publisher,
        sink: &FullDisk,
        observer: &recorder,
    };
    let mut session = confirmed_session();

    let report = run_capture(&mut session, &mut Sheet::new(200, 600), collab, &config())
        .await
        .unwrap();

    assert!(report.published);
    assert_eq!(publisher.count(), 1);
    assert!(session.is_completed());
    assert_eq!(session.published_images().len(), 2);
    assert!(matches!(
        report.pdf_error(),
        Some(AssemblyFailure::Offer { file_name, .. }) if file_name == "Contract_Jane_Doe.pdf"
    ));
    assert!(recorder.errors().iter().any(|m| m.contains("no space left")));
    assert!(recorder.levels().contains(&NoticeLevel::Success));
}

#[tokio::test(start_paused = true)]
async fn test_empty_layout_is_not_captured() {
    let publisher = CollectingPublisher::new();
    let sink = MemorySink::new();
    let collab = Collaborators {
        publisher: &publisher,
        sink: &sink,
        observer: &NoopObserver,
    };
    let mut session = confirmed_session();

    let report = run_capture(&mut session, &mut Sheet::new(0, 0), collab, &config())
        .await
        .unwrap();
    assert_eq!(
        report.capture_error,
        Some(CaptureFailure::NotLaidOut { width: 0, height: 0 })
    );
    assert_eq!(publisher.count(), 0);
}

// ── Workflow ─────────────────────────────────────────────────────────────────

fn open_workflow(
    sink: Arc<dyn DownloadSink>,
) -> (SigningWorkflow, Arc<CollectingPublisher>, Arc<Recorder>) {
    let publisher = Arc::new(CollectingPublisher::new());
    let recorder = Arc::new(Recorder::default());
    let wf = SigningWorkflow::open(metadata(), config(), publisher.clone(), sink)
        .unwrap()
        .with_observer(recorder.clone());
    (wf, publisher, recorder)
}

#[test]
fn test_gate_blocks_unread_contract() {
    let (mut wf, _, recorder) = open_workflow(Arc::new(MemorySink::new()));
    assert_eq!(wf.next(), Err(GateViolation::UnreadDocument));
    assert_eq!(wf.step(), Step::Review);
    assert!(!wf.view().can_advance);
    assert_eq!(recorder.levels(), vec![NoticeLevel::Warning]);
}

#[tokio::test(start_paused = true)]
async fn test_confirm_without_signature_runs_nothing() {
    let (mut wf, publisher, _) = open_workflow(Arc::new(MemorySink::new()));
    wf.read_to_end();
    wf.next().unwrap();

    let err = wf.confirm().await.unwrap_err();
    assert!(err.to_string().contains("draw your signature"), "got: {err}");
    assert_eq!(wf.step(), Step::Signing);
    assert_eq!(wf.session().capture_attempts(), 0);
    assert_eq!(publisher.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_clear_then_resign() {
    let (mut wf, publisher, _) = open_workflow(Arc::new(MemorySink::new()));
    wf.read_to_end();
    wf.next().unwrap();
    sign(&mut wf);
    assert!(wf.view().can_confirm);

    wf.clear_signature().unwrap();
    assert_eq!(wf.step(), Step::Signing);
    assert!(wf.session().signature_image().is_none());
    assert!(wf.confirm().await.is_err());
    assert_eq!(wf.step(), Step::Signing);

    sign(&mut wf);
    let report = wf.confirm().await.unwrap();
    assert!(report.is_success());
    assert_eq!(publisher.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_session_writes_pdf() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = Arc::new(DirectorySink::new(tmp.path()));
    let (mut wf, publisher, recorder) = open_workflow(sink);

    wf.read_to_end();
    assert!(wf.view().can_advance);
    wf.next().unwrap();
    sign(&mut wf);
    let report = wf.confirm().await.unwrap();

    assert!(report.is_success(), "{:?}", report.error_message());
    let pdf = report.pdf_summary().unwrap();
    let path = tmp.path().join("Contract_Jane_Doe.pdf");
    assert_eq!(pdf.location.as_deref(), Some(path.as_path()));
    let doc = lopdf::Document::load(&path).unwrap();
    assert_eq!(doc.get_pages().len(), pdf.page_count);

    let [top, bottom] = publisher.last().unwrap();
    let snapshot = report.snapshot.unwrap();
    assert_eq!(top.height + bottom.height, snapshot.height);
    assert_eq!(top.width, snapshot.width);

    assert_eq!(
        *recorder.steps.lock().unwrap(),
        vec![
            (Step::Review, Step::Signing),
            (Step::Signing, Step::Confirmation)
        ]
    );
    assert!(wf.view().completed);
    wf.close().unwrap();
    assert!(wf.session().is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_same_signature_publishes_same_bytes() {
    let mut published = Vec::new();
    for _ in 0..2 {
        let (mut wf, publisher, _) = open_workflow(Arc::new(MemorySink::new()));
        wf.read_to_end();
        wf.next().unwrap();
        sign(&mut wf);
        wf.confirm().await.unwrap();
        published.push(publisher.last().unwrap());
    }
    assert_eq!(published[0], published[1]);
}
