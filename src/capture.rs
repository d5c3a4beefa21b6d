//! The capture pipeline: settle → rasterize → split → publish → assemble → offer.
//!
//! ## Why two independent transforms?
//!
//! The split halves and the PDF are both pure functions of one immutable
//! [`RasterSnapshot`]. Neither reads the other's output, so a split failure
//! still lets the PDF be built, and a PDF failure never touches pages that
//! were already published. The stages run one after another; the CPU-bound
//! ones are moved to the blocking pool and awaited before the next starts.
//!
//! A run never retries on its own. A failed run leaves the session in
//! `Confirmation` with an error, and re-confirming runs the whole pipeline
//! again from the current surface.

use crate::collab::{DocumentPublisher, DownloadSink};
use crate::config::SigningConfig;
use crate::error::{AssemblyFailure, SigningError, SplitFailure};
use crate::observer::{CaptureStage, Notice, SessionObserver};
use crate::output::{CaptureReport, PdfSummary, SnapshotSummary, SplitSummary};
use crate::pipeline::assemble::{assemble, download_filename};
use crate::pipeline::rasterize::{capture, settle, RasterSnapshot, RenderSurface};
use crate::pipeline::split::split;
use crate::session::ContractSession;
use std::time::Instant;
use tracing::{info, warn};

/// Where the pipeline's outputs and notices go.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub publisher: &'a dyn DocumentPublisher,
    pub sink: &'a dyn DownloadSink,
    pub observer: &'a dyn SessionObserver,
}

/// Run the capture pipeline for a session that was just confirmed.
///
/// Stage failures are reported to the observer and recorded in the returned
/// [`CaptureReport`]; they are not errors of this function. `Err` means the
/// session was not waiting for a capture.
pub async fn run_capture<S: RenderSurface + ?Sized>(
    session: &mut ContractSession,
    surface: &mut S,
    collab: Collaborators<'_>,
    config: &SigningConfig,
) -> Result<CaptureReport, SigningError> {
    if !session.is_capturing() {
        return Err(SigningError::Internal(
            "capture pipeline started without a pending confirmation".to_string(),
        ));
    }

    let started = Instant::now();
    let attempt = session.capture_attempts();
    let observer = collab.observer;
    observer.on_capture_start(attempt);
    info!("Capture attempt {} started", attempt);

    // ── 1. Settle ────────────────────────────────────────────────────────
    observer.on_capture_stage(CaptureStage::Settling);
    settle(surface, config).await;

    // ── 2. Rasterize ─────────────────────────────────────────────────────
    observer.on_capture_stage(CaptureStage::Rasterizing);
    let snapshot = match capture(surface, config) {
        Ok(s) => s,
        Err(e) => {
            warn!("Capture failed: {}", e);
            observer.on_notice(&Notice::error(e.to_string()));
            let report = CaptureReport {
                attempt,
                snapshot: None,
                capture_error: Some(e),
                split: None,
                published: false,
                pdf: None,
                duration_ms: elapsed_ms(started),
            };
            session.finish_capture(None, report.error_message());
            observer.on_capture_finish(&report);
            return Ok(report);
        }
    };
    let snapshot_summary = SnapshotSummary {
        width: snapshot.width(),
        height: snapshot.height(),
        scale: snapshot.scale(),
    };

    // ── 3. Split ─────────────────────────────────────────────────────────
    observer.on_capture_stage(CaptureStage::Splitting);
    let split_result = {
        let snap = snapshot.clone();
        let cfg = config.clone();
        tokio::task::spawn_blocking(move || split(&snap, &cfg))
            .await
            .unwrap_or_else(|e| {
                Err(SplitFailure::Encoding {
                    half: "both".to_string(),
                    detail: format!("split task failed: {e}"),
                })
            })
    };

    // ── 4. Publish ───────────────────────────────────────────────────────
    let (split_summary, published) = match split_result {
        Ok(result) => {
            observer.on_capture_stage(CaptureStage::Publishing);
            let summary = SplitSummary::from(&result);
            let pages = result.into_pages();
            collab.publisher.publish(pages.clone());
            info!(
                "Published two pages ({} + {} rows)",
                summary.top_height, summary.bottom_height
            );
            (Ok(summary), Some(pages))
        }
        Err(e) => {
            warn!("Split failed, nothing published: {}", e);
            observer.on_notice(&Notice::error(e.to_string()));
            (Err(e), None)
        }
    };

    // ── 5. Assemble + offer ──────────────────────────────────────────────
    observer.on_capture_stage(CaptureStage::Assembling);
    let file_name = download_filename(&session.metadata().counterparty_name);
    let pdf = assemble_and_offer(&snapshot, config, &file_name, collab.sink).await;
    match &pdf {
        Ok(summary) => observer.on_notice(&Notice::info(format!(
            "{} is ready ({} page{})",
            summary.file_name,
            summary.page_count,
            if summary.page_count == 1 { "" } else { "s" }
        ))),
        Err(e) => {
            warn!("PDF not produced: {}", e);
            observer.on_notice(&Notice::error(e.to_string()));
        }
    }

    // ── 6. Finish ────────────────────────────────────────────────────────
    let report = CaptureReport {
        attempt,
        snapshot: Some(snapshot_summary),
        capture_error: None,
        split: Some(split_summary),
        published: published.is_some(),
        pdf: Some(pdf),
        duration_ms: elapsed_ms(started),
    };
    session.finish_capture(published, report.error_message());
    if report.is_success() {
        observer.on_notice(&Notice::success("Contract signed and published."));
    }
    info!(
        "Capture attempt {} finished in {}ms (published: {})",
        attempt, report.duration_ms, report.published
    );
    observer.on_capture_finish(&report);
    Ok(report)
}

async fn assemble_and_offer(
    snapshot: &RasterSnapshot,
    config: &SigningConfig,
    file_name: &str,
    sink: &dyn DownloadSink,
) -> Result<PdfSummary, AssemblyFailure> {
    let snap = snapshot.clone();
    let page_size = config.page_size;
    let doc = tokio::task::spawn_blocking(move || assemble(&snap, page_size))
        .await
        .map_err(|e| AssemblyFailure::Encoding(format!("assembly task failed: {e}")))??;

    let location = sink
        .offer(file_name, &doc.bytes)
        .map_err(|e| AssemblyFailure::Offer {
            file_name: file_name.to_string(),
            detail: e.to_string(),
        })?;
    Ok(PdfSummary::new(file_name.to_string(), &doc, location))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
