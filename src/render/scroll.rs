//! Scroll-completion tracking.
//!
//! The renderer owns a [`ScrollTracker`] and reports every scroll position to
//! it. Interested parties hold a [`ScrollSubscription`], which can be polled
//! (`has_reached_end`) or awaited (`reached_end`). Subscriptions are backed by
//! a `tokio::sync::watch` channel, so dropping the renderer closes them all
//! at once and nothing has to be unregistered by hand.
//!
//! "Reached the end" latches: once the bottom has been seen it stays true for
//! the life of the tracker.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Last observed scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScrollState {
    pub offset: u32,
    pub max_offset: u32,
    pub reached_end: bool,
}

/// Sender side, owned by the renderer.
#[derive(Debug)]
pub struct ScrollTracker {
    tx: watch::Sender<ScrollState>,
    tolerance: u32,
}

impl ScrollTracker {
    pub fn new(tolerance: u32) -> Self {
        let (tx, _rx) = watch::channel(ScrollState::default());
        Self { tx, tolerance }
    }

    /// Record a scroll position against the current content geometry.
    pub fn observe(&self, offset: u32, viewport_height: u32, content_height: u32) {
        let max_offset = content_height.saturating_sub(viewport_height);
        let at_end = offset as u64 + viewport_height as u64 + self.tolerance as u64
            >= content_height as u64;
        self.tx.send_if_modified(|state| {
            let reached_end = state.reached_end || at_end;
            if reached_end && !state.reached_end {
                debug!("Scrolled to end at offset {offset}/{max_offset}");
            }
            let next = ScrollState {
                offset,
                max_offset,
                reached_end,
            };
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    pub fn state(&self) -> ScrollState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ScrollSubscription {
        ScrollSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver side, held by whoever gates on reading.
#[derive(Debug, Clone)]
pub struct ScrollSubscription {
    rx: watch::Receiver<ScrollState>,
}

impl ScrollSubscription {
    /// Pollable view of the latch.
    pub fn has_reached_end(&self) -> bool {
        self.rx.borrow().reached_end
    }

    pub fn state(&self) -> ScrollState {
        *self.rx.borrow()
    }

    /// True once the owning renderer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }

    /// Wait until the end is reached. Returns false if the renderer went away first.
    pub async fn reached_end(&mut self) -> bool {
        self.rx.wait_for(|state| state.reached_end).await.is_ok()
    }
}
