//! Stage completion latches and the demuxer stop flag
//!
//! Each pipeline stage sets its own latch exactly once, when it has processed
//! all work it will ever process. Downstream stages only read latches of
//! upstream stages to decide between waiting and draining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// One-way completion flag.
///
/// `set` is idempotent; `wait` returns immediately once set.
#[derive(Debug, Clone, Default)]
pub struct Latch {
    inner: Arc<LatchInner>,
}

#[derive(Debug, Default)]
struct LatchInner {
    set: AtomicBool,
    notify: Notify,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        if !self.inner.set.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        // Register interest before re-checking so a concurrent set is not lost.
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Shared stop flag for the demuxer thread.
///
/// Readable from both the OS thread and cooperative tasks.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The per-run latch set, owned by the lifecycle controller
#[derive(Debug, Clone, Default)]
pub struct StageLatches {
    pub video_processor: Latch,
    pub audio_processor: Latch,
    pub clip_scorer: Latch,
}

impl StageLatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once both modality workers have drained.
    pub fn producers_done(&self) -> bool {
        self.video_processor.is_set() && self.audio_processor.is_set()
    }
}
