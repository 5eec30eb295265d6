use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Editor counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub sessions_opened: Arc<AtomicUsize>,
    pub saves_completed: Arc<AtomicUsize>,
    pub saves_failed: Arc<AtomicUsize>,
    pub lock_expiries: Arc<AtomicUsize>,
    pub pages_created: Arc<AtomicU64>,
    pub pages_deleted: Arc<AtomicU64>,
    pub previews_generated: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_opened: Arc::new(AtomicUsize::new(0)),
            saves_completed: Arc::new(AtomicUsize::new(0)),
            saves_failed: Arc::new(AtomicUsize::new(0)),
            lock_expiries: Arc::new(AtomicUsize::new(0)),
            pages_created: Arc::new(AtomicU64::new(0)),
            pages_deleted: Arc::new(AtomicU64::new(0)),
            previews_generated: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_sessions_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_saves_completed(&self) {
        self.saves_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_saves_failed(&self) {
        self.saves_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lock_expiries(&self) {
        self.lock_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pages_created(&self, count: u64) {
        self.pages_created.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_pages_deleted(&self, count: u64) {
        self.pages_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_previews_generated(&self) {
        self.previews_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            saves_failed: self.saves_failed.load(Ordering::Relaxed),
            lock_expiries: self.lock_expiries.load(Ordering::Relaxed),
            pages_created: self.pages_created.load(Ordering::Relaxed),
            pages_deleted: self.pages_deleted.load(Ordering::Relaxed),
            previews_generated: self.previews_generated.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub sessions_opened: usize,
    pub saves_completed: usize,
    pub saves_failed: usize,
    pub lock_expiries: usize,
    pub pages_created: u64,
    pub pages_deleted: u64,
    pub previews_generated: u64,
    pub uptime_seconds: u64,
}
