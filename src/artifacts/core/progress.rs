use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Receives progress updates from long running operations
///
/// Operations poll [`ProgressListener::is_canceled`] between units of work and
/// stop early, leaving no partial state behind, once it reports `true`.
pub trait ProgressListener: Send + Sync {
    fn started(&self) {}

    fn set_description(&self, _description: &str) {}

    /// Percentage in `0.0..=100.0`
    fn set_progress(&self, _percent: f32) {}

    fn complete(&self) {}

    fn is_canceled(&self) -> bool {
        false
    }

    fn cancel(&self) {}
}

/// Listener that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressListener for NullProgress {}

/// Listener that records the last reported state
#[derive(Debug, Default)]
pub struct DefaultProgressListener {
    canceled: AtomicBool,
    completed: AtomicBool,
    progress: AtomicU32,
    description: Mutex<String>,
}

impl DefaultProgressListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    pub fn description(&self) -> String {
        self.description.lock().clone()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

impl ProgressListener for DefaultProgressListener {
    fn started(&self) {
        self.completed.store(false, Ordering::Release);
        self.progress.store(0f32.to_bits(), Ordering::Release);
    }

    fn set_description(&self, description: &str) {
        *self.description.lock() = description.to_string();
    }

    fn set_progress(&self, percent: f32) {
        self.progress
            .store(percent.clamp(0.0, 100.0).to_bits(), Ordering::Release);
    }

    fn complete(&self) {
        self.progress.store(100f32.to_bits(), Ordering::Release);
        self.completed.store(true, Ordering::Release);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }
}

/// Percentage of `done` out of `expected`, tolerating a zero or wrong estimate
pub fn percent(done: usize, expected: usize) -> f32 {
    if expected == 0 {
        return 100.0;
    }
    ((done as f32 / expected as f32) * 100.0).min(100.0)
}
