use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag telling the worker thread to exit its loop.
///
/// Once raised it stays raised: a worker is never restarted, a new one
/// is spawned instead.
#[derive(Debug, Default)]
pub(crate) struct Stop(AtomicBool);

impl Stop {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    #[inline]
    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Release)
    }
}
