use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable flag that lets another thread (typically a test runner) abort a polling loop.
///
/// All clones share the same underlying flag. Once cancelled it stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
