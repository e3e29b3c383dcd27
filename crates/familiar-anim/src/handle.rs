use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Identifier of one running animation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct HandleState {
    cancelled: AtomicBool,
    finished: AtomicBool,
}

/// Caller-side handle to a running animation.
///
/// Clones share state. Cancelling is idempotent and stops every step that has
/// not fired yet.
#[derive(Debug, Clone)]
pub struct AnimationHandle {
    id: HandleId,
    state: Arc<HandleState>,
}

impl AnimationHandle {
    pub(crate) fn new(id: HandleId) -> Self {
        Self {
            id,
            state: Arc::default(),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Ran to completion without being cancelled.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Neither cancelled nor finished.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled() && !self.is_finished()
    }

    pub(crate) fn mark_finished(&self) {
        self.state.finished.store(true, Ordering::Release);
    }
}
