use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether a new quiz session may start (auth, subscription, ...).
///
/// The controller only queries it; deciding is someone else's job.
pub trait SessionGate: Send + Sync {
    fn is_session_allowed(&self) -> bool;
}

/// Gate that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl SessionGate for AlwaysAllow {
    fn is_session_allowed(&self) -> bool {
        true
    }
}

/// Gate flipped at runtime, e.g. when a subscription lapses.
#[derive(Debug)]
pub struct SwitchGate {
    allowed: AtomicBool,
}

impl SwitchGate {
    #[must_use]
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed: AtomicBool::new(allowed),
        }
    }

    pub fn set_allowed(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

impl SessionGate for SwitchGate {
    fn is_session_allowed(&self) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }
}
