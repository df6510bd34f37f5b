use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set once startup has finished; requests other than health checks are
/// refused until then.
#[derive(Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let readiness = Readiness::new();
        let handle = readiness.clone();
        assert!(!handle.is_ready());

        readiness.mark_ready();
        assert!(handle.is_ready());
    }
}
