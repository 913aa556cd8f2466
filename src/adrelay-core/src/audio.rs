use std::sync::atomic::{AtomicBool, Ordering};

/// The slice of the host's audio subsystem the manager needs: a global mute
/// flag that can be read and written.
pub trait HostAudio: Send + Sync {
    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);
}

/// In-memory mute flag for hosts without an audio engine, and for tests.
#[derive(Debug, Default)]
pub struct MuteFlag {
    muted: AtomicBool,
}

impl MuteFlag {
    pub fn new(muted: bool) -> Self {
        Self {
            muted: AtomicBool::new(muted),
        }
    }
}

impl HostAudio for MuteFlag {
    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}
