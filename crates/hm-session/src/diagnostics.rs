//! Scoped suppression of surrogate diagnostics.

use tracing::subscriber::{DefaultGuard, NoSubscriber};

/// Silences `tracing` output on the current thread while alive.
///
/// The previous dispatcher is restored when the guard drops, so an early
/// return, an error or a panic inside the scope cannot leave diagnostics
/// silenced. Other threads are unaffected.
#[must_use = "diagnostics are restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DiagnosticGuard {
    previous: Option<DefaultGuard>,
}

impl DiagnosticGuard {
    /// Install a silent dispatcher for the current thread.
    pub fn suppress() -> Self {
        Self {
            previous: Some(tracing::subscriber::set_default(NoSubscriber::default())),
        }
    }

    /// A guard that leaves the current dispatcher in place.
    pub fn passthrough() -> Self {
        Self { previous: None }
    }

    /// Suppress unless `debug` is set.
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            Self::passthrough()
        } else {
            Self::suppress()
        }
    }

    pub fn is_suppressing(&self) -> bool {
        self.previous.is_some()
    }
}
