// ABOUTME: Logging setup for the binary and scoped suppression for bulk operations
// ABOUTME: Suppression is a guard value so logging comes back on every exit path

use tracing::subscriber::{DefaultGuard, NoSubscriber};
use tracing_subscriber::EnvFilter;

/// Install the process-wide fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise INFO, or DEBUG when `verbose`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Keeps this thread's logging silenced until dropped.
///
/// Dropping the guard reinstates whatever dispatcher was active when it was
/// acquired, including when the guarded operation returns an error or panics.
#[must_use = "logging is restored as soon as the guard is dropped"]
pub struct QuietGuard {
    guard: Option<DefaultGuard>,
}

impl QuietGuard {
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}

/// Silence logging for the current thread when `enabled`; otherwise a no-op guard.
pub fn quiet(enabled: bool) -> QuietGuard {
    QuietGuard {
        guard: enabled.then(|| tracing::subscriber::set_default(NoSubscriber::default())),
    }
}
