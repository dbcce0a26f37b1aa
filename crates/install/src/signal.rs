//! One-shot readiness flags shared between tasks

use std::sync::Arc;

use tokio::sync::watch;

/// A flag that is set once and can be awaited by any number of tasks.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct Signal {
    state: Arc<watch::Sender<bool>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// A signal that starts out set
    #[must_use]
    pub fn set_already() -> Self {
        let signal = Self::new();
        signal.set();
        signal
    }

    pub fn set(&self) {
        self.state.send_replace(true);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolve once the flag is set
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in self, so this cannot fail
        let _ = rx.wait_for(|set| *set).await;
    }
}

/// Wait for every signal concurrently
pub async fn wait_all(signals: &[Signal]) {
    futures::future::join_all(signals.iter().map(Signal::wait)).await;
}
