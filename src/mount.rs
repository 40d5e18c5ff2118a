/// Mount gate between core bootstrap and the UI frontend.
///
/// The frontend builds its panels asynchronously and signals readiness once
/// they all exist. Bootstrap waits on that signal and runs exactly once, no
/// matter how many times readiness is reported. The wait is bounded: if no
/// signal arrives, we log a warning and carry on without binding.
use std::time::Duration;
use tokio::sync::watch;

/// How long bootstrap waits for the frontend before giving up.
pub const READY_WAIT: Duration = Duration::from_secs(10);

pub struct ReadyNotifier {
    tx: watch::Sender<bool>,
}

pub struct ReadyGate {
    rx: watch::Receiver<bool>,
    bound: bool,
}

pub fn ready_channel() -> (ReadyNotifier, ReadyGate) {
    let (tx, rx) = watch::channel(false);
    (ReadyNotifier { tx }, ReadyGate { rx, bound: false })
}

impl ReadyNotifier {
    /// Report that every required panel exists. Safe to call repeatedly.
    pub fn notify(&self) {
        let _ = self.tx.send(true);
    }
}

impl ReadyGate {
    /// Wait up to `wait` for the ready signal, then run `bind`.
    ///
    /// Returns true if `bind` ran. Runs it at most once across all calls;
    /// later calls and repeated signals are no-ops.
    pub async fn bind_once<F: FnOnce()>(&mut self, wait: Duration, bind: F) -> bool {
        if self.bound {
            return false;
        }

        match tokio::time::timeout(wait, self.rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => {
                tracing::warn!("frontend went away before signaling ready; skipping bind");
                return false;
            }
            Err(_) => {
                tracing::warn!("no ready signal within {wait:?}; skipping bind");
                return false;
            }
        }

        self.bound = true;
        bind();
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_after_signal() {
        let (notifier, mut gate) = ready_channel();
        notifier.notify();

        let mut ran = 0;
        let bound = gate.bind_once(Duration::from_secs(1), || ran += 1).await;
        assert!(bound);
        assert_eq!(ran, 1);
    }

    #[tokio::test]
    async fn repeated_signals_bind_exactly_once() {
        let (notifier, mut gate) = ready_channel();
        notifier.notify();
        notifier.notify();

        let mut ran = 0;
        assert!(gate.bind_once(Duration::from_secs(1), || ran += 1).await);

        notifier.notify();
        assert!(!gate.bind_once(Duration::from_secs(1), || ran += 1).await);
        assert_eq!(ran, 1);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_wait() {
        let (notifier, mut gate) = ready_channel();

        let mut ran = 0;
        let bound = gate.bind_once(Duration::from_millis(20), || ran += 1).await;
        assert!(!bound);
        assert_eq!(ran, 0);

        // The signal arriving late still allows a bind.
        notifier.notify();
        assert!(gate.bind_once(Duration::from_millis(20), || ran += 1).await);
        assert_eq!(ran, 1);
    }

    #[tokio::test]
    async fn dropped_notifier_gives_up() {
        let (notifier, mut gate) = ready_channel();
        drop(notifier);

        let mut ran = 0;
        assert!(!gate.bind_once(Duration::from_secs(1), || ran += 1).await);
        assert_eq!(ran, 0);
    }
}
