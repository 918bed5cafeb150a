use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// Snapshot of an in-flight operation as seen by the interactive layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressState {
    pub active: bool,
    pub action_text: String,
    /// Completed share in `[0, 1]`; `None` while the total is unknown.
    pub fraction: Option<f32>,
}

/// Write side of the progress state. The core writes, callers only subscribe.
///
/// Several operations may hold the indicator at once (runtime validation and
/// client resolution run side by side); it goes inactive when the last holder
/// disables it.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<ProgressState>,
    holders: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressState::default());
        Self {
            inner: Arc::new(Inner {
                tx,
                holders: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.inner.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressState {
        self.inner.tx.borrow().clone()
    }

    pub fn enable(&self, action_text: impl Into<String>) {
        let action_text = action_text.into();
        self.inner.tx.send_modify(|state| {
            self.inner.holders.fetch_add(1, Ordering::SeqCst);
            state.active = true;
            state.action_text = action_text;
            state.fraction = None;
        });
    }

    pub fn set_fraction(&self, fraction: Option<f32>) {
        let fraction = fraction.map(|value| value.clamp(0.0, 1.0));
        self.inner.tx.send_if_modified(|state| {
            if state.fraction == fraction {
                return false;
            }
            state.fraction = fraction;
            true
        });
    }

    pub fn disable(&self) {
        self.inner.tx.send_modify(|state| {
            let remaining = self
                .inner
                .holders
                .load(Ordering::SeqCst)
                .saturating_sub(1);
            self.inner.holders.store(remaining, Ordering::SeqCst);
            if remaining == 0 {
                state.active = false;
                state.action_text.clear();
                state.fraction = None;
            }
        });
    }

    /// Enable the indicator until the returned guard is dropped.
    pub fn begin(&self, action_text: impl Into<String>) -> ProgressGuard<'_> {
        self.enable(action_text);
        ProgressGuard { reporter: self }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Disables its reporter on drop, whichever way the holder exits.
#[must_use = "progress is disabled as soon as the guard is dropped"]
pub struct ProgressGuard<'a> {
    reporter: &'a ProgressReporter,
}

impl ProgressGuard<'_> {
    pub fn set_action_text(&self, action_text: impl Into<String>) {
        let action_text = action_text.into();
        self.reporter
            .inner
            .tx
            .send_modify(|state| state.action_text = action_text);
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.reporter.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_and_disable_toggle_state() {
        let reporter = ProgressReporter::new();
        reporter.enable("Downloading client v1.0.0...");
        reporter.set_fraction(Some(0.25));
        let state = reporter.snapshot();
        assert!(state.active);
        assert_eq!(state.action_text, "Downloading client v1.0.0...");
        assert_eq!(state.fraction, Some(0.25));

        reporter.disable();
        assert_eq!(reporter.snapshot(), ProgressState::default());
    }

    #[test]
    fn fraction_is_clamped() {
        let reporter = ProgressReporter::new();
        reporter.set_fraction(Some(1.7));
        assert_eq!(reporter.snapshot().fraction, Some(1.0));
        reporter.set_fraction(Some(-0.5));
        assert_eq!(reporter.snapshot().fraction, Some(0.0));
    }

    #[test]
    fn guard_disables_on_early_return() {
        fn failing(reporter: &ProgressReporter) -> Result<(), String> {
            let _guard = reporter.begin("working");
            Err("boom".into())
        }

        let reporter = ProgressReporter::new();
        assert!(failing(&reporter).is_err());
        assert!(!reporter.snapshot().active);
    }

    #[test]
    fn stays_active_until_last_holder_exits() {
        let reporter = ProgressReporter::new();
        let first = reporter.begin("runtime");
        let second = reporter.begin("client");
        drop(first);
        assert!(reporter.snapshot().active);
        drop(second);
        assert!(!reporter.snapshot().active);
    }

    #[test]
    fn extra_disable_is_harmless() {
        let reporter = ProgressReporter::new();
        reporter.disable();
        reporter.enable("again");
        assert!(reporter.snapshot().active);
        reporter.disable();
        assert!(!reporter.snapshot().active);
    }

    #[tokio::test]
    async fn subscribers_observe_updates() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        reporter.enable("fetching");
        rx.changed().await.expect("sender should still be alive");
        assert!(rx.borrow_and_update().active);
    }
}
