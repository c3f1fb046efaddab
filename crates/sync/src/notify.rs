//! Single-slot, auto-expiring status message.
//!
//! Every mutation attempt reports exactly one notice; a new notice replaces
//! the visible one rather than queueing behind it. The auto-dismiss timer
//! is an explicit task owned by the notifier, aborted on [`Notifier::show`]
//! and [`Notifier::dismiss`] rather than left to fire into a stale slot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Whether a notice reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A user-visible status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

/// Cheaply cloneable handle to the single notification slot.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    tx: watch::Sender<Option<Notice>>,
    ttl: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Notifier {
    /// Create a notifier whose notices auto-dismiss after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tx: watch::channel(None).0,
                ttl,
                timer: Mutex::new(None),
            }),
        }
    }

    /// Observe the slot. Receives `Some(notice)` on every show and `None`
    /// on dismiss (user-triggered or timer).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.tx.subscribe()
    }

    /// The currently visible notice, if any.
    #[must_use]
    pub fn current(&self) -> Option<Notice> {
        self.inner.tx.borrow().clone()
    }

    /// Show a notice, replacing any visible one and restarting the
    /// auto-dismiss clock.
    pub fn show(&self, text: impl Into<String>, kind: NoticeKind) {
        let notice = Notice {
            text: text.into(),
            kind,
        };
        debug!(kind = ?notice.kind, text = %notice.text, "showing notice");

        self.inner.tx.send_replace(Some(notice));
        self.arm_timer();
    }

    /// Shorthand for a success notice.
    pub fn success(&self, text: impl Into<String>) {
        self.show(text, NoticeKind::Success);
    }

    /// Shorthand for an error notice.
    pub fn error(&self, text: impl Into<String>) {
        self.show(text, NoticeKind::Error);
    }

    /// Clear the slot and cancel the pending timer.
    pub fn dismiss(&self) {
        self.cancel_timer();
        self.inner.tx.send_replace(None);
    }

    fn arm_timer(&self) {
        self.cancel_timer();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.ttl).await;
            // A newer show() would have aborted this task already, so the
            // slot still holds the notice this timer was armed for.
            inner.tx.send_replace(None);
        });

        if let Ok(mut timer) = self.inner.timer.lock() {
            *timer = Some(handle);
        }
    }

    fn cancel_timer(&self) {
        if let Ok(mut timer) = self.inner.timer.lock()
            && let Some(handle) = timer.take()
        {
            handle.abort();
        }
    }
}
