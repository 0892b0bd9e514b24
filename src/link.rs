//! Link-layer signal sources.
//!
//! The monitor treats the platform's "are we connected at all" indicator as
//! an opaque injected capability: a synchronously readable flag plus a watch
//! channel that fires on up/down transitions. The link-layer signal is less
//! trustworthy than an actual probe (a captive portal reports "up"), so the
//! monitor only ever uses it to short-circuit the offline case and to decide
//! when probing is worth resuming.

use tokio::sync::watch;

/// Injected source of link-layer connectivity state.
pub trait LinkSignal: Send + Sync {
    /// Current link state, readable without waiting.
    fn currently_up(&self) -> bool;

    /// Receiver observing up/down transitions. Each call returns an
    /// independent receiver; dropping it unsubscribes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Default signal for hosts without a usable link-layer indicator: always
/// reports the link as up and never fires a transition, so the monitor relies
/// on probing alone.
pub struct AssumedUp {
    tx: watch::Sender<bool>,
}

impl Default for AssumedUp {
    fn default() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }
}

impl LinkSignal for AssumedUp {
    fn currently_up(&self) -> bool {
        true
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Programmable link signal.
///
/// Embedders wire this to their platform's real notifications (netlink,
/// SCNetworkReachability, browser online/offline events); tests drive it
/// directly to simulate transitions deterministically.
pub struct ManualLink {
    tx: watch::Sender<bool>,
}

impl ManualLink {
    pub fn new(up: bool) -> Self {
        let (tx, _) = watch::channel(up);
        Self { tx }
    }

    /// Report a link state. Only actual changes are propagated to observers.
    pub fn set_up(&self, up: bool) {
        self.tx.send_if_modified(|current| {
            if *current != up {
                *current = up;
                true
            } else {
                false
            }
        });
    }
}

impl LinkSignal for ManualLink {
    fn currently_up(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
