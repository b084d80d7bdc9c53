use std::fmt::{self, Display};

use tokio::sync::watch;

/// Lifecycle state of a tool server session.
///
/// States only ever move forward in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// The process is spawned and the handshake is in flight.
    Starting,
    /// The handshake completed; requests are admitted.
    Ready,
    /// Teardown has begun; new requests are rejected.
    Closing,
    /// The session is gone.
    Closed,
}

impl SessionState {
    /// Returns `true` once teardown has begun or finished.
    #[inline]
    pub fn is_shut_down(self) -> bool {
        self >= SessionState::Closing
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Shared, monotonic session state.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<SessionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Starting);
        Self { tx }
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Moves to `to` if it is ahead of the current state. Returns whether
    /// this call made the transition.
    pub fn advance(&self, to: SessionState) -> bool {
        self.tx.send_if_modified(|state| {
            if to > *state {
                trace!("session state {state} -> {to}");
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Waits until the state reaches at least `target`.
    #[cfg(test)]
    pub async fn wait_for(&self, target: SessionState) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        rx.wait_for(|state| *state >= target).await.ok();
    }
}
