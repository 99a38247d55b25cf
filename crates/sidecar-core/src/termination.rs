//! Termination notification channel
//!
//! A single-slot channel between whatever listens for OS signals and the
//! [`LifecycleController`](crate::LifecycleController). The controller
//! only looks at it at fixed yield points, so a notification sent while a
//! change is being submitted or polled waits in the slot.

use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// A termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Create a connected sender/receiver pair with room for one notification
pub fn channel() -> (TerminationSender, TerminationReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TerminationSender { tx }, TerminationReceiver { rx })
}

/// Producer half, owned by the signal listener
#[derive(Debug, Clone)]
pub struct TerminationSender {
    tx: mpsc::Sender<TerminationSignal>,
}

impl TerminationSender {
    /// Deliver a notification
    ///
    /// Returns `false` when the slot is already taken or the controller is
    /// gone. Only the first notification matters, so the extra one is dropped.
    pub fn notify(&self, signal: TerminationSignal) -> bool {
        self.tx.try_send(signal).is_ok()
    }
}

/// Consumer half, owned by the controller
#[derive(Debug)]
pub struct TerminationReceiver {
    rx: mpsc::Receiver<TerminationSignal>,
}

impl TerminationReceiver {
    /// Take a pending notification without waiting
    ///
    /// A closed channel with nothing pending reads as "no signal".
    pub fn check(&mut self) -> Option<TerminationSignal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for a notification
    ///
    /// Returns `None` if every sender was dropped without sending.
    pub async fn wait(&mut self) -> Option<TerminationSignal> {
        self.rx.recv().await
    }
}
