//! Typed notifications between the component that starts a run and the ones
//! that display its progress.

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::SignalClosed;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunSignal {
    /// A run for `goal` was requested.
    Execute { goal: String },
    /// The run for `goal` finished.
    Complete { goal: String, outcome: RunOutcome },
}

/// Creates a connected sender/receiver pair.
pub fn run_channel() -> (RunSignalSender, RunSignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RunSignalSender { tx }, RunSignalReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct RunSignalSender {
    tx: mpsc::UnboundedSender<RunSignal>,
}

impl RunSignalSender {
    pub fn execute(&self, goal: impl Into<String>) -> Result<(), SignalClosed> {
        self.send(RunSignal::Execute { goal: goal.into() })
    }

    pub fn complete(
        &self,
        goal: impl Into<String>,
        outcome: RunOutcome,
    ) -> Result<(), SignalClosed> {
        self.send(RunSignal::Complete {
            goal: goal.into(),
            outcome,
        })
    }

    pub fn send(&self, signal: RunSignal) -> Result<(), SignalClosed> {
        debug!(?signal, "run signal");
        self.tx.send(signal).map_err(|_| SignalClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct RunSignalReceiver {
    rx: mpsc::UnboundedReceiver<RunSignal>,
}

impl RunSignalReceiver {
    /// Waits for the next signal; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<RunSignal> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RunSignal> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signals_arrive_in_order() {
        let (tx, mut rx) = run_channel();
        let worker = tx.clone();
        tokio::spawn(async move {
            worker.execute("summarize tabs").expect("receiver alive");
            worker
                .complete("summarize tabs", RunOutcome::Failed("timeout".into()))
                .expect("receiver alive");
        })
        .await
        .expect("join");

        assert_eq!(
            rx.recv().await,
            Some(RunSignal::Execute {
                goal: "summarize tabs".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(RunSignal::Complete {
                goal: "summarize tabs".into(),
                outcome: RunOutcome::Failed("timeout".into()),
            })
        );
        assert_eq!(rx.try_recv(), None);

        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn send_fails_after_receiver_drops() {
        let (tx, rx) = run_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.execute("x"), Err(SignalClosed));
    }
}
