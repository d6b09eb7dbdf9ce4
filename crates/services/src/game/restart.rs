use std::time::Duration;

use hue_core::model::RoundId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Delay between losing a round and the automatic restart.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);

/// Delivered to the session owner when a scheduled restart comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTick {
    pub round: RoundId,
}

/// Receiving half of the restart channel, held by whoever drives the game loop.
#[derive(Debug)]
pub struct RestartEvents {
    rx: mpsc::UnboundedReceiver<RestartTick>,
}

impl RestartEvents {
    /// Wait for the next due restart.
    pub async fn recv(&mut self) -> Option<RestartTick> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for owners without an async loop.
    pub fn try_recv(&mut self) -> Option<RestartTick> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct PendingRestart {
    round: RoundId,
    task: JoinHandle<()>,
}

/// Cancellable deferred restart.
///
/// At most one restart is pending. Scheduling replaces the previous one and
/// cancelling aborts the sleeping task. A tick that was already sent before
/// cancellation is still rejected by [`RestartScheduler::claim`], because
/// only the pending round can be claimed.
#[derive(Debug)]
pub struct RestartScheduler {
    tx: mpsc::UnboundedSender<RestartTick>,
    pending: Option<PendingRestart>,
}

impl RestartScheduler {
    #[must_use]
    pub fn channel() -> (Self, RestartEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, pending: None }, RestartEvents { rx })
    }

    /// Schedule a restart of `round` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, round: RoundId, delay: Duration) {
        self.cancel();
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The owner may have gone away; nothing left to restart then.
            let _ = tx.send(RestartTick { round });
        });
        debug!(round = %round, delay_ms = delay.as_millis(), "restart scheduled");
        self.pending = Some(PendingRestart { round, task });
    }

    /// Drop the pending restart, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        pending.task.abort();
        debug!(round = %pending.round, "pending restart cancelled");
        true
    }

    /// Accept a tick if it belongs to the pending restart, clearing it.
    pub fn claim(&mut self, tick: RestartTick) -> bool {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.round == tick.round)
        {
            self.pending = None;
            return true;
        }
        false
    }

    #[must_use]
    pub fn pending_round(&self) -> Option<RoundId> {
        self.pending.as_ref().map(|pending| pending.round)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for RestartScheduler {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}
