//! Background task that drives the committer on a fixed cadence

use crate::matchmaking::committer::{MatchCommitter, TickOutcome};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal; the task has exited
    Stopped,
}

/// Handle to a spawned matchmaking loop
pub struct LoopHandle {
    state: watch::Receiver<LoopState>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Wait for the task to exit after cancellation
    pub async fn join(self) -> anyhow::Result<()> {
        self.task.await?;
        Ok(())
    }
}

pub struct MatchmakingLoop {
    committer: Arc<MatchCommitter>,
    tick_interval: Duration,
    metrics: Arc<MetricsCollector>,
}

impl MatchmakingLoop {
    pub fn new(
        committer: Arc<MatchCommitter>,
        tick_interval: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            committer,
            tick_interval,
            metrics,
        }
    }

    /// Start ticking until `cancel` fires.
    ///
    /// The first attempt runs immediately. Ticks never overlap: a slow attempt
    /// delays the next one and missed intervals are skipped. Cancellation is
    /// observed between attempts, so an in-flight attempt always finishes.
    pub fn spawn(self, cancel: CancellationToken) -> LoopHandle {
        let (state_tx, state_rx) = watch::channel(LoopState::Running);
        let task = tokio::spawn(self.run(cancel, state_tx));

        LoopHandle {
            state: state_rx,
            task,
        }
    }

    async fn run(self, cancel: CancellationToken, state_tx: watch::Sender<LoopState>) {
        info!(
            "Matchmaking loop started (interval {:?}, lobby size {}, max spread {})",
            self.tick_interval,
            self.committer.rules().lobby_size,
            self.committer.rules().max_skill_spread
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        state_tx.send_replace(LoopState::Stopped);
        info!("Matchmaking loop stopped");
    }

    /// One attempt; failures are logged and the loop carries on
    pub async fn tick(&self) {
        let timer = self.metrics.start_timer();

        let label = match self.committer.run_once().await {
            Ok(outcome) => {
                if let TickOutcome::NoMatch = outcome {
                    debug!("No match this tick");
                }
                outcome.label()
            }
            Err(e) => {
                error!("Matchmaking tick failed: {:#}", e);
                "error"
            }
        };

        self.metrics.record_tick(label, timer.stop());
    }
}
