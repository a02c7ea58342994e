//! One matchmaking attempt, end to end
//!
//! Read the pool, select a group, commit the lobby, notify. The commit is the
//! single atomic step: it removes the selected players and writes the lobby
//! record together, or refuses when any of them has already left. Nothing is
//! sent to players until that step has succeeded.

use crate::config::MatchmakingSettings;
use crate::connection::{Notifier, NotifyOutcome};
use crate::error::Result;
use crate::matchmaking::selector::select_group;
use crate::metrics::MetricsCollector;
use crate::store::{CommitOutcome, LobbyStore, MatchStore, WaitingPool};
use crate::types::{Lobby, PlayerId, SkillRating};
use crate::utils::{current_timestamp, generate_lobby_id, seconds_since};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Group size and spread threshold used for every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingRules {
    pub lobby_size: usize,
    pub max_skill_spread: SkillRating,
}

impl Default for MatchingRules {
    fn default() -> Self {
        Self::from(&MatchmakingSettings::default())
    }
}

impl From<&MatchmakingSettings> for MatchingRules {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            lobby_size: settings.lobby_size,
            max_skill_spread: settings.max_skill_spread,
        }
    }
}

/// What a single attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A lobby was committed and its players notified
    Matched(Lobby),
    /// Pool empty or no compatible group
    NoMatch,
    /// The selected group was partly claimed elsewhere; nothing changed
    Conflict { missing: Vec<PlayerId> },
}

impl TickOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Matched(_) => "matched",
            TickOutcome::NoMatch => "no_match",
            TickOutcome::Conflict { .. } => "conflict",
        }
    }
}

pub struct MatchCommitter {
    store: Arc<dyn MatchStore>,
    notifier: Arc<dyn Notifier>,
    rules: MatchingRules,
    metrics: Arc<MetricsCollector>,
}

impl MatchCommitter {
    pub fn new(
        store: Arc<dyn MatchStore>,
        notifier: Arc<dyn Notifier>,
        rules: MatchingRules,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            notifier,
            rules,
            metrics,
        }
    }

    pub fn rules(&self) -> MatchingRules {
        self.rules
    }

    /// Run one attempt.
    ///
    /// Store failures are returned as errors and leave the pool as it was;
    /// notification problems are logged and never undo a committed lobby.
    pub async fn run_once(&self) -> Result<TickOutcome> {
        let pool = self.store.read_all().await?;
        self.metrics.set_players_waiting(pool.len());

        if pool.is_empty() {
            return Ok(TickOutcome::NoMatch);
        }

        let Some(group) = select_group(&pool, self.rules.lobby_size, self.rules.max_skill_spread)
        else {
            debug!(
                waiting = pool.len(),
                "No group within spread {}", self.rules.max_skill_spread
            );
            return Ok(TickOutcome::NoMatch);
        };

        let lobby = Lobby::from_group(generate_lobby_id(), &group, current_timestamp());

        if let CommitOutcome::Conflict { missing } = self.store.commit_lobby(&lobby).await? {
            warn!(
                lobby_id = %lobby.lobby_id,
                "Selected players no longer queued: {:?}", missing
            );
            return Ok(TickOutcome::Conflict { missing });
        }

        info!(
            lobby_id = %lobby.lobby_id,
            players = lobby.player_ids.len(),
            skill_spread = lobby.skill_spread,
            "Lobby created"
        );

        let wait_times: Vec<f64> = group
            .iter()
            .map(|entry| seconds_since(entry.enqueued_at))
            .collect();
        self.metrics.record_lobby_created(&wait_times);
        self.metrics
            .set_players_waiting(pool.len().saturating_sub(group.len()));

        self.notify_players(&lobby).await;

        Ok(TickOutcome::Matched(lobby))
    }

    async fn notify_players(&self, lobby: &Lobby) {
        let deliveries = lobby
            .player_ids
            .iter()
            .map(|player_id| self.notifier.notify(player_id, &lobby.lobby_id));
        let outcomes = join_all(deliveries).await;

        for (player_id, outcome) in lobby.player_ids.iter().zip(&outcomes) {
            self.metrics.record_notification(outcome.as_str());
            if *outcome == NotifyOutcome::Failed {
                warn!(
                    lobby_id = %lobby.lobby_id,
                    player_id = %player_id,
                    "Player missed lobby notification"
                );
            }
        }
    }
}
