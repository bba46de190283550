// Collaborator contracts: roster source, selection storage, notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::formation::{Format, PeriodRecord, PersistedSelection, SelectionRecord};
use crate::types::{FixtureId, PeriodId, Player, TeamId};

/// Source of team rosters.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn fetch_roster(&self, team: &TeamId) -> Result<Vec<Player>, ProviderError>;
}

/// Storage for fixture periods and their selections.
///
/// `save_selections` replaces everything stored for the period, so two
/// overlapping saves resolve as last-write-wins.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn load_selections(&self, fixture: &FixtureId) -> Result<Vec<PersistedSelection>, ProviderError>;

    async fn save_selections(
        &self,
        fixture: &FixtureId,
        period: PeriodId,
        records: &[SelectionRecord],
    ) -> Result<(), ProviderError>;

    async fn load_periods(&self, fixture: &FixtureId) -> Result<Vec<PeriodRecord>, ProviderError>;

    async fn save_periods(&self, fixture: &FixtureId, periods: &[PeriodRecord]) -> Result<(), ProviderError>;

    /// Formation format of the fixture, or `None` if never saved.
    async fn load_format(&self, fixture: &FixtureId) -> Result<Option<Format>, ProviderError>;

    async fn save_format(&self, fixture: &FixtureId, format: Format) -> Result<(), ProviderError>;
}

/// Something worth telling the squad about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    SelectionSaved { period: PeriodId, players: usize },
    PeriodsChanged { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub fixture: FixtureId,
    pub team: TeamId,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn now(fixture: FixtureId, team: TeamId, kind: NotificationKind) -> Self {
        Self {
            fixture,
            team,
            kind,
            occurred_at: Utc::now(),
        }
    }
}

/// Fire-and-forget delivery of fixture-level changes.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), ProviderError>;
}
