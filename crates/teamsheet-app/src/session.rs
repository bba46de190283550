// Fixture session: one fixture's periods and selections, plus the async
// round trips to the roster, storage and notification collaborators.
//
// All edits happen synchronously on the session. Async calls read what they
// need before awaiting and apply results only after the call succeeds, so a
// failed load leaves the previous state untouched and a failed save leaves
// the edit in place, marked dirty.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use teamsheet_core::config::SelectionConfig;
use teamsheet_core::error::{ProviderError, ValidationError};
use teamsheet_core::formation::reconcile::{self, ExportEntry, Imported};
use teamsheet_core::formation::selection::SUBSTITUTE_SLOT_PREFIX;
use teamsheet_core::formation::{
    catalog, CaptaincyTracker, Format, PeriodManager, PeriodRecord, PickAction, Picker, PlayerPool,
    SlotId,
};
use teamsheet_core::provider::{
    NotificationDispatcher, NotificationEvent, NotificationKind, PersistenceProvider, RosterProvider,
};
use teamsheet_core::types::{
    FixtureId, Minutes, PerformanceCategory, PeriodId, Player, PlayerId, TeamId,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no active period")]
    NoActivePeriod,
}

/// What a successful load found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub players: usize,
    pub periods: usize,
    pub selections: usize,
    /// Position codes in storage that the fixture's format does not know.
    pub unknown_positions: Vec<String>,
    /// Position codes stored on more than one row of a period.
    pub repeated_positions: Vec<String>,
    /// Player stored with the captain flag, if any.
    pub stored_captain: Option<PlayerId>,
}

// ---------------------------------------------------------------------------
// FixtureSession
// ---------------------------------------------------------------------------

pub struct FixtureSession {
    fixture: FixtureId,
    team: TeamId,
    pool: PlayerPool,
    availability: Option<HashSet<PlayerId>>,
    periods: PeriodManager,
    picker: Picker,
    dirty: Arc<Mutex<BTreeSet<PeriodId>>>,
    /// Period list or metadata edited since the last save.
    periods_changed: bool,
    defaults: SelectionConfig,
}

impl FixtureSession {
    /// An empty session in the configured default format.
    pub fn new(fixture: FixtureId, team: TeamId, defaults: SelectionConfig) -> Self {
        Self::with_format(fixture, team, defaults.default_format, defaults)
    }

    pub fn with_format(fixture: FixtureId, team: TeamId, format: Format, defaults: SelectionConfig) -> Self {
        let dirty = Arc::new(Mutex::new(BTreeSet::new()));
        let mut periods = PeriodManager::new(format);
        track_dirty(&mut periods, &dirty);
        Self {
            fixture,
            team,
            pool: PlayerPool::default(),
            availability: None,
            periods,
            picker: Picker::new(),
            dirty,
            periods_changed: false,
            defaults,
        }
    }

    pub fn fixture(&self) -> &FixtureId {
        &self.fixture
    }

    pub fn team(&self) -> &TeamId {
        &self.team
    }

    pub fn periods(&self) -> &PeriodManager {
        &self.periods
    }

    pub fn pool(&self) -> &PlayerPool {
        &self.pool
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    // -- Loading -----------------------------------------------------------

    /// Fetch the roster and stored selections and rebuild the session from
    /// them. On any error the session keeps its previous state.
    ///
    /// A fixture with nothing stored starts with a single "First Half".
    pub async fn load(
        &mut self,
        roster: &dyn RosterProvider,
        store: &dyn PersistenceProvider,
    ) -> Result<LoadSummary, SessionError> {
        let players = roster.fetch_roster(&self.team).await?;
        let stored_format = store.load_format(&self.fixture).await?;
        let period_records = store.load_periods(&self.fixture).await?;
        let rows = store.load_selections(&self.fixture).await?;

        let format = stored_format.unwrap_or(self.periods.format());
        let mut periods = PeriodManager::new(format);
        let mut summary = LoadSummary {
            players: players.len(),
            periods: period_records.len(),
            ..LoadSummary::default()
        };

        for record in &period_records {
            periods.restore_period(record.id, record.label.clone(), record.duration);
        }
        if periods.is_empty() {
            periods.add_period();
            summary.periods = 1;
        }

        let records_by_period = group_by_period(rows, &self.defaults.default_category);
        for (period_id, records) in records_by_period {
            let Some(period) = periods.period_mut(period_id) else {
                warn!("Ignoring {} selections for unknown period {}", records.len(), period_id);
                continue;
            };
            let Imported {
                selections,
                performance,
                captain,
                unknown_positions,
                repeated_positions,
            } = reconcile::from_import(&records, format);
            summary.selections += selections.len();
            merge_codes(&mut summary.unknown_positions, unknown_positions);
            merge_codes(&mut summary.repeated_positions, repeated_positions);
            if captain.is_some() {
                summary.stored_captain = captain;
            }
            period.replace_all(selections, performance);
        }

        // Commit: nothing below can fail.
        track_dirty(&mut periods, &self.dirty);
        self.pool.replace(Arc::new(players));
        self.periods = periods;
        self.picker.clear();
        self.periods_changed = false;
        self.dirty_set().clear();

        info!(
            "Loaded fixture {}: {} players, {} periods, {} selections",
            self.fixture, summary.players, summary.periods, summary.selections
        );
        Ok(summary)
    }

    /// Install a roster directly, e.g. after an out-of-band refresh.
    pub fn set_roster(&mut self, players: Vec<Player>) {
        self.pool.replace(Arc::new(players));
    }

    /// Limit the selectable players to `ids`. `None` or an empty set means
    /// everyone in the roster.
    pub fn set_availability(&mut self, ids: Option<HashSet<PlayerId>>) {
        self.availability = ids;
    }

    /// Players that may be selected, in roster order.
    pub fn available_players(&self) -> Vec<&Player> {
        self.pool.resolve(self.availability.as_ref())
    }

    /// Available players not yet placed in the active period.
    pub fn unplaced_players(&self) -> Vec<&Player> {
        let active = self.periods.active();
        self.available_players()
            .into_iter()
            .filter(|p| active.map_or(true, |period| period.store().slot_of(&p.id).is_none()))
            .collect()
    }

    // -- Editing the active period -----------------------------------------

    /// Place a player in a slot of the active period, returning any slot the
    /// player was moved out of.
    pub fn place(&mut self, slot: SlotId, player: PlayerId) -> Result<Option<SlotId>, SessionError> {
        self.check_slot(&slot)?;
        self.check_player(&player)?;
        let period = self.periods.active_mut().ok_or(SessionError::NoActivePeriod)?;
        Ok(period.place_in(slot, player))
    }

    /// Put a player in the first free substitute slot.
    pub fn bench(&mut self, player: PlayerId) -> Result<SlotId, SessionError> {
        let slot = self
            .periods
            .active()
            .ok_or(SessionError::NoActivePeriod)?
            .store()
            .next_substitute_slot();
        self.place(slot.clone(), player)?;
        Ok(slot)
    }

    pub fn remove(&mut self, slot: &SlotId) -> Result<(), SessionError> {
        let period = self.periods.active_mut().ok_or(SessionError::NoActivePeriod)?;
        period.remove(slot);
        Ok(())
    }

    pub fn move_assignment(&mut self, from: &SlotId, to: &SlotId) -> Result<bool, SessionError> {
        self.check_slot(to)?;
        let period = self.periods.active_mut().ok_or(SessionError::NoActivePeriod)?;
        Ok(period.move_assignment(from, to))
    }

    pub fn toggle_substitution(&mut self, slot: &SlotId) -> Result<Option<bool>, SessionError> {
        let period = self.periods.active_mut().ok_or(SessionError::NoActivePeriod)?;
        Ok(period.toggle_substitution(slot))
    }

    pub fn set_performance(&mut self, player: &PlayerId, category: &str) -> Result<bool, SessionError> {
        let category = PerformanceCategory::new(category);
        if !self.defaults.categories.contains(&category) {
            return Err(ValidationError::Invalid {
                field: "performance_category",
                message: format!("unknown category `{category}`"),
            }
            .into());
        }
        let period = self.periods.active_mut().ok_or(SessionError::NoActivePeriod)?;
        Ok(period.set_performance(player, category))
    }

    // -- Click-to-place ----------------------------------------------------

    pub fn click_player(&mut self, player: PlayerId) {
        self.picker.click_player(player);
    }

    /// Click a slot; applies the resulting placement or move, if any.
    pub fn click_slot(&mut self, slot: SlotId) -> Result<Option<PickAction>, SessionError> {
        let store = self
            .periods
            .active()
            .ok_or(SessionError::NoActivePeriod)?
            .store();
        let action = self.picker.click_slot(slot, store);
        match &action {
            Some(PickAction::Place { slot, player_id }) => {
                self.place(slot.clone(), player_id.clone())?;
            }
            Some(PickAction::Move { from, to }) => {
                self.move_assignment(from, to)?;
            }
            None => {}
        }
        Ok(action)
    }

    // -- Periods -----------------------------------------------------------

    /// Add a period using the configured default length.
    pub fn add_period(&mut self) -> PeriodId {
        let id = self.periods.add_period();
        self.periods.set_duration(id, self.defaults.default_period_minutes);
        self.mark_dirty(id);
        self.periods_changed = true;
        id
    }

    pub fn remove_period(&mut self, id: PeriodId) -> bool {
        let removed = self.periods.remove_period(id);
        if removed {
            self.dirty_set().remove(&id);
            self.periods_changed = true;
        }
        removed
    }

    pub fn set_active(&mut self, id: PeriodId) {
        self.picker.clear();
        self.periods.set_active(id);
    }

    pub fn rename_period(&mut self, id: PeriodId, label: &str) -> Result<bool, SessionError> {
        if label.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "period.label" }.into());
        }
        let renamed = self.periods.rename_period(id, label.trim());
        if renamed {
            self.mark_dirty(id);
            self.periods_changed = true;
        }
        Ok(renamed)
    }

    pub fn set_duration(&mut self, id: PeriodId, minutes: u32) -> Result<bool, SessionError> {
        let minutes = Minutes::new(minutes)?;
        let changed = self.periods.set_duration(id, minutes);
        if changed {
            self.mark_dirty(id);
            self.periods_changed = true;
        }
        Ok(changed)
    }

    /// Switch format; returns the number of assignments vacated.
    pub fn change_format(&mut self, format: Format) -> usize {
        self.picker.clear();
        if format != self.periods.format() {
            self.periods_changed = true;
        }
        self.periods
            .change_format(format)
            .iter()
            .map(|(_, vacated)| vacated.len())
            .sum()
    }

    // -- Captaincy ---------------------------------------------------------

    /// Make `player` the team captain. The player should be on this team's
    /// roster; that is not checked.
    pub fn set_captain(&self, captains: &mut CaptaincyTracker, player: PlayerId) -> Option<PlayerId> {
        captains.set_captain(self.team.clone(), player)
    }

    // -- Views -------------------------------------------------------------

    /// Starting lineup of the active period.
    pub fn export(&self) -> Vec<ExportEntry> {
        self.periods
            .active()
            .map(|p| reconcile::to_export(p.selections()))
            .unwrap_or_default()
    }

    pub fn is_dirty(&self, id: PeriodId) -> bool {
        self.dirty_set().contains(&id)
    }

    pub fn dirty_periods(&self) -> Vec<PeriodId> {
        self.dirty_set().iter().copied().collect()
    }

    // -- Saving ------------------------------------------------------------

    /// Save the active period.
    pub async fn save_active(
        &mut self,
        store: &dyn PersistenceProvider,
        notifier: &dyn NotificationDispatcher,
        captains: &CaptaincyTracker,
    ) -> Result<(), SessionError> {
        let id = self.periods.active_id().ok_or(SessionError::NoActivePeriod)?;
        self.save_period(id, store, notifier, captains).await
    }

    /// Save period metadata and one period's selections. A failed save keeps
    /// the period dirty. The notification is sent after the save commits and
    /// its failure is only logged.
    pub async fn save_period(
        &mut self,
        id: PeriodId,
        store: &dyn PersistenceProvider,
        notifier: &dyn NotificationDispatcher,
        captains: &CaptaincyTracker,
    ) -> Result<(), SessionError> {
        let Some(period) = self.periods.period(id) else {
            return Ok(());
        };
        let records = reconcile::to_records(period, &self.team, captains, &self.defaults.default_category);

        let period_count = match self.save_metadata(store).await {
            Ok(count) => count,
            Err(e) => {
                self.mark_dirty(id);
                return Err(e.into());
            }
        };
        if let Err(e) = store.save_selections(&self.fixture, id, &records).await {
            self.mark_dirty(id);
            warn!("Saving period {} of fixture {} failed: {}", id, self.fixture, e);
            return Err(e.into());
        }
        self.dirty_set().remove(&id);
        info!("Saved {} selections for fixture {} period {}", records.len(), self.fixture, id);

        if std::mem::take(&mut self.periods_changed) {
            self.send(notifier, NotificationKind::PeriodsChanged { count: period_count })
                .await;
        }
        self.send(
            notifier,
            NotificationKind::SelectionSaved {
                period: id,
                players: records.len(),
            },
        )
        .await;
        Ok(())
    }

    /// Store the fixture format and period list. Returns the period count.
    async fn save_metadata(&self, store: &dyn PersistenceProvider) -> Result<usize, ProviderError> {
        let period_records: Vec<PeriodRecord> = self.periods.periods().iter().map(PeriodRecord::from).collect();
        let saved = async {
            store.save_format(&self.fixture, self.periods.format()).await?;
            store.save_periods(&self.fixture, &period_records).await
        }
        .await;
        if let Err(e) = &saved {
            warn!("Saving periods for fixture {} failed: {}", self.fixture, e);
        }
        saved.map(|()| period_records.len())
    }

    async fn send(&self, notifier: &dyn NotificationDispatcher, kind: NotificationKind) {
        let event = NotificationEvent::now(self.fixture.clone(), self.team.clone(), kind);
        if let Err(e) = notifier.notify(&event).await {
            warn!("Notification for fixture {} failed: {}", self.fixture, e);
        }
    }

    /// Save every dirty period, stopping at the first failure. Period list
    /// changes with no dirty period behind them (a removal, a format switch
    /// that vacated nothing) are saved on their own. Returns the number of
    /// periods whose selections were saved.
    pub async fn save_dirty(
        &mut self,
        store: &dyn PersistenceProvider,
        notifier: &dyn NotificationDispatcher,
        captains: &CaptaincyTracker,
    ) -> Result<usize, SessionError> {
        let dirty = self.dirty_periods();
        for id in &dirty {
            self.save_period(*id, store, notifier, captains).await?;
        }
        if self.periods_changed {
            let count = self.save_metadata(store).await?;
            self.periods_changed = false;
            info!("Saved {} periods for fixture {}", count, self.fixture);
            self.send(notifier, NotificationKind::PeriodsChanged { count }).await;
        }
        Ok(dirty.len())
    }

    // -- Helpers -----------------------------------------------------------

    fn check_slot(&self, slot: &SlotId) -> Result<(), ValidationError> {
        if slot.is_substitute() {
            let n = slot
                .as_str()
                .strip_prefix(SUBSTITUTE_SLOT_PREFIX)
                .and_then(|rest| rest.parse::<usize>().ok())
                .filter(|n| SlotId::substitute(*n) == *slot)
                .ok_or_else(|| ValidationError::Invalid {
                    field: "slot",
                    message: format!("malformed substitute slot `{slot}`"),
                })?;
            if n == 0 || n > self.defaults.max_substitutes {
                return Err(ValidationError::Invalid {
                    field: "slot",
                    message: format!(
                        "substitute slot {n} outside 1..={}",
                        self.defaults.max_substitutes
                    ),
                });
            }
            return Ok(());
        }
        if catalog::find(self.periods.format(), slot.as_str()).is_none() {
            return Err(ValidationError::Invalid {
                field: "slot",
                message: format!("`{slot}` is not a position in {}", self.periods.format()),
            });
        }
        Ok(())
    }

    fn check_player(&self, player: &PlayerId) -> Result<(), ValidationError> {
        if player.is_unassigned() {
            return Ok(());
        }
        let restricted_out = self
            .availability
            .as_ref()
            .is_some_and(|ids| !ids.is_empty() && !ids.contains(player));
        if !self.pool.contains(player) || restricted_out {
            return Err(ValidationError::Invalid {
                field: "player",
                message: format!("`{player}` is not available for selection"),
            });
        }
        Ok(())
    }

    fn mark_dirty(&self, id: PeriodId) {
        self.dirty_set().insert(id);
    }

    fn dirty_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<PeriodId>> {
        self.dirty.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn merge_codes(into: &mut Vec<String>, codes: Vec<String>) {
    for code in codes {
        if !into.contains(&code) {
            into.push(code);
        }
    }
}

/// Subscribe `periods` so any change marks its period dirty.
fn track_dirty(periods: &mut PeriodManager, dirty: &Arc<Mutex<BTreeSet<PeriodId>>>) {
    let dirty = Arc::clone(dirty);
    periods.subscribe(Arc::new(move |id: PeriodId, _: &teamsheet_core::formation::Selections| {
        if let Ok(mut set) = dirty.lock() {
            set.insert(id);
        }
    }));
}

/// Split stored rows per period, filling in missing fields.
fn group_by_period(
    rows: Vec<teamsheet_core::formation::PersistedSelection>,
    default_category: &PerformanceCategory,
) -> Vec<(PeriodId, Vec<teamsheet_core::formation::SelectionRecord>)> {
    let mut grouped: Vec<(PeriodId, Vec<_>)> = Vec::new();
    for row in rows {
        let period_id = row.period_id;
        let record = row.into_record(default_category);
        match grouped.iter_mut().find(|(id, _)| *id == period_id) {
            Some((_, records)) => records.push(record),
            None => grouped.push((period_id, vec![record])),
        }
    }
    grouped
}
