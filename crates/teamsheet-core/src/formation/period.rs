// Period manager: the timed segments of a fixture, each with its own
// selection store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::catalog::{self, Format};
use super::selection::{Assignment, SelectionStore, Selections, SlotId};
use crate::types::{Minutes, PerformanceCategory, PeriodId, PlayerId};

/// Callback run after any period's store changes.
pub type PeriodSubscriber = Arc<dyn Fn(PeriodId, &Selections) + Send + Sync>;

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// One timed segment of a fixture with its own slot assignments and
/// per-player performance categories.
#[derive(Debug)]
pub struct Period {
    id: PeriodId,
    pub label: String,
    pub duration: Minutes,
    store: SelectionStore,
    performance: HashMap<PlayerId, PerformanceCategory>,
}

impl Period {
    fn new(id: PeriodId, label: String, duration: Minutes) -> Self {
        Self {
            id,
            label,
            duration,
            store: SelectionStore::new(),
            performance: HashMap::new(),
        }
    }

    pub fn id(&self) -> PeriodId {
        self.id
    }

    pub fn selections(&self) -> &Selections {
        self.store.selections()
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    /// See [`SelectionStore::place`]. A player displaced from `slot` loses
    /// their performance category.
    pub fn place(
        &mut self,
        slot: SlotId,
        player_id: PlayerId,
        position: impl Into<String>,
        is_substitution: bool,
    ) -> Option<SlotId> {
        let displaced = self
            .store
            .get(&slot)
            .map(|a| a.player_id.clone())
            .filter(|occupant| *occupant != player_id);
        let vacated = self.store.place(slot, player_id, position, is_substitution);
        if let Some(occupant) = displaced {
            self.performance.remove(&occupant);
        }
        vacated
    }

    /// Place into the slot's own position code.
    pub fn place_in(&mut self, slot: SlotId, player_id: PlayerId) -> Option<SlotId> {
        let code = slot.position_code().to_string();
        self.place(slot, player_id, code, false)
    }

    /// Clear a slot. The removed player's performance category goes with it.
    pub fn remove(&mut self, slot: &SlotId) -> Option<Assignment> {
        let removed = self.store.remove(slot)?;
        self.performance.remove(&removed.player_id);
        Some(removed)
    }

    pub fn move_assignment(&mut self, from: &SlotId, to: &SlotId) -> bool {
        self.store.move_assignment(from, to)
    }

    pub fn toggle_substitution(&mut self, slot: &SlotId) -> Option<bool> {
        self.store.toggle_substitution(slot)
    }

    /// Replace selections and performance categories wholesale. Categories
    /// for players not in the new selection are discarded.
    pub fn replace_all(
        &mut self,
        selections: Selections,
        performance: HashMap<PlayerId, PerformanceCategory>,
    ) -> Vec<SlotId> {
        let dropped = self.store.replace_all(selections);
        self.performance = performance;
        self.prune_performance();
        dropped
    }

    /// Record the performance category for a player in this period.
    /// Returns `false` if the player holds no slot here.
    pub fn set_performance(&mut self, player_id: &PlayerId, category: PerformanceCategory) -> bool {
        if self.store.slot_of(player_id).is_none() {
            return false;
        }
        self.performance.insert(player_id.clone(), category);
        true
    }

    pub fn performance_of(&self, player_id: &PlayerId) -> Option<&PerformanceCategory> {
        self.performance.get(player_id)
    }

    fn prune_performance(&mut self) {
        let store = &self.store;
        self.performance
            .retain(|player, _| store.slot_of(player).is_some());
    }
}

// ---------------------------------------------------------------------------
// PeriodManager
// ---------------------------------------------------------------------------

/// Owns every period of one fixture plus the pointer to the active one.
pub struct PeriodManager {
    format: Format,
    periods: Vec<Period>,
    active: Option<PeriodId>,
    next_id: u32,
    subscribers: Vec<PeriodSubscriber>,
}

impl fmt::Debug for PeriodManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodManager")
            .field("format", &self.format)
            .field("periods", &self.periods)
            .field("active", &self.active)
            .field("next_id", &self.next_id)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Label given to the `n`th period (1-based) when it is created.
pub fn default_label(n: usize) -> String {
    match n {
        1 => "First Half".to_string(),
        2 => "Second Half".to_string(),
        n => format!("Period {n}"),
    }
}

impl PeriodManager {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            periods: Vec::new(),
            active: None,
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Register a callback for changes to any period, present or future.
    /// Callbacks accumulate; each one sees every period.
    pub fn subscribe(&mut self, subscriber: PeriodSubscriber) {
        for period in &mut self.periods {
            period.store.subscribe(forward(period.id, Arc::clone(&subscriber)));
        }
        self.subscribers.push(subscriber);
    }

    /// Append a period with the default duration and a label derived from
    /// its position. The first period ever added becomes active.
    pub fn add_period(&mut self) -> PeriodId {
        let label = default_label(self.periods.len() + 1);
        let id = PeriodId(self.next_id);
        self.next_id += 1;
        self.insert(Period::new(id, label, Minutes::DEFAULT_PERIOD));
        id
    }

    /// Re-create a period with a known id, e.g. when loading from storage.
    /// Later [`add_period`](Self::add_period) calls never reuse `id`.
    pub fn restore_period(&mut self, id: PeriodId, label: String, duration: Minutes) -> &mut Period {
        if let Some(idx) = self.index_of(id) {
            let period = &mut self.periods[idx];
            period.label = label;
            period.duration = duration;
            return period;
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.insert(Period::new(id, label, duration));
        let idx = self.periods.len() - 1;
        &mut self.periods[idx]
    }

    fn insert(&mut self, mut period: Period) {
        for sub in &self.subscribers {
            period.store.subscribe(forward(period.id, Arc::clone(sub)));
        }
        debug!("Added period {} ({})", period.id, period.label);
        if self.active.is_none() {
            self.active = Some(period.id);
        }
        self.periods.push(period);
    }

    /// Delete a period. If it was active, the previous period becomes active,
    /// else the next one, else nothing.
    pub fn remove_period(&mut self, id: PeriodId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.periods.remove(idx);
        if self.active == Some(id) {
            let fallback = if idx > 0 {
                self.periods.get(idx - 1)
            } else {
                self.periods.first()
            };
            self.active = fallback.map(|p| p.id);
        }
        debug!("Removed period {}; active is now {:?}", id, self.active);
        true
    }

    /// Switch the active period. Unknown ids are ignored.
    pub fn set_active(&mut self, id: PeriodId) {
        if self.index_of(id).is_some() {
            self.active = Some(id);
        }
    }

    pub fn rename_period(&mut self, id: PeriodId, label: impl Into<String>) -> bool {
        match self.period_mut(id) {
            Some(p) => {
                p.label = label.into();
                true
            }
            None => false,
        }
    }

    pub fn set_duration(&mut self, id: PeriodId, duration: Minutes) -> bool {
        match self.period_mut(id) {
            Some(p) => {
                p.duration = duration;
                true
            }
            None => false,
        }
    }

    /// Switch formats, vacating every starting slot whose code does not
    /// exist in the new format. Substitute slots survive. Returns what was
    /// vacated, per period.
    pub fn change_format(&mut self, format: Format) -> Vec<(PeriodId, Vec<(SlotId, Assignment)>)> {
        if format == self.format {
            return Vec::new();
        }
        let mut vacated = Vec::new();
        for period in &mut self.periods {
            let removed = period
                .store
                .retain(|slot, _| slot.is_substitute() || catalog::find(format, slot.position_code()).is_some());
            for (_, a) in &removed {
                period.performance.remove(&a.player_id);
            }
            if !removed.is_empty() {
                vacated.push((period.id, removed));
            }
        }
        info!(
            "Format changed {} -> {}; vacated slots in {} period(s)",
            self.format,
            format,
            vacated.len()
        );
        self.format = format;
        vacated
    }

    pub fn active_id(&self) -> Option<PeriodId> {
        self.active
    }

    pub fn active(&self) -> Option<&Period> {
        self.active.and_then(|id| self.period(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Period> {
        let id = self.active?;
        self.period_mut(id)
    }

    pub fn period(&self, id: PeriodId) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn period_mut(&mut self, id: PeriodId) -> Option<&mut Period> {
        self.periods.iter_mut().find(|p| p.id == id)
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    fn index_of(&self, id: PeriodId) -> Option<usize> {
        self.periods.iter().position(|p| p.id == id)
    }
}

fn forward(id: PeriodId, subscriber: PeriodSubscriber) -> Box<dyn FnMut(&Selections) + Send> {
    Box::new(move |selections: &Selections| subscriber(id, selections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    #[test]
    fn two_periods_are_halves_and_first_is_active() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let first = mgr.add_period();
        let second = mgr.add_period();

        let labels: Vec<&str> = mgr.periods().iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["First Half", "Second Half"]);
        assert!(mgr.periods().iter().all(|p| p.duration.get() == 45));
        assert_eq!(mgr.active_id(), Some(first));
        assert_ne!(first, second);
    }

    #[test]
    fn later_periods_are_numbered() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        for _ in 0..4 {
            mgr.add_period();
        }
        assert_eq!(mgr.periods()[2].label, "Period 3");
        assert_eq!(mgr.periods()[3].label, "Period 4");
    }

    #[test]
    fn add_then_remove_restores_state() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        mgr.add_period();
        let second = mgr.add_period();
        mgr.set_active(second);
        let before: Vec<PeriodId> = mgr.periods().iter().map(|p| p.id()).collect();

        let extra = mgr.add_period();
        assert!(mgr.remove_period(extra));

        let after: Vec<PeriodId> = mgr.periods().iter().map(|p| p.id()).collect();
        assert_eq!(before, after);
        assert_eq!(mgr.active_id(), Some(second));

        // ids are not reused
        let next = mgr.add_period();
        assert!(next.0 > extra.0);
    }

    #[test]
    fn add_then_remove_on_empty_manager_leaves_no_active() {
        let mut mgr = PeriodManager::new(Format::FiveASide);
        let id = mgr.add_period();
        mgr.remove_period(id);
        assert!(mgr.is_empty());
        assert_eq!(mgr.active_id(), None);
    }

    #[test]
    fn removing_active_prefers_previous_period() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let b = mgr.add_period();
        let c = mgr.add_period();
        mgr.set_active(b);
        mgr.remove_period(b);
        assert_eq!(mgr.active_id(), Some(a));

        mgr.set_active(a);
        mgr.remove_period(a);
        assert_eq!(mgr.active_id(), Some(c));
    }

    #[test]
    fn set_active_ignores_unknown_ids() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        mgr.set_active(PeriodId(99));
        assert_eq!(mgr.active_id(), Some(a));
        assert!(!mgr.remove_period(PeriodId(99)));
    }

    #[test]
    fn rename_and_set_duration() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        assert!(mgr.rename_period(a, "Extra Time"));
        assert!(mgr.set_duration(a, Minutes::new(15).unwrap()));
        let p = mgr.period(a).unwrap();
        assert_eq!(p.label, "Extra Time");
        assert_eq!(p.duration.get(), 15);
        assert!(!mgr.rename_period(PeriodId(42), "nope"));
    }

    #[test]
    fn stores_are_independent_per_period() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let b = mgr.add_period();
        mgr.period_mut(a).unwrap().place_in("GK".into(), pid("p1"));
        mgr.period_mut(b).unwrap().place_in("STC".into(), pid("p1"));

        assert_eq!(mgr.period(a).unwrap().selections().len(), 1);
        assert!(mgr.period(a).unwrap().store().get(&"GK".into()).is_some());
        assert!(mgr.period(b).unwrap().store().get(&"STC".into()).is_some());
    }

    #[test]
    fn subscriber_sees_changes_from_every_period() {
        let seen: Arc<Mutex<Vec<(PeriodId, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        mgr.subscribe(Arc::new(move |id: PeriodId, s: &Selections| {
            sink.lock().unwrap().push((id, s.len()))
        }));
        let b = mgr.add_period();

        mgr.period_mut(a).unwrap().place_in("GK".into(), pid("p1"));
        mgr.period_mut(b).unwrap().place_in("GK".into(), pid("p2"));
        mgr.period_mut(b).unwrap().place_in("DL".into(), pid("p3"));

        assert_eq!(*seen.lock().unwrap(), vec![(a, 1), (b, 1), (b, 2)]);
    }

    #[test]
    fn every_subscriber_follows_new_periods() {
        let first: Arc<Mutex<Vec<PeriodId>>> = Arc::new(Mutex::new(Vec::new()));
        let second: Arc<Mutex<Vec<PeriodId>>> = Arc::new(Mutex::new(Vec::new()));
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let sink = Arc::clone(&first);
        mgr.subscribe(Arc::new(move |id: PeriodId, _: &Selections| sink.lock().unwrap().push(id)));
        let sink = Arc::clone(&second);
        mgr.subscribe(Arc::new(move |id: PeriodId, _: &Selections| sink.lock().unwrap().push(id)));
        let b = mgr.add_period();

        mgr.period_mut(a).unwrap().place_in("GK".into(), pid("p1"));
        mgr.period_mut(b).unwrap().place_in("GK".into(), pid("p2"));

        assert_eq!(*first.lock().unwrap(), vec![a, b]);
        assert_eq!(*second.lock().unwrap(), vec![a, b]);
    }

    #[test]
    fn displaced_player_loses_performance_category() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let period = mgr.period_mut(a).unwrap();
        period.place_in("GK".into(), pid("p1"));
        assert!(period.set_performance(&pid("p1"), PerformanceCategory::new("star")));

        period.place_in("GK".into(), pid("p2"));
        assert!(period.performance_of(&pid("p1")).is_none());

        period.place_in("DL".into(), pid("p1"));
        assert!(period.performance_of(&pid("p1")).is_none());
    }

    #[test]
    fn re_placing_same_player_keeps_category() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let period = mgr.period_mut(a).unwrap();
        period.place_in("GK".into(), pid("p1"));
        period.set_performance(&pid("p1"), PerformanceCategory::new("star"));
        period.place_in("GK".into(), pid("p1"));
        period.place_in("DL".into(), pid("p1"));
        assert_eq!(period.performance_of(&pid("p1")).map(|c| c.as_str()), Some("star"));
    }

    #[test]
    fn removing_player_drops_performance_category() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        let a = mgr.add_period();
        let period = mgr.period_mut(a).unwrap();
        period.place_in("GK".into(), pid("p1"));
        assert!(period.set_performance(&pid("p1"), PerformanceCategory::new("star")));
        assert!(!period.set_performance(&pid("p2"), PerformanceCategory::new("star")));

        period.remove(&"GK".into());
        assert!(period.performance_of(&pid("p1")).is_none());
    }

    #[test]
    fn change_format_vacates_missing_codes() {
        let mut mgr = PeriodManager::new(Format::ElevenASide);
        let a = mgr.add_period();
        {
            let p = mgr.period_mut(a).unwrap();
            p.place_in("GK".into(), pid("p1"));
            p.place_in("DCL".into(), pid("p2"));
            p.place_in("STL".into(), pid("p3"));
            p.place_in(SlotId::substitute(1), pid("p4"));
        }

        let vacated = mgr.change_format(Format::SevenASide);
        assert_eq!(mgr.format(), Format::SevenASide);
        assert_eq!(vacated.len(), 1);
        let slots: Vec<&str> = vacated[0].1.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(slots, vec!["DCL", "STL"]);

        let p = mgr.period(a).unwrap();
        assert!(p.store().get(&"GK".into()).is_some());
        assert!(p.store().get(&SlotId::substitute(1)).is_some());
        assert_eq!(p.selections().len(), 2);
    }

    #[test]
    fn restore_period_keeps_id_and_advances_counter() {
        let mut mgr = PeriodManager::new(Format::SevenASide);
        mgr.restore_period(PeriodId(7), "Second Half".into(), Minutes::new(40).unwrap());
        assert_eq!(mgr.active_id(), Some(PeriodId(7)));
        let next = mgr.add_period();
        assert_eq!(next, PeriodId(8));
    }
}
