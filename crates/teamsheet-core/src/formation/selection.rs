// Selection store: slot -> assignment mapping for a single period.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::catalog::SUBSTITUTE_CODE;
use crate::types::PlayerId;

/// Prefix that marks a slot id as a substitute slot.
pub const SUBSTITUTE_SLOT_PREFIX: &str = "sub-";

/// Separates a position code from the copy number in a repeated slot id.
pub const REPEAT_SEPARATOR: char = '#';

// ---------------------------------------------------------------------------
// SlotId
// ---------------------------------------------------------------------------

/// Placement target within one period.
///
/// Starting slots are keyed by their position code (codes are unique within
/// a format). Substitute slots are `sub-1`, `sub-2`, ... Extra rows stored
/// under an already-used code load into `GK#2`, `GK#3`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The starting slot for a position code.
    pub fn starting(code: &str) -> Self {
        Self(code.to_string())
    }

    /// The `n`th substitute slot (1-based).
    pub fn substitute(n: usize) -> Self {
        Self(format!("{SUBSTITUTE_SLOT_PREFIX}{n}"))
    }

    /// The `n`th copy of a starting slot, for stored rows that share a code.
    pub fn repeated(code: &str, n: usize) -> Self {
        Self(format!("{code}{REPEAT_SEPARATOR}{n}"))
    }

    pub fn is_substitute(&self) -> bool {
        self.0.starts_with(SUBSTITUTE_SLOT_PREFIX)
    }

    /// Position code an assignment in this slot should carry.
    pub fn position_code(&self) -> &str {
        if self.is_substitute() {
            SUBSTITUTE_CODE
        } else {
            self.0
                .split_once(REPEAT_SEPARATOR)
                .map_or(self.0.as_str(), |(code, _)| code)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// One player occupying one slot for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub player_id: PlayerId,
    pub position: String,
    /// Player came on as a substitute during this period.
    #[serde(default)]
    pub is_substitution: bool,
}

impl Assignment {
    pub fn new(player_id: PlayerId, position: impl Into<String>) -> Self {
        Self {
            player_id,
            position: position.into(),
            is_substitution: false,
        }
    }

    /// A placeholder that keeps a slot open without a real player.
    pub fn placeholder(position: impl Into<String>) -> Self {
        Self::new(PlayerId::unassigned(), position)
    }
}

/// The full contents of a store, ordered by slot id.
pub type Selections = BTreeMap<SlotId, Assignment>;

/// Callback run after every committed change with the full mapping.
pub type Subscriber = Box<dyn FnMut(&Selections) + Send>;

// ---------------------------------------------------------------------------
// SelectionStore
// ---------------------------------------------------------------------------

/// Slot assignments for one period.
///
/// Invariant: a real player (anyone but the `unassigned` placeholder) holds
/// at most one slot. Placing a player somewhere new vacates their old slot.
#[derive(Default)]
pub struct SelectionStore {
    entries: Selections,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("entries", &self.entries)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback that receives the full mapping after each change.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Put `player_id` into `slot`, overwriting whatever was there.
    ///
    /// If the player already held a different slot, that slot is vacated and
    /// returned.
    pub fn place(
        &mut self,
        slot: SlotId,
        player_id: PlayerId,
        position: impl Into<String>,
        is_substitution: bool,
    ) -> Option<SlotId> {
        let vacated = if player_id.is_unassigned() {
            None
        } else {
            self.slot_of(&player_id)
                .filter(|existing| **existing != slot)
                .cloned()
        };
        if let Some(old) = &vacated {
            self.entries.remove(old);
            warn!("Vacated slot {} for player {} moving to {}", old, player_id, slot);
        }

        debug!("Placing {} in slot {}", player_id, slot);
        self.entries.insert(
            slot,
            Assignment {
                player_id,
                position: position.into(),
                is_substitution,
            },
        );
        self.notify();
        vacated
    }

    /// Clear `slot`. Absent slots are ignored and nobody is notified.
    pub fn remove(&mut self, slot: &SlotId) -> Option<Assignment> {
        let removed = self.entries.remove(slot)?;
        debug!("Removed {} from slot {}", removed.player_id, slot);
        self.notify();
        Some(removed)
    }

    /// Swap the whole mapping for `selections`, notifying once.
    ///
    /// If the incoming mapping holds the same player in more than one slot,
    /// the first slot in key order is kept and the rest are dropped and
    /// returned.
    pub fn replace_all(&mut self, selections: Selections) -> Vec<SlotId> {
        let mut seen = std::collections::HashSet::new();
        let mut dropped = Vec::new();
        let mut entries = Selections::new();
        for (slot, assignment) in selections {
            if !assignment.player_id.is_unassigned() && !seen.insert(assignment.player_id.clone())
            {
                dropped.push(slot);
                continue;
            }
            entries.insert(slot, assignment);
        }
        if !dropped.is_empty() {
            warn!("Dropped {} duplicate placements while replacing selections", dropped.len());
        }
        self.entries = entries;
        self.notify();
        dropped
    }

    /// Drag `from` onto `to`. An occupied target swaps with the source.
    /// Each assignment takes the position code of the slot it lands in.
    ///
    /// Returns `false` (and changes nothing) if `from` is empty or the two
    /// slots are the same.
    pub fn move_assignment(&mut self, from: &SlotId, to: &SlotId) -> bool {
        if from == to {
            return false;
        }
        let Some(mut moving) = self.entries.remove(from) else {
            return false;
        };
        moving.position = to.position_code().to_string();

        if let Some(mut displaced) = self.entries.remove(to) {
            displaced.position = from.position_code().to_string();
            debug!("Swapping {} ({}) with {} ({})", moving.player_id, from, displaced.player_id, to);
            self.entries.insert(from.clone(), displaced);
        } else {
            debug!("Moving {} from {} to {}", moving.player_id, from, to);
        }
        self.entries.insert(to.clone(), moving);
        self.notify();
        true
    }

    /// Flip the substitution flag on `slot`, returning the new value.
    pub fn toggle_substitution(&mut self, slot: &SlotId) -> Option<bool> {
        let entry = self.entries.get_mut(slot)?;
        entry.is_substitution = !entry.is_substitution;
        let flag = entry.is_substitution;
        self.notify();
        Some(flag)
    }

    /// Remove every assignment for which `keep` returns false, notifying
    /// once if anything went.
    pub fn retain(
        &mut self,
        mut keep: impl FnMut(&SlotId, &Assignment) -> bool,
    ) -> Vec<(SlotId, Assignment)> {
        let mut removed = Vec::new();
        let slots: Vec<SlotId> = self
            .entries
            .iter()
            .filter(|(slot, a)| !keep(*slot, *a))
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in slots {
            if let Some(a) = self.entries.remove(&slot) {
                removed.push((slot, a));
            }
        }
        if !removed.is_empty() {
            self.notify();
        }
        removed
    }

    pub fn get(&self, slot: &SlotId) -> Option<&Assignment> {
        self.entries.get(slot)
    }

    /// Slot currently held by `player_id`, if any.
    pub fn slot_of(&self, player_id: &PlayerId) -> Option<&SlotId> {
        self.entries
            .iter()
            .find(|(_, a)| &a.player_id == player_id)
            .map(|(slot, _)| slot)
    }

    /// Lowest-numbered substitute slot with nobody in it.
    pub fn next_substitute_slot(&self) -> SlotId {
        (1..)
            .map(SlotId::substitute)
            .find(|slot| !self.entries.contains_key(slot))
            .unwrap_or_else(|| SlotId::substitute(self.entries.len() + 1))
    }

    pub fn selections(&self) -> &Selections {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn notify(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber(&self.entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn recording_store() -> (SelectionStore, Arc<Mutex<Vec<Selections>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut store = SelectionStore::new();
        store.subscribe(Box::new(move |s: &Selections| sink.lock().unwrap().push(s.clone())));
        (store, seen)
    }

    #[test]
    fn place_inserts_and_notifies_with_full_mapping() {
        let (mut store, seen) = recording_store();
        store.place("GK".into(), pid("p1"), "GK", false);
        store.place("DL".into(), pid("p2"), "DL", false);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 2);
        assert_eq!(store.get(&"DL".into()).unwrap().player_id, pid("p2"));
    }

    #[test]
    fn place_overwrites_existing_slot() {
        let mut store = SelectionStore::new();
        store.place("GK".into(), pid("p1"), "GK", false);
        store.place("GK".into(), pid("p2"), "GK", false);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"GK".into()).unwrap().player_id, pid("p2"));
    }

    #[test]
    fn placing_same_player_twice_vacates_prior_slot() {
        let mut store = SelectionStore::new();
        store.place("GK".into(), pid("p1"), "GK", false);
        let vacated = store.place("STC".into(), pid("p1"), "STC", false);

        assert_eq!(vacated, Some(SlotId::from("GK")));
        assert!(store.get(&"GK".into()).is_none());
        assert_eq!(store.slot_of(&pid("p1")), Some(&SlotId::from("STC")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn placing_in_same_slot_does_not_vacate() {
        let mut store = SelectionStore::new();
        store.place("GK".into(), pid("p1"), "GK", false);
        assert_eq!(store.place("GK".into(), pid("p1"), "GK", true), None);
        assert!(store.get(&"GK".into()).unwrap().is_substitution);
    }

    #[test]
    fn placeholders_may_repeat() {
        let mut store = SelectionStore::new();
        store.place("GK".into(), PlayerId::unassigned(), "GK", false);
        store.place("DL".into(), PlayerId::unassigned(), "DL", false);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_absent_slot_is_silent_noop() {
        let (mut store, seen) = recording_store();
        store.place("GK".into(), pid("p1"), "GK", false);
        let before = store.selections().clone();

        assert!(store.remove(&"DR".into()).is_none());
        assert_eq!(store.selections(), &before);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_present_slot_notifies() {
        let (mut store, seen) = recording_store();
        store.place("GK".into(), pid("p1"), "GK", false);
        let removed = store.remove(&"GK".into()).unwrap();
        assert_eq!(removed.player_id, pid("p1"));
        assert!(store.is_empty());
        assert!(seen.lock().unwrap().last().unwrap().is_empty());
    }

    #[test]
    fn replace_all_notifies_once() {
        let (mut store, seen) = recording_store();
        let mut mapping = Selections::new();
        mapping.insert("GK".into(), Assignment::new(pid("p1"), "GK"));
        mapping.insert("DL".into(), Assignment::new(pid("p2"), "DL"));
        mapping.insert("DR".into(), Assignment::new(pid("p3"), "DR"));

        store.replace_all(mapping.clone());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.selections(), &mapping);
    }

    #[test]
    fn replace_all_drops_duplicate_players() {
        let mut store = SelectionStore::new();
        let mut mapping = Selections::new();
        mapping.insert("DL".into(), Assignment::new(pid("p1"), "DL"));
        mapping.insert("GK".into(), Assignment::new(pid("p1"), "GK"));

        let dropped = store.replace_all(mapping);
        // BTreeMap order: "DL" < "GK"
        assert_eq!(dropped, vec![SlotId::from("GK")]);
        assert_eq!(store.slot_of(&pid("p1")), Some(&SlotId::from("DL")));
    }

    #[test]
    fn replaying_edits_matches_replace_all() {
        let mut replayed = SelectionStore::new();
        replayed.place("GK".into(), pid("p1"), "GK", false);
        replayed.place("DL".into(), pid("p2"), "DL", false);
        replayed.place("DR".into(), pid("p3"), "DR", false);
        replayed.remove(&"DL".into());
        replayed.place("STC".into(), pid("p3"), "STC", false);
        replayed.remove(&"MC".into());

        let mut rebuilt = SelectionStore::new();
        rebuilt.replace_all(replayed.selections().clone());
        assert_eq!(rebuilt.selections(), replayed.selections());
    }

    #[test]
    fn move_into_empty_slot() {
        let mut store = SelectionStore::new();
        store.place("DL".into(), pid("p1"), "DL", false);
        assert!(store.move_assignment(&"DL".into(), &"DR".into()));
        assert!(store.get(&"DL".into()).is_none());
        assert_eq!(store.get(&"DR".into()).unwrap().position, "DR");
    }

    #[test]
    fn move_onto_occupied_slot_swaps() {
        let mut store = SelectionStore::new();
        store.place("DL".into(), pid("p1"), "DL", false);
        store.place("sub-1".into(), pid("p2"), "SUB", false);

        assert!(store.move_assignment(&"sub-1".into(), &"DL".into()));
        let dl = store.get(&"DL".into()).unwrap();
        let sub = store.get(&"sub-1".into()).unwrap();
        assert_eq!((dl.player_id.as_str(), dl.position.as_str()), ("p2", "DL"));
        assert_eq!((sub.player_id.as_str(), sub.position.as_str()), ("p1", "SUB"));
    }

    #[test]
    fn move_from_empty_slot_is_rejected() {
        let (mut store, seen) = recording_store();
        assert!(!store.move_assignment(&"DL".into(), &"DR".into()));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn toggle_substitution_flips_flag() {
        let mut store = SelectionStore::new();
        store.place("STC".into(), pid("p1"), "STC", false);
        assert_eq!(store.toggle_substitution(&"STC".into()), Some(true));
        assert_eq!(store.toggle_substitution(&"STC".into()), Some(false));
        assert_eq!(store.toggle_substitution(&"GK".into()), None);
    }

    #[test]
    fn next_substitute_slot_fills_gaps() {
        let mut store = SelectionStore::new();
        assert_eq!(store.next_substitute_slot(), SlotId::substitute(1));
        store.place(SlotId::substitute(1), pid("p1"), "SUB", false);
        store.place(SlotId::substitute(3), pid("p3"), "SUB", false);
        assert_eq!(store.next_substitute_slot(), SlotId::substitute(2));
    }

    #[test]
    fn slot_ids_know_their_kind() {
        assert!(SlotId::substitute(2).is_substitute());
        assert_eq!(SlotId::substitute(2).position_code(), "SUB");
        assert!(!SlotId::starting("DL").is_substitute());
        assert_eq!(SlotId::starting("DL").position_code(), "DL");
        assert_eq!(SlotId::repeated("N/A", 2).as_str(), "N/A#2");
        assert_eq!(SlotId::repeated("N/A", 2).position_code(), "N/A");
    }
}
