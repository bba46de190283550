// Click-to-place interaction: select something, then click where it goes.

use super::selection::{SelectionStore, SlotId};
use crate::types::PlayerId;

/// What the user has picked up, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Picked {
    #[default]
    Nothing,
    /// A player from the squad list.
    Player(PlayerId),
    /// An occupied slot on the pitch.
    Slot(SlotId),
}

/// Edit the store should apply as the result of a click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickAction {
    Place { slot: SlotId, player_id: PlayerId },
    Move { from: SlotId, to: SlotId },
}

/// Two-click placement state machine. It never touches the store itself;
/// callers apply the returned action.
#[derive(Debug, Clone, Default)]
pub struct Picker {
    picked: Picked,
}

impl Picker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picked(&self) -> &Picked {
        &self.picked
    }

    pub fn clear(&mut self) {
        self.picked = Picked::Nothing;
    }

    /// Click on a player in the squad list. Clicking the already selected
    /// player deselects them.
    pub fn click_player(&mut self, player_id: PlayerId) {
        self.picked = match &self.picked {
            Picked::Player(current) if *current == player_id => Picked::Nothing,
            _ => Picked::Player(player_id),
        };
    }

    /// Click on a slot on the pitch.
    pub fn click_slot(&mut self, slot: SlotId, store: &SelectionStore) -> Option<PickAction> {
        match std::mem::take(&mut self.picked) {
            Picked::Player(player_id) => Some(PickAction::Place { slot, player_id }),
            Picked::Slot(from) if from == slot => None,
            Picked::Slot(from) => Some(PickAction::Move { from, to: slot }),
            Picked::Nothing => {
                if store.get(&slot).is_some() {
                    self.picked = Picked::Slot(slot);
                }
                None
            }
        }
    }
}
