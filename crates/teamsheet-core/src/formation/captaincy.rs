// Captaincy: one captain per team, independent of any fixture or period.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{PlayerId, TeamId};

/// Team -> captain mapping.
///
/// Nothing here checks that a captain belongs to the team's roster; callers
/// must only pass players from that team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptaincyTracker {
    captains: HashMap<TeamId, PlayerId>,
}

impl CaptaincyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `player` captain of `team`, returning the previous captain.
    pub fn set_captain(&mut self, team: TeamId, player: PlayerId) -> Option<PlayerId> {
        debug!("Captain of {} is now {}", team, player);
        self.captains.insert(team, player)
    }

    pub fn captain(&self, team: &TeamId) -> Option<&PlayerId> {
        self.captains.get(team)
    }

    pub fn is_captain(&self, team: &TeamId, player: &PlayerId) -> bool {
        self.captain(team) == Some(player)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TeamId, &PlayerId)> {
        self.captains.iter()
    }
}
