// Player pool: the roster snapshot a selection draws from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::{Player, PlayerId};

/// Read-only view of a roster with an id index.
///
/// The roster itself is shared behind an `Arc` and never mutated here; a
/// fresh snapshot from the roster provider is installed with [`replace`],
/// which rebuilds the index and bumps [`version`].
///
/// [`replace`]: PlayerPool::replace
/// [`version`]: PlayerPool::version
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    players: Arc<Vec<Player>>,
    index: HashMap<PlayerId, usize>,
    version: u64,
}

impl PlayerPool {
    pub fn new(players: Vec<Player>) -> Self {
        let mut pool = PlayerPool::default();
        pool.replace(Arc::new(players));
        pool
    }

    /// Install a new roster snapshot.
    ///
    /// If the roster lists the same id twice the first entry wins lookups.
    pub fn replace(&mut self, players: Arc<Vec<Player>>) {
        let mut index = HashMap::with_capacity(players.len());
        for (i, p) in players.iter().enumerate() {
            index.entry(p.id.clone()).or_insert(i);
        }
        self.players = players;
        self.index = index;
        self.version += 1;
    }

    /// Selectable players. With no restriction (or an empty one) this is the
    /// whole roster; otherwise the roster entries whose id is in
    /// `restrict_to`, in roster order.
    pub fn resolve(&self, restrict_to: Option<&HashSet<PlayerId>>) -> Vec<&Player> {
        match restrict_to {
            Some(ids) if !ids.is_empty() => {
                self.players.iter().filter(|p| ids.contains(&p.id)).collect()
            }
            _ => self.players.iter().collect(),
        }
    }

    pub fn lookup(&self, id: &PlayerId) -> Option<&Player> {
        self.index.get(id).map(|&i| &self.players[i])
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.index.contains_key(id)
    }

    /// Shared handle to the underlying roster.
    pub fn players(&self) -> &Arc<Vec<Player>> {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Incremented every time a roster snapshot is installed.
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Player> {
        vec![
            Player::new("p1", "Alex Morgan", Some(13)).unwrap(),
            Player::new("p2", "Sam Kerr", Some(20)).unwrap(),
            Player::new("p3", "Lucy Bronze", Some(2)).unwrap(),
            Player::new("p4", "Mary Earps", Some(1)).unwrap(),
        ]
    }

    #[test]
    fn resolve_without_restriction_returns_everyone() {
        let pool = PlayerPool::new(roster());
        assert_eq!(pool.resolve(None).len(), 4);
        assert_eq!(pool.resolve(Some(&HashSet::new())).len(), 4);
    }

    #[test]
    fn resolve_keeps_roster_order_not_restriction_order() {
        let pool = PlayerPool::new(roster());
        // HashSet has no order; build it "backwards" anyway
        let ids: HashSet<PlayerId> = ["p4", "p1", "p3"].into_iter().map(PlayerId::from).collect();
        let names: Vec<&str> = pool
            .resolve(Some(&ids))
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(names, vec!["p1", "p3", "p4"]);
    }

    #[test]
    fn restriction_to_unknown_ids_is_empty() {
        let pool = PlayerPool::new(roster());
        let ids: HashSet<PlayerId> = [PlayerId::from("p99")].into_iter().collect();
        assert!(pool.resolve(Some(&ids)).is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let pool = PlayerPool::new(roster());
        assert_eq!(pool.lookup(&"p2".into()).unwrap().name, "Sam Kerr");
        assert!(pool.lookup(&"missing".into()).is_none());
    }

    #[test]
    fn replace_bumps_version_and_reindexes() {
        let mut pool = PlayerPool::new(roster());
        let v = pool.version();
        pool.replace(Arc::new(vec![Player::new("p9", "New Signing", None).unwrap()]));
        assert_eq!(pool.version(), v + 1);
        assert!(pool.lookup(&"p1".into()).is_none());
        assert!(pool.contains(&"p9".into()));
    }
}
