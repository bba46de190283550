// Identifier newtypes and validated boundary types shared by the engine.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Roster-wide player identifier.
    PlayerId
);
string_id!(TeamId);
string_id!(FixtureId);

/// Player id used for placeholder assignments that hold a slot open.
pub const UNASSIGNED_PLAYER: &str = "unassigned";

impl PlayerId {
    pub fn unassigned() -> Self {
        Self(UNASSIGNED_PLAYER.to_string())
    }

    /// Whether this is the placeholder id rather than a real player.
    pub fn is_unassigned(&self) -> bool {
        self.0 == UNASSIGNED_PLAYER
    }
}

/// Identifier of a period within one fixture. Allocated by the period
/// manager and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(pub u32);

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A squad member as delivered by the roster provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Shirt number, if the club assigns them.
    #[serde(default)]
    pub squad_number: Option<u32>,
}

impl Player {
    /// Build a player, rejecting blank ids and names.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        squad_number: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "player.id" });
        }
        if id == UNASSIGNED_PLAYER {
            return Err(ValidationError::Invalid {
                field: "player.id",
                message: format!("`{UNASSIGNED_PLAYER}` is reserved"),
            });
        }
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "player.name" });
        }
        Ok(Self {
            id: PlayerId(id),
            name,
            squad_number,
        })
    }
}

// ---------------------------------------------------------------------------
// Minutes
// ---------------------------------------------------------------------------

/// A period length in whole minutes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Minutes(NonZeroU32);

impl Minutes {
    pub const DEFAULT_PERIOD: Minutes = match NonZeroU32::new(45) {
        Some(n) => Minutes(n),
        None => unreachable!(),
    };

    pub fn new(minutes: u32) -> Result<Self, ValidationError> {
        NonZeroU32::new(minutes)
            .map(Minutes)
            .ok_or_else(|| ValidationError::Invalid {
                field: "duration",
                message: "must be a positive number of minutes".into(),
            })
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Minutes {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Minutes::new(value)
    }
}

impl From<Minutes> for u32 {
    fn from(m: Minutes) -> Self {
        m.get()
    }
}

impl fmt::Display for Minutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.get())
    }
}

// ---------------------------------------------------------------------------
// Performance category
// ---------------------------------------------------------------------------

/// Category a coach files a player's showing under for one period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceCategory(String);

/// Category used when a record carries none.
pub const DEFAULT_PERFORMANCE_CATEGORY: &str = "standard";

impl PerformanceCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PerformanceCategory {
    fn default() -> Self {
        Self(DEFAULT_PERFORMANCE_CATEGORY.to_string())
    }
}

impl fmt::Display for PerformanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_new_rejects_blank_fields() {
        assert!(matches!(
            Player::new("", "Ada", None),
            Err(ValidationError::MissingField { field: "player.id" })
        ));
        assert!(matches!(
            Player::new("p1", "  ", None),
            Err(ValidationError::MissingField { field: "player.name" })
        ));
    }

    #[test]
    fn player_new_rejects_sentinel_id() {
        assert!(Player::new(UNASSIGNED_PLAYER, "Nobody", None).is_err());
    }

    #[test]
    fn minutes_rejects_zero() {
        assert!(Minutes::new(0).is_err());
        assert_eq!(Minutes::new(20).unwrap().get(), 20);
        assert_eq!(Minutes::DEFAULT_PERIOD.get(), 45);
    }

    #[test]
    fn minutes_deserialize_validates() {
        let ok: Minutes = serde_json::from_str("30").unwrap();
        assert_eq!(ok.get(), 30);
        assert!(serde_json::from_str::<Minutes>("0").is_err());
    }

    #[test]
    fn unassigned_player_is_detected() {
        assert!(PlayerId::unassigned().is_unassigned());
        assert!(!PlayerId::new("p1").is_unassigned());
    }
}
