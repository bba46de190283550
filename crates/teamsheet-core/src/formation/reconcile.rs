// Formation reconciler: converts between slot-keyed selections and the flat
// record lists used for export and persistence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::captaincy::CaptaincyTracker;
use super::catalog::{self, Format, NOT_APPLICABLE_CODE, SUBSTITUTE_CODE};
use super::period::Period;
use super::selection::{Assignment, Selections, SlotId};
use crate::types::{Minutes, PerformanceCategory, PeriodId, PlayerId, TeamId};

// ---------------------------------------------------------------------------
// Record shapes
// ---------------------------------------------------------------------------

/// One row of the exported starting lineup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub position: String,
    pub player_id: PlayerId,
}

/// One row handed to the persistence provider when saving a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub position: String,
    pub player_id: PlayerId,
    pub is_captain: bool,
    pub performance_category: PerformanceCategory,
    #[serde(default)]
    pub is_substitution: bool,
}

impl From<ExportEntry> for SelectionRecord {
    fn from(e: ExportEntry) -> Self {
        Self {
            position: e.position,
            player_id: e.player_id,
            is_captain: false,
            performance_category: PerformanceCategory::default(),
            is_substitution: false,
        }
    }
}

/// A selection row as it comes back from storage. Every field except the
/// player and period may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub period_id: PeriodId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub performance_category: Option<PerformanceCategory>,
    #[serde(default)]
    pub is_captain: Option<bool>,
    #[serde(default)]
    pub is_substitution: Option<bool>,
}

impl PersistedSelection {
    /// Fill in missing fields: position `N/A`, the given default category,
    /// not captain, not a substitution.
    pub fn into_record(self, default_category: &PerformanceCategory) -> SelectionRecord {
        SelectionRecord {
            position: self
                .position
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| NOT_APPLICABLE_CODE.to_string()),
            player_id: self.player_id,
            is_captain: self.is_captain.unwrap_or(false),
            performance_category: self
                .performance_category
                .unwrap_or_else(|| default_category.clone()),
            is_substitution: self.is_substitution.unwrap_or(false),
        }
    }
}

/// Period metadata as stored alongside its selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub id: PeriodId,
    pub label: String,
    pub duration: Minutes,
}

impl From<&Period> for PeriodRecord {
    fn from(p: &Period) -> Self {
        Self {
            id: p.id(),
            label: p.label.clone(),
            duration: p.duration,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// The starting lineup: every assignment except placeholders and
/// substitute slots, in slot order.
pub fn to_export(selections: &Selections) -> Vec<ExportEntry> {
    selections
        .iter()
        .filter(|(slot, a)| !slot.is_substitute() && !a.player_id.is_unassigned())
        .map(|(_, a)| ExportEntry {
            position: a.position.clone(),
            player_id: a.player_id.clone(),
        })
        .collect()
}

/// Everything needed to persist a period: starters and substitutes (but not
/// placeholders), with captaincy and performance merged in.
pub fn to_records(
    period: &Period,
    team: &TeamId,
    captains: &CaptaincyTracker,
    default_category: &PerformanceCategory,
) -> Vec<SelectionRecord> {
    period
        .selections()
        .values()
        .filter(|a| !a.player_id.is_unassigned())
        .map(|a| SelectionRecord {
            position: a.position.clone(),
            player_id: a.player_id.clone(),
            is_captain: captains.is_captain(team, &a.player_id),
            performance_category: period
                .performance_of(&a.player_id)
                .cloned()
                .unwrap_or_else(|| default_category.clone()),
            is_substitution: a.is_substitution,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Result of hydrating selections from records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Imported {
    pub selections: Selections,
    pub performance: HashMap<PlayerId, PerformanceCategory>,
    /// A player flagged as captain in the records, if any. The last flagged
    /// row wins.
    pub captain: Option<PlayerId>,
    /// Position codes not in the format's catalog. They were kept as slots
    /// of their own; the caller decides whether to warn about them.
    pub unknown_positions: Vec<String>,
    /// Position codes shared by more than one row. The first row keeps the
    /// code's slot; later ones load into `CODE#2`, `CODE#3`, ...
    pub repeated_positions: Vec<String>,
}

/// Rebuild a slot-keyed mapping from records.
///
/// Substitute rows fill `sub-1`, `sub-2`, ... in record order. Other rows are
/// keyed by their position code, known to `format` or not. No row is lost:
/// a code seen twice gets a numbered copy of its slot.
pub fn from_import(records: &[SelectionRecord], format: Format) -> Imported {
    let mut imported = Imported::default();
    let mut next_sub = 1;

    for record in records {
        let is_sub = record.position.eq_ignore_ascii_case(SUBSTITUTE_CODE);
        let slot = if is_sub {
            let slot = SlotId::substitute(next_sub);
            next_sub += 1;
            slot
        } else {
            if !catalog::is_valid_code(format, &record.position)
                && !imported.unknown_positions.contains(&record.position)
            {
                warn!("Position {} is not part of {}", record.position, format);
                imported.unknown_positions.push(record.position.clone());
            }
            starting_slot(&mut imported, &record.position)
        };

        let position = if is_sub {
            SUBSTITUTE_CODE.to_string()
        } else {
            record.position.clone()
        };
        imported.selections.insert(
            slot,
            Assignment {
                player_id: record.player_id.clone(),
                position,
                is_substitution: record.is_substitution,
            },
        );
        if !record.player_id.is_unassigned() {
            imported
                .performance
                .insert(record.player_id.clone(), record.performance_category.clone());
        }
        if record.is_captain {
            imported.captain = Some(record.player_id.clone());
        }
    }

    imported
}

/// First free slot for `code`: the plain slot, then `code#2`, `code#3`, ...
fn starting_slot(imported: &mut Imported, code: &str) -> SlotId {
    let slot = SlotId::starting(code);
    if !imported.selections.contains_key(&slot) {
        return slot;
    }
    let mut n = 2;
    while imported.selections.contains_key(&SlotId::repeated(code, n)) {
        n += 1;
    }
    if !imported.repeated_positions.iter().any(|p| p == code) {
        warn!("Position {} appears in more than one row", code);
        imported.repeated_positions.push(code.to_string());
    }
    SlotId::repeated(code, n)
}
