// Position catalog: formats, lines, and the static slot table per format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Position code of a substitute slot. Valid in every format.
pub const SUBSTITUTE_CODE: &str = "SUB";

/// Position recorded when a persisted row carries none.
pub const NOT_APPLICABLE_CODE: &str = "N/A";

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Number of players on the pitch per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Format {
    FiveASide,
    SixASide,
    SevenASide,
    EightASide,
    NineASide,
    TenASide,
    ElevenASide,
}

impl Format {
    pub const ALL: [Format; 7] = [
        Format::FiveASide,
        Format::SixASide,
        Format::SevenASide,
        Format::EightASide,
        Format::NineASide,
        Format::TenASide,
        Format::ElevenASide,
    ];

    /// Players on the pitch, goalkeeper included.
    pub fn players_on_pitch(self) -> usize {
        match self {
            Format::FiveASide => 5,
            Format::SixASide => 6,
            Format::SevenASide => 7,
            Format::EightASide => 8,
            Format::NineASide => 9,
            Format::TenASide => 10,
            Format::ElevenASide => 11,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::FiveASide => "5-a-side",
            Format::SixASide => "6-a-side",
            Format::SevenASide => "7-a-side",
            Format::EightASide => "8-a-side",
            Format::NineASide => "9-a-side",
            Format::TenASide => "10-a-side",
            Format::ElevenASide => "11-a-side",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ValidationError;

    /// Accepts "7-a-side", "7 a side", or a bare "7".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "-");
        let count = normalized
            .strip_suffix("-a-side")
            .unwrap_or(&normalized)
            .parse::<usize>()
            .map_err(|_| ValidationError::UnknownFormat(s.to_string()))?;
        Format::ALL
            .into_iter()
            .find(|f| f.players_on_pitch() == count)
            .ok_or_else(|| ValidationError::UnknownFormat(s.to_string()))
    }
}

impl TryFrom<String> for Format {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Format> for String {
    fn from(f: Format) -> Self {
        f.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// Horizontal band of the pitch a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Line {
    Goalkeeper,
    Defense,
    Midfield,
    Attack,
}

impl Line {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goalkeeper" | "gk" => Some(Line::Goalkeeper),
            "defense" | "defence" => Some(Line::Defense),
            "midfield" => Some(Line::Midfield),
            "attack" => Some(Line::Attack),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Slot table
// ---------------------------------------------------------------------------

/// One starting position of a format, with its pitch geometry.
///
/// Coordinates are percentages of the pitch: `x` runs left to right,
/// `y` from the own goal line (0) to the opposition goal line (100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSlot {
    pub code: &'static str,
    pub line: Line,
    pub label: &'static str,
    pub x: f32,
    pub y: f32,
}

const fn slot(code: &'static str, line: Line, label: &'static str, x: f32, y: f32) -> PositionSlot {
    PositionSlot {
        code,
        line,
        label,
        x,
        y,
    }
}

const GK: PositionSlot = slot("GK", Line::Goalkeeper, "Goalkeeper", 50.0, 5.0);

const FIVE: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 30.0, 28.0),
    slot("DR", Line::Defense, "Right Defender", 70.0, 28.0),
    slot("MC", Line::Midfield, "Centre Midfield", 50.0, 52.0),
    slot("STC", Line::Attack, "Centre Striker", 50.0, 78.0),
];

const SIX: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 30.0, 28.0),
    slot("DR", Line::Defense, "Right Defender", 70.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 25.0, 52.0),
    slot("MR", Line::Midfield, "Right Midfield", 75.0, 52.0),
    slot("STC", Line::Attack, "Centre Striker", 50.0, 78.0),
];

const SEVEN: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 22.0, 28.0),
    slot("DC", Line::Defense, "Centre Defender", 50.0, 25.0),
    slot("DR", Line::Defense, "Right Defender", 78.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 30.0, 52.0),
    slot("MR", Line::Midfield, "Right Midfield", 70.0, 52.0),
    slot("STC", Line::Attack, "Centre Striker", 50.0, 78.0),
];

const EIGHT: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 22.0, 28.0),
    slot("DC", Line::Defense, "Centre Defender", 50.0, 25.0),
    slot("DR", Line::Defense, "Right Defender", 78.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 20.0, 52.0),
    slot("MC", Line::Midfield, "Centre Midfield", 50.0, 50.0),
    slot("MR", Line::Midfield, "Right Midfield", 80.0, 52.0),
    slot("STC", Line::Attack, "Centre Striker", 50.0, 78.0),
];

const NINE: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 22.0, 28.0),
    slot("DC", Line::Defense, "Centre Defender", 50.0, 25.0),
    slot("DR", Line::Defense, "Right Defender", 78.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 15.0, 52.0),
    slot("MCL", Line::Midfield, "Centre Midfield (Left)", 38.0, 50.0),
    slot("MCR", Line::Midfield, "Centre Midfield (Right)", 62.0, 50.0),
    slot("MR", Line::Midfield, "Right Midfield", 85.0, 52.0),
    slot("STC", Line::Attack, "Centre Striker", 50.0, 78.0),
];

const TEN: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Defender", 22.0, 28.0),
    slot("DC", Line::Defense, "Centre Defender", 50.0, 25.0),
    slot("DR", Line::Defense, "Right Defender", 78.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 15.0, 52.0),
    slot("MCL", Line::Midfield, "Centre Midfield (Left)", 38.0, 50.0),
    slot("MCR", Line::Midfield, "Centre Midfield (Right)", 62.0, 50.0),
    slot("MR", Line::Midfield, "Right Midfield", 85.0, 52.0),
    slot("STL", Line::Attack, "Left Striker", 38.0, 78.0),
    slot("STR", Line::Attack, "Right Striker", 62.0, 78.0),
];

const ELEVEN: &[PositionSlot] = &[
    GK,
    slot("DL", Line::Defense, "Left Back", 15.0, 28.0),
    slot("DCL", Line::Defense, "Centre Back (Left)", 38.0, 25.0),
    slot("DCR", Line::Defense, "Centre Back (Right)", 62.0, 25.0),
    slot("DR", Line::Defense, "Right Back", 85.0, 28.0),
    slot("ML", Line::Midfield, "Left Midfield", 15.0, 52.0),
    slot("MCL", Line::Midfield, "Centre Midfield (Left)", 38.0, 50.0),
    slot("MCR", Line::Midfield, "Centre Midfield (Right)", 62.0, 50.0),
    slot("MR", Line::Midfield, "Right Midfield", 85.0, 52.0),
    slot("STL", Line::Attack, "Left Striker", 38.0, 78.0),
    slot("STR", Line::Attack, "Right Striker", 62.0, 78.0),
];

/// Every starting slot of `format`, goalkeeper first then line by line.
pub fn slots(format: Format) -> &'static [PositionSlot] {
    match format {
        Format::FiveASide => FIVE,
        Format::SixASide => SIX,
        Format::SevenASide => SEVEN,
        Format::EightASide => EIGHT,
        Format::NineASide => NINE,
        Format::TenASide => TEN,
        Format::ElevenASide => ELEVEN,
    }
}

/// Position codes on `line` for `format`, in left-to-right catalog order.
pub fn positions_for_line(format: Format, line: Line) -> Vec<&'static str> {
    slots(format)
        .iter()
        .filter(|s| s.line == line)
        .map(|s| s.code)
        .collect()
}

/// Like [`positions_for_line`] but takes the line by name. Unknown names
/// yield an empty list.
pub fn positions_for_line_name(format: Format, line: &str) -> Vec<&'static str> {
    match Line::from_name(line) {
        Some(line) => positions_for_line(format, line),
        None => Vec::new(),
    }
}

/// Look up the catalog entry for `code` in `format`.
pub fn find(format: Format, code: &str) -> Option<&'static PositionSlot> {
    slots(format).iter().find(|s| s.code == code)
}

/// Whether `code` may appear in a selection for `format`.
pub fn is_valid_code(format: Format, code: &str) -> bool {
    code == SUBSTITUTE_CODE || find(format, code).is_some()
}

/// Display label for a code, falling back to the code itself.
pub fn label(format: Format, code: &str) -> String {
    if code == SUBSTITUTE_CODE {
        return "Substitute".to_string();
    }
    find(format, code)
        .map(|s| s.label.to_string())
        .unwrap_or_else(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_format_has_matching_slot_count() {
        for format in Format::ALL {
            assert_eq!(slots(format).len(), format.players_on_pitch(), "{format}");
        }
    }

    #[test]
    fn codes_are_unique_within_a_format() {
        for format in Format::ALL {
            let codes: HashSet<_> = slots(format).iter().map(|s| s.code).collect();
            assert_eq!(codes.len(), slots(format).len(), "{format}");
        }
    }

    #[test]
    fn positions_for_line_only_returns_codes_of_the_format() {
        let lines = [Line::Goalkeeper, Line::Defense, Line::Midfield, Line::Attack];
        for format in Format::ALL {
            for line in lines {
                let first = positions_for_line(format, line);
                let second = positions_for_line(format, line);
                assert_eq!(first, second);
                for code in first {
                    assert!(is_valid_code(format, code), "{code} in {format}");
                }
            }
        }
    }

    #[test]
    fn seven_a_side_lines() {
        assert_eq!(
            positions_for_line(Format::SevenASide, Line::Defense),
            vec!["DL", "DC", "DR"]
        );
        assert_eq!(
            positions_for_line(Format::SevenASide, Line::Midfield),
            vec!["ML", "MR"]
        );
        assert_eq!(positions_for_line(Format::SevenASide, Line::Attack), vec!["STC"]);
    }

    #[test]
    fn unknown_line_name_is_empty() {
        assert!(positions_for_line_name(Format::ElevenASide, "sweeper").is_empty());
        assert_eq!(
            positions_for_line_name(Format::ElevenASide, "Defence"),
            vec!["DL", "DCL", "DCR", "DR"]
        );
    }

    #[test]
    fn format_parsing() {
        assert_eq!("7-a-side".parse::<Format>().unwrap(), Format::SevenASide);
        assert_eq!("11 a side".parse::<Format>().unwrap(), Format::ElevenASide);
        assert_eq!("5".parse::<Format>().unwrap(), Format::FiveASide);
        assert!("4-a-side".parse::<Format>().is_err());
        assert!("futsal".parse::<Format>().is_err());
    }

    #[test]
    fn substitute_code_is_valid_everywhere() {
        for format in Format::ALL {
            assert!(is_valid_code(format, SUBSTITUTE_CODE));
        }
        assert!(!is_valid_code(Format::FiveASide, "DCL"));
    }

    #[test]
    fn label_falls_back_to_code() {
        assert_eq!(label(Format::ElevenASide, "DL"), "Left Back");
        assert_eq!(label(Format::ElevenASide, "SUB"), "Substitute");
        assert_eq!(label(Format::ElevenASide, "LWB"), "LWB");
    }
}
