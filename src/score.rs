//! Bipolar diagnostic score scale.
//!
//! Scores range from strongly-negative (`N7`, rules out a diagnosis) to
//! strongly-positive (`P7`, confirms it), with the half-step values `N5x`
//! and `P5x` kept from the legacy scale. Persisted as lowercase strings
//! (`"n7"` … `"p7"`).

use serde::{Deserialize, Serialize};

/// One step on the bipolar score scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Score {
    N7,
    N6,
    N5x,
    N5,
    N4,
    N3,
    N2,
    N1,
    P1,
    P2,
    P3,
    P4,
    P5,
    P5x,
    P6,
    P7,
}

impl Score {
    /// Parse a legacy score string (case-insensitive, e.g. `"p4"`).
    ///
    /// Returns `None` for anything outside the fixed vocabulary; callers
    /// treat that as a format issue, not a hard failure.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "n7" => Some(Self::N7),
            "n6" => Some(Self::N6),
            "n5x" => Some(Self::N5x),
            "n5" => Some(Self::N5),
            "n4" => Some(Self::N4),
            "n3" => Some(Self::N3),
            "n2" => Some(Self::N2),
            "n1" => Some(Self::N1),
            "p1" => Some(Self::P1),
            "p2" => Some(Self::P2),
            "p3" => Some(Self::P3),
            "p4" => Some(Self::P4),
            "p5" => Some(Self::P5),
            "p5x" => Some(Self::P5x),
            "p6" => Some(Self::P6),
            "p7" => Some(Self::P7),
            _ => None,
        }
    }

    /// The persisted string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::N7 => "n7",
            Self::N6 => "n6",
            Self::N5x => "n5x",
            Self::N5 => "n5",
            Self::N4 => "n4",
            Self::N3 => "n3",
            Self::N2 => "n2",
            Self::N1 => "n1",
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::P3 => "p3",
            Self::P4 => "p4",
            Self::P5 => "p5",
            Self::P5x => "p5x",
            Self::P6 => "p6",
            Self::P7 => "p7",
        }
    }

    /// Whether this score supports (rather than weakens) a diagnosis.
    pub fn is_positive(self) -> bool {
        self >= Self::P1
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
