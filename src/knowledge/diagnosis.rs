//! Diagnosis nodes of the solution DAG.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::score::Score;

/// A node in the solution DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Unique id within the diagnosis namespace.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Apriori score applied before any rule fires.
    pub apriori: Option<Score>,
    /// Free-form properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Diagnosis {
    /// Create a diagnosis without an apriori score.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            apriori: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set the apriori score.
    pub fn with_apriori(mut self, score: Score) -> Self {
        self.apriori = Some(score);
        self
    }
}

/// Inferred state of a diagnosis during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosisState {
    /// Confirmed.
    Established,
    /// Ruled out.
    Excluded,
    /// Supported but not confirmed.
    Suggested,
    /// No evidence either way.
    Unclear,
}

impl DiagnosisState {
    /// Parse a legacy state string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "established" => Some(Self::Established),
            "excluded" => Some(Self::Excluded),
            "suggested" => Some(Self::Suggested),
            "unclear" => Some(Self::Unclear),
            _ => None,
        }
    }

    /// The persisted string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Established => "established",
            Self::Excluded => "excluded",
            Self::Suggested => "suggested",
            Self::Unclear => "unclear",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Score;

    #[test]
    fn builder_sets_apriori() {
        let d = Diagnosis::new("P1", "Flu").with_apriori(Score::P3);
        assert_eq!(d.apriori, Some(Score::P3));
    }

    #[test]
    fn state_parsing_round_trips() {
        for state in [
            DiagnosisState::Established,
            DiagnosisState::Excluded,
            DiagnosisState::Suggested,
            DiagnosisState::Unclear,
        ] {
            assert_eq!(DiagnosisState::parse(state.as_str()), Some(state));
        }
        assert_eq!(DiagnosisState::parse("confirmed"), None);
    }
}
