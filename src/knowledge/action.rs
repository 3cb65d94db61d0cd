//! Rule actions: what a rule does once its condition holds.

use serde::{Deserialize, Serialize};

use crate::knowledge::formula::FormulaElement;
use crate::score::Score;

/// A value assigned by a set-value or add-value action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionValue {
    /// A choice of the target question.
    Choice(String),
    /// A computed numeric value.
    Formula(FormulaElement),
}

/// The action payload of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Put the target QASets on the agenda.
    Indicate { targets: Vec<String> },
    /// Put the target QASets on the agenda ahead of everything else.
    InstantIndicate { targets: Vec<String> },
    /// Keep the target QASets off the agenda.
    ContraIndicate { targets: Vec<String> },
    /// Ask follow-up questions to clarify the target diagnosis.
    Clarify { target: String },
    /// Ask follow-up questions to refine the target diagnosis.
    Refine { target: String },
    /// Add a score to the target diagnosis.
    Heuristic { diagnosis: String, score: Score },
    /// Replace the target question's value.
    SetValue {
        question: String,
        values: Vec<ActionValue>,
    },
    /// Add to the target question's value.
    AddValue {
        question: String,
        values: Vec<ActionValue>,
    },
    /// Hide choices of the target question.
    SuppressChoices {
        question: String,
        choices: Vec<String>,
    },
}

impl RuleAction {
    /// Legacy wire tag of this action kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Indicate { .. } => "indicate",
            Self::InstantIndicate { .. } => "instantIndicate",
            Self::ContraIndicate { .. } => "contraIndicate",
            Self::Clarify { .. } => "clarify",
            Self::Refine { .. } => "refine",
            Self::Heuristic { .. } => "heuristic",
            Self::SetValue { .. } => "setValue",
            Self::AddValue { .. } => "addValue",
            Self::SuppressChoices { .. } => "suppressChoices",
        }
    }
}
