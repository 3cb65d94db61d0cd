//! Knowledge slices: tagged units of inferential knowledge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::knowledge::action::RuleAction;
use crate::knowledge::condition::Condition;

/// The kind tag of a knowledge slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceKind {
    Rule,
    Schema,
    Similarity,
}

impl std::fmt::Display for SliceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule => write!(f, "rule"),
            Self::Schema => write!(f, "schema"),
            Self::Similarity => write!(f, "similarity"),
        }
    }
}

/// A production rule: condition guards action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique id within the slice namespace.
    pub id: String,
    /// The firing condition. `None` marks a rule whose condition could not
    /// be reconstructed — a hole, preserved rather than silently dropped.
    pub condition: Option<Condition>,
    /// Exception condition: when it holds, the rule does not fire.
    pub exception: Option<Condition>,
    /// Context condition: the rule only applies while it holds.
    pub context: Option<Condition>,
    /// What the rule does.
    pub action: RuleAction,
    /// Inactive rules are kept but never fire.
    pub active: bool,
    /// Free-text author comment.
    pub comment: Option<String>,
}

impl Rule {
    /// Create an active rule with condition and action.
    pub fn new(id: impl Into<String>, condition: Condition, action: RuleAction) -> Self {
        Self {
            id: id.into(),
            condition: Some(condition),
            exception: None,
            context: None,
            action,
            active: true,
            comment: None,
        }
    }
}

/// Maps a numeric question's value ranges onto choice-like levels via
/// ascending thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSchema {
    /// Unique id within the slice namespace.
    pub id: String,
    /// The partitioned numeric question.
    pub question: String,
    /// Ascending partition thresholds.
    pub thresholds: Vec<f64>,
}

/// Feature weights for case similarity scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityModel {
    /// Unique id within the slice namespace.
    pub id: String,
    /// Question id → comparison weight.
    pub weights: BTreeMap<String, f64>,
}

/// A unit of inferential knowledge, keyed by id in the global slice table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KnowledgeSlice {
    Rule(Rule),
    Schema(ValueSchema),
    Similarity(SimilarityModel),
}

impl KnowledgeSlice {
    /// The slice id.
    pub fn id(&self) -> &str {
        match self {
            Self::Rule(r) => &r.id,
            Self::Schema(s) => &s.id,
            Self::Similarity(s) => &s.id,
        }
    }

    /// The slice kind tag.
    pub fn kind(&self) -> SliceKind {
        match self {
            Self::Rule(_) => SliceKind::Rule,
            Self::Schema(_) => SliceKind::Schema,
            Self::Similarity(_) => SliceKind::Similarity,
        }
    }

    /// Whether a patch may remove and replace this slice. Only rules have a
    /// defined removal path; other kinds are left untouched by patches.
    pub fn is_removable(&self) -> bool {
        self.kind() == SliceKind::Rule
    }
}
