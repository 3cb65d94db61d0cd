//! QASet nodes: questions and question containers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::interval::NumericalInterval;

/// Polarity of a choice on a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceKind {
    /// An ordinary alternative.
    Regular,
    /// The affirmative alternative of a yes/no question.
    Yes,
    /// The negative alternative of a yes/no question.
    No,
}

impl Default for ChoiceKind {
    fn default() -> Self {
        Self::Regular
    }
}

/// A possible value of a choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Unique id within the answer namespace.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Polarity, relevant only on yes/no questions.
    #[serde(default)]
    pub kind: ChoiceKind,
}

impl Choice {
    /// Create a regular choice.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: ChoiceKind::Regular,
        }
    }

    /// Set the polarity.
    pub fn with_kind(mut self, kind: ChoiceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// The answer shape of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Exactly one choice.
    OneChoice { choices: Vec<Choice> },
    /// Any subset of choices.
    MultipleChoice { choices: Vec<Choice> },
    /// One choice with yes/no polarity.
    YesNo { choices: Vec<Choice> },
    /// A numeric value, optionally partitioned into intervals.
    Numeric { partitions: Vec<NumericalInterval> },
    /// Free text.
    Text,
    /// A calendar date.
    Date,
    /// Presentational only, no answer.
    Info,
    /// A solution-rating question.
    Solution,
}

impl QuestionKind {
    /// Legacy wire tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::OneChoice { .. } => "OC",
            Self::MultipleChoice { .. } => "MC",
            Self::YesNo { .. } => "YN",
            Self::Numeric { .. } => "Num",
            Self::Text => "Text",
            Self::Date => "Date",
            Self::Info => "ZC",
            Self::Solution => "State",
        }
    }
}

/// What a QASet node is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QASetPayload {
    /// Groups other QASets for presentation.
    Container {
        /// Optional presentation priority.
        priority: Option<i32>,
    },
    /// An answerable question.
    Question(QuestionKind),
}

/// A node in the question tree: a question or a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QASet {
    /// Unique id within the QASet namespace.
    pub id: String,
    /// Display text.
    pub text: String,
    /// Free-form properties (cost values, display hints, …).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Container or question payload.
    pub payload: QASetPayload,
}

impl QASet {
    /// Create a container.
    pub fn container(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            properties: BTreeMap::new(),
            payload: QASetPayload::Container { priority: None },
        }
    }

    /// Create a question of the given kind.
    pub fn question(
        id: impl Into<String>,
        text: impl Into<String>,
        kind: QuestionKind,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            properties: BTreeMap::new(),
            payload: QASetPayload::Question(kind),
        }
    }

    /// Whether this node is a question.
    pub fn is_question(&self) -> bool {
        matches!(self.payload, QASetPayload::Question(_))
    }

    /// Whether this node is a container.
    pub fn is_container(&self) -> bool {
        matches!(self.payload, QASetPayload::Container { .. })
    }

    /// The question kind, if this is a question.
    pub fn question_kind(&self) -> Option<&QuestionKind> {
        match &self.payload {
            QASetPayload::Question(kind) => Some(kind),
            QASetPayload::Container { .. } => None,
        }
    }

    /// The choice list, if this question has one.
    pub fn choices(&self) -> Option<&[Choice]> {
        match self.question_kind()? {
            QuestionKind::OneChoice { choices }
            | QuestionKind::MultipleChoice { choices }
            | QuestionKind::YesNo { choices } => Some(choices),
            _ => None,
        }
    }

    /// Find a choice by id on this question.
    pub fn find_choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices()?.iter().find(|c| c.id == choice_id)
    }

    /// The choice with the given polarity, for yes/no questions.
    pub fn choice_of_kind(&self, kind: ChoiceKind) -> Option<&Choice> {
        self.choices()?.iter().find(|c| c.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yn(id: &str) -> QASet {
        QASet::question(
            id,
            "Does it hurt?",
            QuestionKind::YesNo {
                choices: vec![
                    Choice::new("A_yes", "yes").with_kind(ChoiceKind::Yes),
                    Choice::new("A_no", "no").with_kind(ChoiceKind::No),
                ],
            },
        )
    }

    #[test]
    fn container_has_no_choices() {
        let c = QASet::container("QC1", "General");
        assert!(c.is_container());
        assert!(c.choices().is_none());
    }

    #[test]
    fn find_choice_by_id() {
        let q = yn("Q1");
        assert_eq!(q.find_choice("A_yes").unwrap().text, "yes");
        assert!(q.find_choice("A_maybe").is_none());
    }

    #[test]
    fn polarity_lookup() {
        let q = yn("Q1");
        assert_eq!(q.choice_of_kind(ChoiceKind::Yes).unwrap().id, "A_yes");
        assert_eq!(q.choice_of_kind(ChoiceKind::No).unwrap().id, "A_no");
    }

    #[test]
    fn wire_tags_match_legacy_vocabulary() {
        assert_eq!(
            QuestionKind::Numeric { partitions: vec![] }.tag(),
            "Num"
        );
        assert_eq!(QuestionKind::Info.tag(), "ZC");
        assert_eq!(QuestionKind::Solution.tag(), "State");
    }
}
