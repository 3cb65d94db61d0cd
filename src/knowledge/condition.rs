//! Composite rule conditions and their tri-valued evaluation.
//!
//! Conditions form a closed tagged union: composites (`And`, `Or`, `Not`,
//! `MofN`) over terminal tests against question answers or diagnosis
//! states. Evaluation is tri-valued — [`Evaluation::Indeterminate`]
//! distinguishes "no answer yet" from "answered unknown" instead of using
//! errors for control flow.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::interval::NumericalInterval;
use crate::knowledge::diagnosis::DiagnosisState;
use crate::knowledge::qaset::ChoiceKind;
use crate::knowledge::KnowledgeBase;

/// A recorded answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Selected choice ids (singleton for one-choice questions).
    Choices(BTreeSet<String>),
    /// A numeric answer.
    Number(f64),
    /// A free-text answer.
    Text(String),
    /// The explicit "unknown" answer.
    Unknown,
}

impl Value {
    /// A single-choice answer.
    pub fn choice(id: impl Into<String>) -> Self {
        Self::Choices(BTreeSet::from([id.into()]))
    }
}

/// The answers and diagnosis states a condition is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    answers: BTreeMap<String, Value>,
    states: BTreeMap<String, DiagnosisState>,
}

impl Findings {
    /// Create an empty findings set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer for a question.
    pub fn answer(&mut self, question: impl Into<String>, value: Value) -> &mut Self {
        self.answers.insert(question.into(), value);
        self
    }

    /// Record a diagnosis state.
    pub fn rate(&mut self, diagnosis: impl Into<String>, state: DiagnosisState) -> &mut Self {
        self.states.insert(diagnosis.into(), state);
        self
    }

    /// The recorded answer for a question, if any.
    pub fn answer_for(&self, question: &str) -> Option<&Value> {
        self.answers.get(question)
    }

    /// The state of a diagnosis; unrated diagnoses are `Unclear`.
    pub fn state_of(&self, diagnosis: &str) -> DiagnosisState {
        self.states
            .get(diagnosis)
            .copied()
            .unwrap_or(DiagnosisState::Unclear)
    }
}

/// Why an evaluation could not decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indeterminacy {
    /// The question has no recorded answer yet.
    Unanswered(String),
    /// The question was answered with the explicit unknown value.
    AnsweredUnknown(String),
    /// The answer's type does not fit the test (e.g. text for a numeric test).
    Incomparable(String),
}

/// Tri-valued evaluation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    True,
    False,
    Indeterminate(Indeterminacy),
}

impl Evaluation {
    /// Whether the outcome is decidedly true.
    pub fn is_true(&self) -> bool {
        *self == Self::True
    }

    fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            other => other,
        }
    }
}

/// A boolean test node over findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// All operands hold.
    And(Vec<Condition>),
    /// At least one operand holds.
    Or(Vec<Condition>),
    /// The operand does not hold.
    Not(Box<Condition>),
    /// Between `min` and `max` operands hold.
    MofN {
        min: usize,
        max: usize,
        operands: Vec<Condition>,
    },
    /// The diagnosis is in the given state.
    DiagnosisState {
        diagnosis: String,
        state: DiagnosisState,
    },
    /// The yes/no question was answered affirmatively.
    ChoiceYes { question: String },
    /// The yes/no question was answered negatively.
    ChoiceNo { question: String },
    /// The choice question's answer includes the given choice.
    Equal { question: String, choice: String },
    /// The question has any answer other than unknown.
    Known { question: String },
    /// The question was answered with the explicit unknown value.
    Unknown { question: String },
    /// value > threshold.
    NumGreater { question: String, threshold: f64 },
    /// value >= threshold.
    NumGreaterEqual { question: String, threshold: f64 },
    /// value < threshold.
    NumLess { question: String, threshold: f64 },
    /// value <= threshold.
    NumLessEqual { question: String, threshold: f64 },
    /// value == threshold.
    NumEqual { question: String, threshold: f64 },
    /// value lies in the interval.
    NumInRange {
        question: String,
        interval: NumericalInterval,
    },
    /// The text answer contains the given substring.
    TextContains { question: String, value: String },
    /// The text answer equals the given string.
    TextEquals { question: String, value: String },
}

impl Condition {
    /// Build an `And` over one or more operands.
    pub fn and(operands: Vec<Condition>) -> Result<Self, DomainError> {
        if operands.is_empty() {
            return Err(DomainError::EmptyComposite);
        }
        Ok(Self::And(operands))
    }

    /// Build an `Or` over one or more operands.
    pub fn or(operands: Vec<Condition>) -> Result<Self, DomainError> {
        if operands.is_empty() {
            return Err(DomainError::EmptyComposite);
        }
        Ok(Self::Or(operands))
    }

    /// Build an `MofN`, enforcing 0 <= min <= max <= operand count.
    pub fn m_of_n(
        min: usize,
        max: usize,
        operands: Vec<Condition>,
    ) -> Result<Self, DomainError> {
        if operands.is_empty() {
            return Err(DomainError::EmptyComposite);
        }
        if min > max || max > operands.len() {
            return Err(DomainError::MofNBounds {
                min,
                max,
                operands: operands.len(),
            });
        }
        Ok(Self::MofN { min, max, operands })
    }

    /// Evaluate against the findings, resolving choice polarity through `kb`.
    pub fn evaluate(&self, kb: &KnowledgeBase, findings: &Findings) -> Evaluation {
        match self {
            Self::And(operands) => {
                let mut pending = None;
                for op in operands {
                    match op.evaluate(kb, findings) {
                        Evaluation::False => return Evaluation::False,
                        e @ Evaluation::Indeterminate(_) => pending = pending.or(Some(e)),
                        Evaluation::True => {}
                    }
                }
                pending.unwrap_or(Evaluation::True)
            }
            Self::Or(operands) => {
                let mut pending = None;
                for op in operands {
                    match op.evaluate(kb, findings) {
                        Evaluation::True => return Evaluation::True,
                        e @ Evaluation::Indeterminate(_) => pending = pending.or(Some(e)),
                        Evaluation::False => {}
                    }
                }
                pending.unwrap_or(Evaluation::False)
            }
            Self::Not(inner) => inner.evaluate(kb, findings).negate(),
            Self::MofN { min, max, operands } => {
                let mut decided_true = 0usize;
                let mut open = 0usize;
                let mut pending = None;
                for op in operands {
                    match op.evaluate(kb, findings) {
                        Evaluation::True => decided_true += 1,
                        Evaluation::False => {}
                        e @ Evaluation::Indeterminate(_) => {
                            open += 1;
                            pending = pending.or(Some(e));
                        }
                    }
                }
                // The true count can end up anywhere in
                // [decided_true, decided_true + open].
                if decided_true > *max || decided_true + open < *min {
                    Evaluation::False
                } else if decided_true >= *min && decided_true + open <= *max {
                    Evaluation::True
                } else {
                    pending.unwrap_or(Evaluation::False)
                }
            }
            Self::DiagnosisState { diagnosis, state } => {
                if findings.state_of(diagnosis) == *state {
                    Evaluation::True
                } else {
                    Evaluation::False
                }
            }
            Self::ChoiceYes { question } => {
                Self::evaluate_polarity(kb, findings, question, ChoiceKind::Yes)
            }
            Self::ChoiceNo { question } => {
                Self::evaluate_polarity(kb, findings, question, ChoiceKind::No)
            }
            Self::Equal { question, choice } => {
                Self::with_answer(findings, question, |value| match value {
                    Value::Choices(selected) => {
                        if selected.contains(choice) {
                            Evaluation::True
                        } else {
                            Evaluation::False
                        }
                    }
                    _ => Evaluation::Indeterminate(Indeterminacy::Incomparable(
                        question.clone(),
                    )),
                })
            }
            Self::Known { question } => match findings.answer_for(question) {
                None => Evaluation::Indeterminate(Indeterminacy::Unanswered(question.clone())),
                Some(Value::Unknown) => Evaluation::False,
                Some(_) => Evaluation::True,
            },
            Self::Unknown { question } => match findings.answer_for(question) {
                None => Evaluation::Indeterminate(Indeterminacy::Unanswered(question.clone())),
                Some(Value::Unknown) => Evaluation::True,
                Some(_) => Evaluation::False,
            },
            Self::NumGreater {
                question,
                threshold,
            } => Self::numeric(findings, question, |v| v > *threshold),
            Self::NumGreaterEqual {
                question,
                threshold,
            } => Self::numeric(findings, question, |v| v >= *threshold),
            Self::NumLess {
                question,
                threshold,
            } => Self::numeric(findings, question, |v| v < *threshold),
            Self::NumLessEqual {
                question,
                threshold,
            } => Self::numeric(findings, question, |v| v <= *threshold),
            Self::NumEqual {
                question,
                threshold,
            } => Self::numeric(findings, question, |v| v == *threshold),
            Self::NumInRange { question, interval } => {
                Self::numeric(findings, question, |v| interval.contains(v))
            }
            Self::TextContains { question, value } => {
                Self::textual(findings, question, |t| t.contains(value.as_str()))
            }
            Self::TextEquals { question, value } => {
                Self::textual(findings, question, |t| t == value)
            }
        }
    }

    fn with_answer(
        findings: &Findings,
        question: &str,
        test: impl FnOnce(&Value) -> Evaluation,
    ) -> Evaluation {
        match findings.answer_for(question) {
            None => Evaluation::Indeterminate(Indeterminacy::Unanswered(question.to_string())),
            Some(Value::Unknown) => {
                Evaluation::Indeterminate(Indeterminacy::AnsweredUnknown(question.to_string()))
            }
            Some(value) => test(value),
        }
    }

    fn numeric(findings: &Findings, question: &str, test: impl FnOnce(f64) -> bool) -> Evaluation {
        Self::with_answer(findings, question, |value| match value {
            Value::Number(v) => {
                if test(*v) {
                    Evaluation::True
                } else {
                    Evaluation::False
                }
            }
            _ => Evaluation::Indeterminate(Indeterminacy::Incomparable(question.to_string())),
        })
    }

    fn textual(
        findings: &Findings,
        question: &str,
        test: impl FnOnce(&str) -> bool,
    ) -> Evaluation {
        Self::with_answer(findings, question, |value| match value {
            Value::Text(t) => {
                if test(t) {
                    Evaluation::True
                } else {
                    Evaluation::False
                }
            }
            _ => Evaluation::Indeterminate(Indeterminacy::Incomparable(question.to_string())),
        })
    }

    fn evaluate_polarity(
        kb: &KnowledgeBase,
        findings: &Findings,
        question: &str,
        polarity: ChoiceKind,
    ) -> Evaluation {
        let Some(choice_id) = kb
            .qaset(question)
            .and_then(|q| q.choice_of_kind(polarity))
            .map(|c| c.id.clone())
        else {
            return Evaluation::Indeterminate(Indeterminacy::Incomparable(question.to_string()));
        };
        Self::Equal {
            question: question.to_string(),
            choice: choice_id,
        }
        .evaluate(kb, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::qaset::{Choice, QASet, QuestionKind};

    fn kb_with_yn() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::question(
            "Q1",
            "Fever?",
            QuestionKind::YesNo {
                choices: vec![
                    Choice::new("A_yes", "yes").with_kind(ChoiceKind::Yes),
                    Choice::new("A_no", "no").with_kind(ChoiceKind::No),
                ],
            },
        ))
        .unwrap();
        kb
    }

    #[test]
    fn unanswered_is_indeterminate() {
        let kb = kb_with_yn();
        let cond = Condition::NumGreater {
            question: "Qn".into(),
            threshold: 37.5,
        };
        assert_eq!(
            cond.evaluate(&kb, &Findings::new()),
            Evaluation::Indeterminate(Indeterminacy::Unanswered("Qn".into()))
        );
    }

    #[test]
    fn answered_unknown_differs_from_unanswered() {
        let kb = kb_with_yn();
        let mut findings = Findings::new();
        findings.answer("Qn", Value::Unknown);
        let cond = Condition::NumEqual {
            question: "Qn".into(),
            threshold: 1.0,
        };
        assert_eq!(
            cond.evaluate(&kb, &findings),
            Evaluation::Indeterminate(Indeterminacy::AnsweredUnknown("Qn".into()))
        );
    }

    #[test]
    fn known_and_unknown_conditions() {
        let kb = kb_with_yn();
        let mut findings = Findings::new();
        findings.answer("Qa", Value::Number(3.0));
        findings.answer("Qb", Value::Unknown);

        let known_a = Condition::Known {
            question: "Qa".into(),
        };
        let known_b = Condition::Known {
            question: "Qb".into(),
        };
        let unknown_b = Condition::Unknown {
            question: "Qb".into(),
        };
        assert_eq!(known_a.evaluate(&kb, &findings), Evaluation::True);
        assert_eq!(known_b.evaluate(&kb, &findings), Evaluation::False);
        assert_eq!(unknown_b.evaluate(&kb, &findings), Evaluation::True);
    }

    #[test]
    fn choice_yes_resolves_polarity_through_kb() {
        let kb = kb_with_yn();
        let mut findings = Findings::new();
        findings.answer("Q1", Value::choice("A_yes"));

        let yes = Condition::ChoiceYes {
            question: "Q1".into(),
        };
        let no = Condition::ChoiceNo {
            question: "Q1".into(),
        };
        assert_eq!(yes.evaluate(&kb, &findings), Evaluation::True);
        assert_eq!(no.evaluate(&kb, &findings), Evaluation::False);
    }

    #[test]
    fn and_short_circuits_on_false() {
        let kb = kb_with_yn();
        let cond = Condition::and(vec![
            Condition::NumGreater {
                question: "unanswered".into(),
                threshold: 1.0,
            },
            Condition::Known {
                question: "also-unanswered".into(),
            },
            Condition::DiagnosisState {
                diagnosis: "P1".into(),
                state: DiagnosisState::Established,
            },
        ])
        .unwrap();
        // The diagnosis-state operand is decidedly false (unrated = Unclear),
        // so the indeterminate operands do not matter.
        assert_eq!(cond.evaluate(&kb, &Findings::new()), Evaluation::False);
    }

    #[test]
    fn m_of_n_ranges() {
        let kb = kb_with_yn();
        let mut findings = Findings::new();
        findings.answer("Qa", Value::Number(10.0));
        findings.answer("Qb", Value::Number(10.0));

        let gt = |q: &str| Condition::NumGreater {
            question: q.into(),
            threshold: 5.0,
        };

        // Two of two hold, min 1 max 2.
        let cond = Condition::m_of_n(1, 2, vec![gt("Qa"), gt("Qb")]).unwrap();
        assert_eq!(cond.evaluate(&kb, &findings), Evaluation::True);

        // Too many hold: max 1 with two true operands.
        let cond = Condition::m_of_n(0, 1, vec![gt("Qa"), gt("Qb")]).unwrap();
        assert_eq!(cond.evaluate(&kb, &findings), Evaluation::False);

        // One open operand straddling the bound stays indeterminate.
        let cond = Condition::m_of_n(2, 2, vec![gt("Qa"), gt("Qc")]).unwrap();
        assert!(matches!(
            cond.evaluate(&kb, &findings),
            Evaluation::Indeterminate(_)
        ));
    }

    #[test]
    fn invariant_checks_reject_bad_composites() {
        assert!(matches!(
            Condition::and(vec![]),
            Err(DomainError::EmptyComposite)
        ));
        let leaf = Condition::Known {
            question: "Q".into(),
        };
        assert!(matches!(
            Condition::m_of_n(3, 2, vec![leaf.clone()]),
            Err(DomainError::MofNBounds { .. })
        ));
        assert!(matches!(
            Condition::m_of_n(0, 2, vec![leaf]),
            Err(DomainError::MofNBounds { .. })
        ));
    }
}
