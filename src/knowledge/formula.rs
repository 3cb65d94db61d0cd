//! Formula expression trees for computed question values.

use serde::{Deserialize, Serialize};

use crate::knowledge::condition::{Findings, Value};

/// A numeric expression over findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaElement {
    /// A constant.
    Number(f64),
    /// The numeric answer of a question.
    QuestionRef(String),
    /// The number of selected choices of a multiple-choice question.
    Count(String),
    Add(Box<FormulaElement>, Box<FormulaElement>),
    Sub(Box<FormulaElement>, Box<FormulaElement>),
    Mul(Box<FormulaElement>, Box<FormulaElement>),
    Div(Box<FormulaElement>, Box<FormulaElement>),
    Min(Box<FormulaElement>, Box<FormulaElement>),
    Max(Box<FormulaElement>, Box<FormulaElement>),
}

impl FormulaElement {
    /// Evaluate to a number, or `None` when an operand is unavailable
    /// (unanswered, answered unknown, wrong type, division by zero).
    pub fn evaluate(&self, findings: &Findings) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::QuestionRef(q) => match findings.answer_for(q)? {
                Value::Number(v) => Some(*v),
                _ => None,
            },
            Self::Count(q) => match findings.answer_for(q)? {
                Value::Choices(selected) => Some(selected.len() as f64),
                _ => None,
            },
            Self::Add(a, b) => Some(a.evaluate(findings)? + b.evaluate(findings)?),
            Self::Sub(a, b) => Some(a.evaluate(findings)? - b.evaluate(findings)?),
            Self::Mul(a, b) => Some(a.evaluate(findings)? * b.evaluate(findings)?),
            Self::Div(a, b) => {
                let divisor = b.evaluate(findings)?;
                if divisor == 0.0 {
                    None
                } else {
                    Some(a.evaluate(findings)? / divisor)
                }
            }
            Self::Min(a, b) => Some(a.evaluate(findings)?.min(b.evaluate(findings)?)),
            Self::Max(a, b) => Some(a.evaluate(findings)?.max(b.evaluate(findings)?)),
        }
    }
}
