//! Factories reconstructing rule conditions and actions from tagged nodes.
//!
//! Every dispatch runs over a fixed `type` vocabulary; nodes no built-in
//! branch recognizes are offered to the caller-injected extension chains.
//! A node nobody claims yields no condition and is recorded in the load
//! report — the enclosing composite keeps a documented hole instead of
//! silently shrinking.

use serde_json::{Value, json};

use crate::interval::NumericalInterval;
use crate::knowledge::action::{ActionValue, RuleAction};
use crate::knowledge::condition::Condition;
use crate::knowledge::diagnosis::DiagnosisState;
use crate::knowledge::formula::FormulaElement;
use crate::knowledge::qaset::QuestionKind;
use crate::knowledge::slice::Rule;
use crate::persist::loader::Resolver;
use crate::persist::report::LoadReport;
use crate::score::Score;

/// An extension claiming condition nodes outside the built-in vocabulary.
pub trait ConditionHandler {
    /// Whether this handler recognizes the node.
    fn claims(&self, node: &Value) -> bool;

    /// Build the condition; `None` leaves a reported hole.
    fn build(
        &self,
        node: &Value,
        resolver: &Resolver<'_>,
        report: &mut LoadReport,
    ) -> Option<Condition>;
}

/// An extension claiming action nodes outside the built-in vocabulary.
pub trait ActionHandler {
    /// Whether this handler recognizes the node.
    fn claims(&self, node: &Value) -> bool;

    /// Build the action; `None` drops the enclosing rule with a report entry.
    fn build(
        &self,
        node: &Value,
        resolver: &Resolver<'_>,
        report: &mut LoadReport,
    ) -> Option<RuleAction>;
}

/// Caller-injected extension chains for open condition/action vocabularies.
#[derive(Default)]
pub struct Extensions {
    pub condition_handlers: Vec<Box<dyn ConditionHandler>>,
    pub action_handlers: Vec<Box<dyn ActionHandler>>,
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("condition_handlers", &self.condition_handlers.len())
            .field("action_handlers", &self.action_handlers.len())
            .finish()
    }
}

/// Builds conditions, actions, and whole rules from tagged nodes.
pub struct Factory<'a, 'kb> {
    resolver: &'a Resolver<'kb>,
    extensions: &'a Extensions,
}

impl<'a, 'kb> Factory<'a, 'kb> {
    /// Create a factory resolving against the given resolver.
    pub fn new(resolver: &'a Resolver<'kb>, extensions: &'a Extensions) -> Self {
        Self {
            resolver,
            extensions,
        }
    }

    /// The resolver this factory resolves references through.
    pub fn resolver(&self) -> &'a Resolver<'kb> {
        self.resolver
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// Build a rule from its slice node.
    pub fn rule(&self, id: &str, node: &Value, report: &mut LoadReport) -> Option<Rule> {
        let Some(action_node) = node.get("action") else {
            report.format_issue(format!("rule {id} without action"));
            return None;
        };
        let action = self.action(action_node, report)?;

        let condition = node
            .get("condition")
            .and_then(|c| self.condition(c, report));
        let exception = node
            .get("exception")
            .and_then(|c| self.condition(c, report));
        let context = node.get("context").and_then(|c| self.condition(c, report));

        Some(Rule {
            id: id.to_string(),
            condition,
            exception,
            context,
            action,
            active: node.get("active").and_then(Value::as_bool).unwrap_or(true),
            comment: node
                .get("comment")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    // -----------------------------------------------------------------------
    // Conditions
    // -----------------------------------------------------------------------

    /// Build a condition from a tagged node.
    pub fn condition(&self, node: &Value, report: &mut LoadReport) -> Option<Condition> {
        let Some(kind) = node.get("type").and_then(Value::as_str) else {
            report.format_issue("condition node without type");
            return None;
        };

        match kind {
            // Non-terminals.
            "and" => {
                let operands = self.operands(node, report);
                self.composite(Condition::and(operands), "and", report)
            }
            "or" => {
                let operands = self.operands(node, report);
                self.composite(Condition::or(operands), "or", report)
            }
            "not" => {
                let inner = node.get("operand").and_then(|n| self.condition(n, report))?;
                Some(Condition::Not(Box::new(inner)))
            }
            "mofn" => self.m_of_n(node, report),

            // Terminals.
            "dstate" => self.diagnosis_state(node, report),
            "DState" => {
                // Accepted for documents from the previous format generation.
                tracing::info!("'DState' is treated as if it was 'dstate'");
                self.diagnosis_state(node, report)
            }
            "choiceYes" => self.choice_polarity(node, report, true),
            "choiceNo" => self.choice_polarity(node, report, false),
            "equal" => self.equal(node, report),
            "known" => self
                .question_ref(node, report, "known")
                .map(|question| Condition::Known { question }),
            "unknown" => self
                .question_ref(node, report, "unknown")
                .map(|question| Condition::Unknown { question }),
            "numGreater" => self.numeric(node, report, |question, threshold| {
                Condition::NumGreater {
                    question,
                    threshold,
                }
            }),
            "numGreaterEqual" => self.numeric(node, report, |question, threshold| {
                Condition::NumGreaterEqual {
                    question,
                    threshold,
                }
            }),
            "numLess" => self.numeric(node, report, |question, threshold| Condition::NumLess {
                question,
                threshold,
            }),
            "numLessEqual" => self.numeric(node, report, |question, threshold| {
                Condition::NumLessEqual {
                    question,
                    threshold,
                }
            }),
            "numEqual" => self.numeric(node, report, |question, threshold| Condition::NumEqual {
                question,
                threshold,
            }),
            "numIn" => self.num_in(node, report),
            "textContains" => self.textual(node, report, |question, value| {
                Condition::TextContains { question, value }
            }),
            "textEqual" => self.textual(node, report, |question, value| Condition::TextEquals {
                question,
                value,
            }),

            other => {
                if let Some(handler) = self
                    .extensions
                    .condition_handlers
                    .iter()
                    .find(|h| h.claims(node))
                {
                    handler.build(node, self.resolver, report)
                } else {
                    tracing::warn!(kind = other, "can't handle conditions of this type");
                    report.unclaimed_condition_types.push(other.to_string());
                    None
                }
            }
        }
    }

    fn operands(&self, node: &Value, report: &mut LoadReport) -> Vec<Condition> {
        node.get("operands")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.condition(child, report))
            .collect()
    }

    fn composite(
        &self,
        built: Result<Condition, crate::error::DomainError>,
        kind: &str,
        report: &mut LoadReport,
    ) -> Option<Condition> {
        match built {
            Ok(condition) => Some(condition),
            Err(e) => {
                tracing::warn!(kind, error = %e, "composite condition lost all operands");
                report.format_issue(format!("{kind} condition: {e}"));
                None
            }
        }
    }

    fn m_of_n(&self, node: &Value, report: &mut LoadReport) -> Option<Condition> {
        let Some(min) = node.get("min").and_then(Value::as_u64) else {
            report.format_issue("mofn condition without min");
            return None;
        };
        let operands = self.operands(node, report);
        let max = match node.get("max").and_then(Value::as_u64) {
            Some(max) => max as usize,
            None => {
                // Documents from the previous format generation omit max.
                tracing::warn!("mofn: max attribute missing, defaulting to operand count");
                operands.len()
            }
        };
        match Condition::m_of_n(min as usize, max, operands) {
            Ok(condition) => Some(condition),
            Err(e) => {
                report.format_issue(format!("mofn condition: {e}"));
                None
            }
        }
    }

    fn diagnosis_state(&self, node: &Value, report: &mut LoadReport) -> Option<Condition> {
        let id = require_str(node, "id", "dstate condition", report)?;
        if self.resolver.search_diagnosis(id).is_none() {
            report.unresolved(id, "dstate condition");
            return None;
        }
        let raw = require_str(node, "value", "dstate condition", report)?;
        let Some(state) = DiagnosisState::parse(raw) else {
            report.format_issue(format!("dstate condition: unknown state \"{raw}\""));
            return None;
        };
        Some(Condition::DiagnosisState {
            diagnosis: id.to_string(),
            state,
        })
    }

    fn choice_polarity(
        &self,
        node: &Value,
        report: &mut LoadReport,
        affirmative: bool,
    ) -> Option<Condition> {
        let kind = if affirmative { "choiceYes" } else { "choiceNo" };
        let id = require_str(node, "id", kind, report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, format!("{kind} condition"));
            return None;
        };
        if !matches!(question.question_kind(), Some(QuestionKind::YesNo { .. })) {
            report.format_issue(format!("{kind} condition: {id} is not a yes/no question"));
            return None;
        }
        Some(if affirmative {
            Condition::ChoiceYes {
                question: id.to_string(),
            }
        } else {
            Condition::ChoiceNo {
                question: id.to_string(),
            }
        })
    }

    fn equal(&self, node: &Value, report: &mut LoadReport) -> Option<Condition> {
        let id = require_str(node, "id", "equal condition", report)?;
        let value = require_str(node, "value", "equal condition", report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, "equal condition");
            return None;
        };
        // The choice normally belongs to the referenced question; accept a
        // choice declared on another question through the scan fallback.
        let owned = question.find_choice(value).is_some();
        if !owned && self.resolver.search_choice(value).is_none() {
            report.unresolved(value, format!("equal condition on {id}"));
            return None;
        }
        Some(Condition::Equal {
            question: id.to_string(),
            choice: value.to_string(),
        })
    }

    fn question_ref(
        &self,
        node: &Value,
        report: &mut LoadReport,
        kind: &str,
    ) -> Option<String> {
        let id = require_str(node, "id", kind, report)?;
        if self.resolver.search_question(id).is_none() {
            report.unresolved(id, format!("{kind} condition"));
            return None;
        }
        Some(id.to_string())
    }

    fn numeric_question_ref(
        &self,
        node: &Value,
        report: &mut LoadReport,
        kind: &str,
    ) -> Option<String> {
        let id = require_str(node, "id", kind, report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, format!("{kind} condition"));
            return None;
        };
        if !matches!(question.question_kind(), Some(QuestionKind::Numeric { .. })) {
            report.format_issue(format!("{kind} condition: {id} is not numeric"));
            return None;
        }
        Some(id.to_string())
    }

    fn numeric(
        &self,
        node: &Value,
        report: &mut LoadReport,
        build: impl FnOnce(String, f64) -> Condition,
    ) -> Option<Condition> {
        let question = self.numeric_question_ref(node, report, "numeric")?;
        let Some(threshold) = node.get("value").and_then(Value::as_f64) else {
            report.format_issue(format!("numeric condition on {question}: unparsable value"));
            return None;
        };
        Some(build(question, threshold))
    }

    fn num_in(&self, node: &Value, report: &mut LoadReport) -> Option<Condition> {
        let question = self.numeric_question_ref(node, report, "numIn")?;
        let Some(raw) = node.get("interval") else {
            report.format_issue(format!("numIn condition on {question}: missing interval"));
            return None;
        };
        let interval = serde_json::from_value::<NumericalInterval>(raw.clone())
            .map_err(|e| e.to_string())
            .and_then(|iv| {
                NumericalInterval::new(iv.lo, iv.hi, iv.lo_open, iv.hi_open)
                    .map_err(|e| e.to_string())
            });
        match interval {
            Ok(interval) => Some(Condition::NumInRange { question, interval }),
            Err(e) => {
                report.format_issue(format!("numIn condition on {question}: {e}"));
                None
            }
        }
    }

    fn textual(
        &self,
        node: &Value,
        report: &mut LoadReport,
        build: impl FnOnce(String, String) -> Condition,
    ) -> Option<Condition> {
        let id = require_str(node, "id", "text condition", report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, "text condition");
            return None;
        };
        if !matches!(question.question_kind(), Some(QuestionKind::Text)) {
            report.format_issue(format!("text condition: {id} is not a text question"));
            return None;
        }
        let value = require_str(node, "value", "text condition", report)?;
        Some(build(id.to_string(), value.to_string()))
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Build an action from a tagged node.
    pub fn action(&self, node: &Value, report: &mut LoadReport) -> Option<RuleAction> {
        let Some(kind) = node.get("type").and_then(Value::as_str) else {
            report.format_issue("action node without type");
            return None;
        };
        match kind {
            "indicate" => Some(RuleAction::Indicate {
                targets: self.qaset_targets(node, report),
            }),
            "instantIndicate" => Some(RuleAction::InstantIndicate {
                targets: self.qaset_targets(node, report),
            }),
            "contraIndicate" => Some(RuleAction::ContraIndicate {
                targets: self.qaset_targets(node, report),
            }),
            "clarify" => self
                .diagnosis_target(node, report, "clarify")
                .map(|target| RuleAction::Clarify { target }),
            "refine" => self
                .diagnosis_target(node, report, "refine")
                .map(|target| RuleAction::Refine { target }),
            "heuristic" => self.heuristic(node, report),
            "setValue" => self
                .value_assignment(node, report)
                .map(|(question, values)| RuleAction::SetValue { question, values }),
            "addValue" => self
                .value_assignment(node, report)
                .map(|(question, values)| RuleAction::AddValue { question, values }),
            "suppressChoices" => self.suppress(node, report),
            other => {
                if let Some(handler) = self
                    .extensions
                    .action_handlers
                    .iter()
                    .find(|h| h.claims(node))
                {
                    handler.build(node, self.resolver, report)
                } else {
                    tracing::warn!(kind = other, "no handler registered for action type");
                    report.unclaimed_action_types.push(other.to_string());
                    None
                }
            }
        }
    }

    fn qaset_targets(&self, node: &Value, report: &mut LoadReport) -> Vec<String> {
        let mut targets = Vec::new();
        for raw in node
            .get("targets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let Some(id) = raw.as_str() else {
                report.format_issue("action target is not a string");
                continue;
            };
            if self.resolver.search_qaset(id).is_some() {
                targets.push(id.to_string());
            } else {
                report.unresolved(id, "action targets");
            }
        }
        targets
    }

    fn diagnosis_target(
        &self,
        node: &Value,
        report: &mut LoadReport,
        kind: &str,
    ) -> Option<String> {
        let id = require_str(node, "target", kind, report)?;
        if self.resolver.search_diagnosis(id).is_none() {
            report.unresolved(id, format!("{kind} action"));
            return None;
        }
        Some(id.to_string())
    }

    fn heuristic(&self, node: &Value, report: &mut LoadReport) -> Option<RuleAction> {
        let id = require_str(node, "diagnosis", "heuristic action", report)?;
        if self.resolver.search_diagnosis(id).is_none() {
            report.unresolved(id, "heuristic action");
            return None;
        }
        let raw = require_str(node, "score", "heuristic action", report)?;
        let Some(score) = Score::parse(raw) else {
            report.format_issue(format!("heuristic action: unparsable score \"{raw}\""));
            return None;
        };
        Some(RuleAction::Heuristic {
            diagnosis: id.to_string(),
            score,
        })
    }

    fn value_assignment(
        &self,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<(String, Vec<ActionValue>)> {
        let id = require_str(node, "question", "value action", report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, "value action");
            return None;
        };
        let mut values = Vec::new();
        for raw in node
            .get("values")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            if let Some(choice_id) = raw.get("choice").and_then(Value::as_str) {
                if question.find_choice(choice_id).is_some()
                    || self.resolver.search_choice(choice_id).is_some()
                {
                    values.push(ActionValue::Choice(choice_id.to_string()));
                } else {
                    report.unresolved(choice_id, format!("value action on {id}"));
                }
            } else if let Some(formula_node) = raw.get("formula") {
                if let Some(formula) = self.formula(formula_node, report) {
                    values.push(ActionValue::Formula(formula));
                }
            } else {
                report.format_issue(format!("value action on {id}: unrecognized value node"));
            }
        }
        Some((id.to_string(), values))
    }

    fn suppress(&self, node: &Value, report: &mut LoadReport) -> Option<RuleAction> {
        let id = require_str(node, "question", "suppressChoices action", report)?;
        let Some(question) = self.resolver.search_question(id) else {
            report.unresolved(id, "suppressChoices action");
            return None;
        };
        let mut choices = Vec::new();
        for raw in node
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let Some(choice_id) = raw.as_str() else {
                report.format_issue("suppressed choice is not a string");
                continue;
            };
            if question.find_choice(choice_id).is_some() {
                choices.push(choice_id.to_string());
            } else {
                report.unresolved(choice_id, format!("suppressChoices on {id}"));
            }
        }
        Some(RuleAction::SuppressChoices {
            question: id.to_string(),
            choices,
        })
    }

    // -----------------------------------------------------------------------
    // Formulas
    // -----------------------------------------------------------------------

    /// Build a formula expression tree from a tagged node.
    pub fn formula(&self, node: &Value, report: &mut LoadReport) -> Option<FormulaElement> {
        let Some(kind) = node.get("type").and_then(Value::as_str) else {
            report.format_issue("formula node without type");
            return None;
        };
        match kind {
            "number" => {
                let Some(value) = node.get("value").and_then(Value::as_f64) else {
                    report.format_issue("number formula: unparsable value");
                    return None;
                };
                Some(FormulaElement::Number(value))
            }
            "question" => {
                let id = self.numeric_question_ref(node, report, "question formula")?;
                Some(FormulaElement::QuestionRef(id))
            }
            "count" => {
                let id = require_str(node, "id", "count formula", report)?;
                let Some(question) = self.resolver.search_question(id) else {
                    report.unresolved(id, "count formula");
                    return None;
                };
                if !matches!(
                    question.question_kind(),
                    Some(QuestionKind::MultipleChoice { .. })
                ) {
                    report.format_issue(format!(
                        "count formula: {id} is not a multiple-choice question"
                    ));
                    return None;
                }
                Some(FormulaElement::Count(id.to_string()))
            }
            "add" | "sub" | "mul" | "div" | "min" | "max" => {
                let lhs = Box::new(self.formula(node.get("lhs")?, report)?);
                let rhs = Box::new(self.formula(node.get("rhs")?, report)?);
                Some(match kind {
                    "add" => FormulaElement::Add(lhs, rhs),
                    "sub" => FormulaElement::Sub(lhs, rhs),
                    "mul" => FormulaElement::Mul(lhs, rhs),
                    "div" => FormulaElement::Div(lhs, rhs),
                    "min" => FormulaElement::Min(lhs, rhs),
                    _ => FormulaElement::Max(lhs, rhs),
                })
            }
            other => {
                report.format_issue(format!("unknown formula type \"{other}\""));
                None
            }
        }
    }
}

fn require_str<'v>(
    node: &'v Value,
    key: &str,
    context: &str,
    report: &mut LoadReport,
) -> Option<&'v str> {
    match node.get(key).and_then(Value::as_str) {
        Some(value) => Some(value),
        None => {
            report.format_issue(format!("{context}: missing \"{key}\""));
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding back to tagged nodes
// ---------------------------------------------------------------------------

/// Encode a condition as its tagged node.
pub fn condition_to_node(condition: &Condition) -> Value {
    match condition {
        Condition::And(operands) => json!({
            "type": "and",
            "operands": operands.iter().map(condition_to_node).collect::<Vec<_>>(),
        }),
        Condition::Or(operands) => json!({
            "type": "or",
            "operands": operands.iter().map(condition_to_node).collect::<Vec<_>>(),
        }),
        Condition::Not(inner) => json!({
            "type": "not",
            "operand": condition_to_node(inner),
        }),
        Condition::MofN { min, max, operands } => json!({
            "type": "mofn",
            "min": min,
            "max": max,
            "operands": operands.iter().map(condition_to_node).collect::<Vec<_>>(),
        }),
        Condition::DiagnosisState { diagnosis, state } => json!({
            "type": "dstate",
            "id": diagnosis,
            "value": state.as_str(),
        }),
        Condition::ChoiceYes { question } => json!({"type": "choiceYes", "id": question}),
        Condition::ChoiceNo { question } => json!({"type": "choiceNo", "id": question}),
        Condition::Equal { question, choice } => json!({
            "type": "equal",
            "id": question,
            "value": choice,
        }),
        Condition::Known { question } => json!({"type": "known", "id": question}),
        Condition::Unknown { question } => json!({"type": "unknown", "id": question}),
        Condition::NumGreater {
            question,
            threshold,
        } => json!({"type": "numGreater", "id": question, "value": threshold}),
        Condition::NumGreaterEqual {
            question,
            threshold,
        } => json!({"type": "numGreaterEqual", "id": question, "value": threshold}),
        Condition::NumLess {
            question,
            threshold,
        } => json!({"type": "numLess", "id": question, "value": threshold}),
        Condition::NumLessEqual {
            question,
            threshold,
        } => json!({"type": "numLessEqual", "id": question, "value": threshold}),
        Condition::NumEqual {
            question,
            threshold,
        } => json!({"type": "numEqual", "id": question, "value": threshold}),
        Condition::NumInRange { question, interval } => json!({
            "type": "numIn",
            "id": question,
            "interval": serde_json::to_value(interval).expect("interval serializes"),
        }),
        Condition::TextContains { question, value } => json!({
            "type": "textContains",
            "id": question,
            "value": value,
        }),
        Condition::TextEquals { question, value } => json!({
            "type": "textEqual",
            "id": question,
            "value": value,
        }),
    }
}

/// Encode an action as its tagged node.
pub fn action_to_node(action: &RuleAction) -> Value {
    match action {
        RuleAction::Indicate { targets }
        | RuleAction::InstantIndicate { targets }
        | RuleAction::ContraIndicate { targets } => json!({
            "type": action.tag(),
            "targets": targets,
        }),
        RuleAction::Clarify { target } | RuleAction::Refine { target } => json!({
            "type": action.tag(),
            "target": target,
        }),
        RuleAction::Heuristic { diagnosis, score } => json!({
            "type": "heuristic",
            "diagnosis": diagnosis,
            "score": score.as_str(),
        }),
        RuleAction::SetValue { question, values } | RuleAction::AddValue { question, values } => {
            json!({
                "type": action.tag(),
                "question": question,
                "values": values.iter().map(value_to_node).collect::<Vec<_>>(),
            })
        }
        RuleAction::SuppressChoices { question, choices } => json!({
            "type": "suppressChoices",
            "question": question,
            "choices": choices,
        }),
    }
}

fn value_to_node(value: &ActionValue) -> Value {
    match value {
        ActionValue::Choice(id) => json!({"choice": id}),
        ActionValue::Formula(formula) => json!({"formula": formula_to_node(formula)}),
    }
}

/// Encode a formula expression tree as its tagged node.
pub fn formula_to_node(formula: &FormulaElement) -> Value {
    match formula {
        FormulaElement::Number(value) => json!({"type": "number", "value": value}),
        FormulaElement::QuestionRef(id) => json!({"type": "question", "id": id}),
        FormulaElement::Count(id) => json!({"type": "count", "id": id}),
        FormulaElement::Add(lhs, rhs) => binary("add", lhs, rhs),
        FormulaElement::Sub(lhs, rhs) => binary("sub", lhs, rhs),
        FormulaElement::Mul(lhs, rhs) => binary("mul", lhs, rhs),
        FormulaElement::Div(lhs, rhs) => binary("div", lhs, rhs),
        FormulaElement::Min(lhs, rhs) => binary("min", lhs, rhs),
        FormulaElement::Max(lhs, rhs) => binary("max", lhs, rhs),
    }
}

fn binary(tag: &str, lhs: &FormulaElement, rhs: &FormulaElement) -> Value {
    json!({"type": tag, "lhs": formula_to_node(lhs), "rhs": formula_to_node(rhs)})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::knowledge::qaset::{Choice, ChoiceKind, QASet};
    use serde_json::json;

    fn sample_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::container("Q000", "root")).unwrap();
        kb.insert_qaset(QASet::question(
            "Q1",
            "color",
            QuestionKind::OneChoice {
                choices: vec![Choice::new("A1", "red"), Choice::new("A2", "blue")],
            },
        ))
        .unwrap();
        kb.insert_qaset(QASet::question(
            "Qyn",
            "fever",
            QuestionKind::YesNo {
                choices: vec![
                    Choice::new("A_yes", "yes").with_kind(ChoiceKind::Yes),
                    Choice::new("A_no", "no").with_kind(ChoiceKind::No),
                ],
            },
        ))
        .unwrap();
        kb.insert_qaset(QASet::question(
            "Qn",
            "temperature",
            QuestionKind::Numeric { partitions: vec![] },
        ))
        .unwrap();
        kb.insert_diagnosis(crate::knowledge::diagnosis::Diagnosis::new("P1", "flu"))
            .unwrap();
        kb
    }

    fn build(node: Value) -> (Option<Condition>, LoadReport) {
        let kb = sample_kb();
        let resolver = Resolver::new(&kb);
        let extensions = Extensions::default();
        let factory = Factory::new(&resolver, &extensions);
        let mut report = LoadReport::new();
        let condition = factory.condition(&node, &mut report);
        (condition, report)
    }

    #[test]
    fn builds_nested_composites() {
        let (condition, report) = build(json!({
            "type": "and",
            "operands": [
                {"type": "equal", "id": "Q1", "value": "A1"},
                {"type": "not", "operand": {"type": "choiceNo", "id": "Qyn"}},
                {"type": "numGreater", "id": "Qn", "value": 38.0}
            ]
        }));
        assert!(report.is_clean(), "{report:?}");
        let Some(Condition::And(operands)) = condition else {
            panic!("expected And");
        };
        assert_eq!(operands.len(), 3);
    }

    #[test]
    fn mofn_defaults_max_to_operand_count() {
        let (condition, report) = build(json!({
            "type": "mofn",
            "min": 1,
            "operands": [
                {"type": "known", "id": "Q1"},
                {"type": "known", "id": "Qn"},
                {"type": "known", "id": "Qyn"}
            ]
        }));
        assert!(report.is_clean());
        let Some(Condition::MofN { min, max, operands }) = condition else {
            panic!("expected MofN");
        };
        assert_eq!(min, 1);
        assert_eq!(max, operands.len());
        assert_eq!(max, 3);
    }

    #[test]
    fn unclaimed_type_is_reported_as_hole() {
        let (condition, report) = build(json!({
            "type": "and",
            "operands": [
                {"type": "known", "id": "Q1"},
                {"type": "temporalCourse", "window": 3}
            ]
        }));
        assert_eq!(report.unclaimed_condition_types, ["temporalCourse"]);
        // The composite survives with the hole recorded.
        let Some(Condition::And(operands)) = condition else {
            panic!("expected And");
        };
        assert_eq!(operands.len(), 1);
    }

    #[test]
    fn extension_chain_claims_unknown_types() {
        struct Always;
        impl ConditionHandler for Always {
            fn claims(&self, node: &Value) -> bool {
                node.get("type").and_then(Value::as_str) == Some("temporalCourse")
            }
            fn build(
                &self,
                _node: &Value,
                _resolver: &Resolver<'_>,
                _report: &mut LoadReport,
            ) -> Option<Condition> {
                Some(Condition::Known {
                    question: "Q1".into(),
                })
            }
        }

        let kb = sample_kb();
        let resolver = Resolver::new(&kb);
        let extensions = Extensions {
            condition_handlers: vec![Box::new(Always)],
            action_handlers: Vec::new(),
        };
        let factory = Factory::new(&resolver, &extensions);
        let mut report = LoadReport::new();
        let condition = factory.condition(&json!({"type": "temporalCourse"}), &mut report);
        assert!(condition.is_some());
        assert!(report.unclaimed_condition_types.is_empty());
    }

    #[test]
    fn legacy_dstate_alias_is_accepted() {
        let (condition, report) = build(json!({
            "type": "DState", "id": "P1", "value": "established"
        }));
        assert!(report.is_clean());
        assert!(matches!(condition, Some(Condition::DiagnosisState { .. })));
    }

    #[test]
    fn type_mismatch_is_a_format_issue() {
        let (condition, report) = build(json!({
            "type": "numGreater", "id": "Q1", "value": 3.0
        }));
        assert!(condition.is_none());
        assert_eq!(report.format_issues.len(), 1);
    }

    #[test]
    fn rule_keeps_condition_hole() {
        let kb = sample_kb();
        let resolver = Resolver::new(&kb);
        let extensions = Extensions::default();
        let factory = Factory::new(&resolver, &extensions);
        let mut report = LoadReport::new();

        let rule = factory
            .rule(
                "R1",
                &json!({
                    "condition": {"type": "futureKind"},
                    "action": {"type": "heuristic", "diagnosis": "P1", "score": "p2"}
                }),
                &mut report,
            )
            .unwrap();
        assert!(rule.condition.is_none());
        assert_eq!(report.unclaimed_condition_types, ["futureKind"]);
        assert!(rule.active);
    }

    #[test]
    fn condition_nodes_round_trip_through_encoder() {
        let kb = sample_kb();
        let resolver = Resolver::new(&kb);
        let extensions = Extensions::default();
        let factory = Factory::new(&resolver, &extensions);
        let mut report = LoadReport::new();

        let node = json!({
            "type": "or",
            "operands": [
                {"type": "mofn", "min": 1, "max": 2, "operands": [
                    {"type": "equal", "id": "Q1", "value": "A2"},
                    {"type": "numIn", "id": "Qn",
                     "interval": {"lo": 37.5, "hi": 42.0, "lo_open": true}}
                ]},
                {"type": "textContains", "id": "Qt", "value": "ache"}
            ]
        });
        // Qt does not exist; the hole is recorded and the Or keeps one operand.
        let condition = factory.condition(&node, &mut report).unwrap();
        let encoded = condition_to_node(&condition);
        let reparsed = factory.condition(&encoded, &mut report).unwrap();
        assert_eq!(condition, reparsed);
    }
}
