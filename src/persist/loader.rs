//! The primary document loader and its reference resolver.
//!
//! Loading is two-phase: phase one allocates every entity in the knowledge
//! base's id-keyed arenas while recording raw child-id lists; phase two
//! resolves the recorded references and wires hierarchy edges once every id
//! of the load unit is known. Problems land in the [`LoadReport`] instead
//! of aborting — a missing reference costs exactly the edge or slice that
//! needed it.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::PersistError;
use crate::interval::NumericalInterval;
use crate::knowledge::diagnosis::Diagnosis;
use crate::knowledge::hierarchy::LinkKind;
use crate::knowledge::qaset::{Choice, ChoiceKind, QASet, QuestionKind};
use crate::knowledge::slice::{KnowledgeSlice, SimilarityModel, ValueSchema};
use crate::knowledge::{CostDeclaration, KnowledgeBase};
use crate::persist::factory::{Extensions, Factory};
use crate::persist::report::LoadReport;
use crate::score::Score;

/// The designated QASet root id used when a document declares none.
pub const DEFAULT_ROOT_QASET: &str = "Q000";

/// Root key of the primary document.
pub const PRIMARY_ROOT_KEY: &str = "knowledge-base";

// ---------------------------------------------------------------------------
// Reference resolver
// ---------------------------------------------------------------------------

/// What an id resolved to.
#[derive(Debug)]
pub enum Resolved<'a> {
    Container(&'a QASet),
    Question(&'a QASet),
    Choice {
        question: &'a QASet,
        choice: &'a Choice,
    },
    Diagnosis(&'a Diagnosis),
    Slice(&'a KnowledgeSlice),
}

/// Resolves string ids against the assembled knowledge base.
///
/// QASet, diagnosis, and slice lookups hit the arenas directly. Choice
/// lookups need a scan over every choice question; the scan runs at most
/// once per resolver and its result is kept for all later lookups.
pub struct Resolver<'a> {
    kb: &'a KnowledgeBase,
    choice_index: OnceCell<HashMap<String, String>>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over the knowledge base as assembled so far.
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self {
            kb,
            choice_index: OnceCell::new(),
        }
    }

    /// The underlying knowledge base.
    pub fn knowledge_base(&self) -> &'a KnowledgeBase {
        self.kb
    }

    /// Search all namespaces in the legacy priority order: container,
    /// question, choice, diagnosis, slice. First match wins.
    pub fn search(&self, id: &str) -> Option<Resolved<'a>> {
        let id = id.trim();
        if let Some(c) = self.search_container(id) {
            return Some(Resolved::Container(c));
        }
        if let Some(q) = self.search_question(id) {
            return Some(Resolved::Question(q));
        }
        if let Some((question, choice)) = self.search_choice(id) {
            return Some(Resolved::Choice { question, choice });
        }
        if let Some(d) = self.search_diagnosis(id) {
            return Some(Resolved::Diagnosis(d));
        }
        self.search_slice(id).map(Resolved::Slice)
    }

    /// A container with the given id.
    pub fn search_container(&self, id: &str) -> Option<&'a QASet> {
        self.kb.qaset(id.trim()).filter(|q| q.is_container())
    }

    /// A question with the given id.
    pub fn search_question(&self, id: &str) -> Option<&'a QASet> {
        self.kb.qaset(id.trim()).filter(|q| q.is_question())
    }

    /// A QASet of either flavor.
    pub fn search_qaset(&self, id: &str) -> Option<&'a QASet> {
        self.kb.qaset(id.trim())
    }

    /// The choice with the given id and the question that owns it.
    pub fn search_choice(&self, id: &str) -> Option<(&'a QASet, &'a Choice)> {
        let id = id.trim();
        let index = self.choice_index.get_or_init(|| {
            let mut index = HashMap::new();
            for qaset in self.kb.qasets() {
                for choice in qaset.choices().unwrap_or_default() {
                    index.insert(choice.id.clone(), qaset.id.clone());
                }
            }
            index
        });
        let question = self.kb.qaset(index.get(id)?)?;
        let choice = question.find_choice(id)?;
        Some((question, choice))
    }

    /// A diagnosis with the given id.
    pub fn search_diagnosis(&self, id: &str) -> Option<&'a Diagnosis> {
        self.kb.diagnosis(id.trim())
    }

    /// A knowledge slice with the given id.
    pub fn search_slice(&self, id: &str) -> Option<&'a KnowledgeSlice> {
        self.kb.slice(id.trim())
    }

    /// All namespaces in which the id resolves, for collision reporting.
    pub fn namespaces_of(&self, id: &str) -> Vec<&'static str> {
        let mut hits = Vec::new();
        if self.search_container(id).is_some() {
            hits.push("container");
        }
        if self.search_question(id).is_some() {
            hits.push("question");
        }
        if self.search_choice(id).is_some() {
            hits.push("choice");
        }
        if self.search_diagnosis(id).is_some() {
            hits.push("diagnosis");
        }
        if self.search_slice(id).is_some() {
            hits.push("slice");
        }
        hits
    }
}

// ---------------------------------------------------------------------------
// Document loader
// ---------------------------------------------------------------------------

/// A raw child reference captured in phase one.
#[derive(Debug, Clone)]
struct ChildRef {
    id: String,
    linked: bool,
}

/// Loads primary-document trees into a knowledge base.
pub struct DocumentLoader<'x> {
    extensions: &'x Extensions,
}

impl<'x> DocumentLoader<'x> {
    /// Create a loader using the given extension chains.
    pub fn new(extensions: &'x Extensions) -> Self {
        Self { extensions }
    }

    /// Build a knowledge base from a parsed primary document.
    pub fn load_document(
        &self,
        doc: &Value,
        report: &mut LoadReport,
    ) -> Result<KnowledgeBase, PersistError> {
        let root = doc
            .get(PRIMARY_ROOT_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| PersistError::Document {
                location: PRIMARY_ROOT_KEY.into(),
                message: format!("document has no \"{PRIMARY_ROOT_KEY}\" object"),
            })?;

        let root_qaset = root
            .get("root")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ROOT_QASET);
        let mut kb = KnowledgeBase::new(root_qaset);

        // Guard against the literal "null" ids older exporters wrote.
        if let Some(id) = root.get("id").and_then(Value::as_str)
            && !id.trim().is_empty()
            && id != "null"
        {
            kb.set_id(id);
        }

        if let Some(props) = root.get("properties").and_then(Value::as_object) {
            for (key, value) in props {
                match value.as_str() {
                    Some(v) => kb.set_property(key, v),
                    None => report.format_issue(format!("property {key} is not a string")),
                }
            }
        }

        self.load_costs(&mut kb, root.get("costs"), report);

        let mut child_requests: Vec<(String, Vec<ChildRef>)> = Vec::new();

        for node in array_of(root.get("qcontainers")) {
            if let Some((qaset, children)) = self.parse_container(node, report) {
                let id = qaset.id.clone();
                if let Err(e) = kb.insert_qaset(qaset) {
                    tracing::warn!(error = %e, "skipping container");
                    report.format_issue(e.to_string());
                    continue;
                }
                child_requests.push((id, children));
            }
        }

        for node in array_of(root.get("questions")) {
            if let Some((qaset, children)) = self.parse_question(node, report) {
                let id = qaset.id.clone();
                if let Err(e) = kb.insert_qaset(qaset) {
                    tracing::warn!(error = %e, "skipping question");
                    report.format_issue(e.to_string());
                    continue;
                }
                child_requests.push((id, children));
            }
        }

        // Phase two: every qaset of the unit exists, wire the tree.
        for (parent, children) in &child_requests {
            for child in children {
                if kb.qaset(&child.id).is_some() {
                    let kind = if child.linked {
                        LinkKind::Linked
                    } else {
                        LinkKind::Owned
                    };
                    kb.add_qaset_edge(parent, &child.id, kind);
                } else {
                    tracing::warn!(
                        child = %child.id,
                        parent = %parent,
                        "no qaset for child id; if this container was not hand-edited, \
                         saving is broken"
                    );
                    report.unresolved(&child.id, format!("children of {parent}"));
                }
            }
        }

        let removed = kb.cleanup_orphan_qasets();
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "removed orphaned qasets");
        }

        let mut diagnosis_requests: Vec<(String, Vec<ChildRef>)> = Vec::new();
        for node in array_of(root.get("diagnoses")) {
            if let Some((diagnosis, children)) = self.parse_diagnosis(node, report) {
                let id = diagnosis.id.clone();
                if let Err(e) = kb.insert_diagnosis(diagnosis) {
                    tracing::warn!(error = %e, "skipping diagnosis");
                    report.format_issue(e.to_string());
                    continue;
                }
                diagnosis_requests.push((id, children));
            }
        }
        for (parent, children) in &diagnosis_requests {
            for child in children {
                if kb.diagnosis(&child.id).is_some() {
                    let kind = if child.linked {
                        LinkKind::Linked
                    } else {
                        LinkKind::Owned
                    };
                    kb.add_diagnosis_edge(parent, &child.id, kind);
                } else {
                    tracing::warn!(child = %child.id, parent = %parent, "no diagnosis for child id");
                    report.unresolved(&child.id, format!("children of diagnosis {parent}"));
                }
            }
        }

        let mut init = Vec::new();
        for node in array_of(root.get("init-questions")) {
            let Some(id) = node.as_str() else {
                report.format_issue("init-questions entry is not a string");
                continue;
            };
            if kb.qaset(id).is_some() {
                init.push(id.to_string());
            } else {
                report.unresolved(id, "init-questions");
            }
        }
        kb.set_init_questions(init);

        self.load_slices(&mut kb, array_of(root.get("slices")), report);

        self.detect_collisions(&kb, report);

        Ok(kb)
    }

    /// Build and insert knowledge slices from tagged nodes. Reused by the
    /// patch loader against its restricted document root.
    pub fn load_slices(
        &self,
        kb: &mut KnowledgeBase,
        nodes: &[Value],
        report: &mut LoadReport,
    ) -> usize {
        let built: Vec<KnowledgeSlice> = {
            let resolver = Resolver::new(kb);
            let factory = Factory::new(&resolver, self.extensions);
            nodes
                .iter()
                .filter_map(|node| self.build_slice(&factory, node, report))
                .collect()
        };
        let mut inserted = 0;
        for slice in built {
            let id = slice.id().to_string();
            match kb.insert_slice(slice) {
                Ok(()) => inserted += 1,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "slice not inserted");
                    report.format_issue(e.to_string());
                }
            }
        }
        inserted
    }

    /// Build a single slice from its tagged node without inserting it.
    pub fn build_slice(
        &self,
        factory: &Factory<'_, '_>,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<KnowledgeSlice> {
        let Some(id) = node.get("id").and_then(Value::as_str) else {
            report.format_issue("slice without id");
            return None;
        };
        let Some(kind) = node.get("type").and_then(Value::as_str) else {
            report.format_issue(format!("slice {id} without type"));
            return None;
        };
        match kind {
            "rule" => {
                let rule = factory.rule(id, node, report);
                if rule.is_none() {
                    tracing::warn!(id, "rule could not be inserted");
                }
                rule.map(KnowledgeSlice::Rule)
            }
            "schema" => self.parse_schema(factory.resolver(), id, node, report),
            "similarity" => self.parse_similarity(factory.resolver(), id, node, report),
            other => {
                report.format_issue(format!("unknown slice type \"{other}\" on {id}"));
                None
            }
        }
    }

    fn parse_schema(
        &self,
        resolver: &Resolver<'_>,
        id: &str,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<KnowledgeSlice> {
        let Some(question_id) = node.get("question").and_then(Value::as_str) else {
            report.format_issue(format!("schema {id} without question"));
            return None;
        };
        let Some(question) = resolver.search_question(question_id) else {
            tracing::warn!(id, question_id, "schema references unknown question");
            report.unresolved(question_id, format!("schema {id}"));
            return None;
        };
        if !matches!(
            question.question_kind(),
            Some(QuestionKind::Numeric { .. })
        ) {
            report.format_issue(format!("schema {id}: {question_id} is not numeric"));
            return None;
        }
        let thresholds: Vec<f64> = match node.get("thresholds").and_then(Value::as_array) {
            Some(values) => {
                let parsed: Option<Vec<f64>> = values.iter().map(Value::as_f64).collect();
                match parsed {
                    Some(t) if !t.is_empty() => t,
                    _ => {
                        report.format_issue(format!("schema {id}: unparsable thresholds"));
                        return None;
                    }
                }
            }
            None => {
                report.format_issue(format!("schema {id}: missing thresholds"));
                return None;
            }
        };
        Some(KnowledgeSlice::Schema(ValueSchema {
            id: id.to_string(),
            question: question_id.to_string(),
            thresholds,
        }))
    }

    fn parse_similarity(
        &self,
        resolver: &Resolver<'_>,
        id: &str,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<KnowledgeSlice> {
        let Some(raw) = node.get("weights").and_then(Value::as_object) else {
            report.format_issue(format!("similarity {id} without weights"));
            return None;
        };
        let mut weights = BTreeMap::new();
        for (question_id, weight) in raw {
            let Some(weight) = weight.as_f64() else {
                report.format_issue(format!("similarity {id}: weight of {question_id}"));
                continue;
            };
            if resolver.search_question(question_id).is_none() {
                report.unresolved(question_id, format!("similarity {id}"));
                continue;
            }
            weights.insert(question_id.clone(), weight);
        }
        Some(KnowledgeSlice::Similarity(SimilarityModel {
            id: id.to_string(),
            weights,
        }))
    }

    fn load_costs(&self, kb: &mut KnowledgeBase, node: Option<&Value>, report: &mut LoadReport) {
        for cost in array_of(node) {
            let Some(id) = cost.get("id").and_then(Value::as_str) else {
                report.format_issue("cost declaration without id");
                continue;
            };
            let Some(verbalization) = cost.get("verbalization").and_then(Value::as_str) else {
                tracing::warn!(id, "cost could not be set");
                report.format_issue(format!("cost {id} without verbalization"));
                continue;
            };
            let unit = cost.get("unit").and_then(Value::as_str).map(str::to_string);
            kb.declare_cost(
                id,
                CostDeclaration {
                    verbalization: verbalization.to_string(),
                    unit,
                },
            );
        }
    }

    fn parse_container(
        &self,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<(QASet, Vec<ChildRef>)> {
        let id = node.get("id").and_then(Value::as_str)?;
        let text = node.get("text").and_then(Value::as_str).unwrap_or_default();
        let mut qaset = QASet::container(id, text);
        if let Some(priority) = node.get("priority") {
            match priority.as_i64() {
                Some(p) => {
                    qaset.payload = crate::knowledge::qaset::QASetPayload::Container {
                        priority: Some(p as i32),
                    };
                }
                None => report.format_issue(format!("container {id}: unparsable priority")),
            }
        }
        qaset.properties = parse_properties(node, report);
        Some((qaset, self.parse_children(node)))
    }

    fn parse_question(
        &self,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<(QASet, Vec<ChildRef>)> {
        let id = node.get("id").and_then(Value::as_str)?;
        let text = node.get("text").and_then(Value::as_str).unwrap_or_default();
        // Documents from the oldest generation may omit the type; one-choice
        // is the compatible default.
        let kind_tag = node.get("type").and_then(Value::as_str).unwrap_or("OC");

        let kind = match kind_tag {
            "OC" => QuestionKind::OneChoice {
                choices: self.parse_choices(node, report),
            },
            "MC" => QuestionKind::MultipleChoice {
                choices: self.parse_choices(node, report),
            },
            "YN" => QuestionKind::YesNo {
                choices: self.parse_choices(node, report),
            },
            "Num" => QuestionKind::Numeric {
                partitions: self.parse_partitions(id, node, report),
            },
            "Text" => QuestionKind::Text,
            "Date" => QuestionKind::Date,
            "ZC" => QuestionKind::Info,
            "State" => QuestionKind::Solution,
            other => {
                tracing::warn!(id, kind = other, "unknown question type");
                report.format_issue(format!("question {id}: unknown type \"{other}\""));
                return None;
            }
        };

        let mut qaset = QASet::question(id, text, kind);
        qaset.properties = parse_properties(node, report);
        Some((qaset, self.parse_children(node)))
    }

    fn parse_choices(&self, node: &Value, report: &mut LoadReport) -> Vec<Choice> {
        let mut choices = Vec::new();
        for choice_node in array_of(node.get("choices")) {
            let Some(id) = choice_node.get("id").and_then(Value::as_str) else {
                report.format_issue("choice without id");
                continue;
            };
            let text = choice_node
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let kind = match choice_node.get("kind").and_then(Value::as_str) {
                Some("yes") => ChoiceKind::Yes,
                Some("no") => ChoiceKind::No,
                Some(other) => {
                    tracing::warn!(id, kind = other, "unknown choice kind");
                    report.format_issue(format!("choice {id}: unknown kind \"{other}\""));
                    ChoiceKind::Regular
                }
                None => ChoiceKind::Regular,
            };
            choices.push(Choice::new(id, text).with_kind(kind));
        }
        choices
    }

    fn parse_partitions(
        &self,
        question_id: &str,
        node: &Value,
        report: &mut LoadReport,
    ) -> Vec<NumericalInterval> {
        let mut partitions = Vec::new();
        for raw in array_of(node.get("partitions")) {
            match serde_json::from_value::<NumericalInterval>(raw.clone())
                .map_err(|e| e.to_string())
                .and_then(|iv| {
                    NumericalInterval::new(iv.lo, iv.hi, iv.lo_open, iv.hi_open)
                        .map_err(|e| e.to_string())
                }) {
                Ok(interval) => partitions.push(interval),
                Err(e) => {
                    report.format_issue(format!("question {question_id}: bad partition: {e}"));
                }
            }
        }
        partitions
    }

    fn parse_diagnosis(
        &self,
        node: &Value,
        report: &mut LoadReport,
    ) -> Option<(Diagnosis, Vec<ChildRef>)> {
        let id = node.get("id").and_then(Value::as_str)?;
        let text = node.get("text").and_then(Value::as_str).unwrap_or_default();
        let mut diagnosis = Diagnosis::new(id, text);
        if let Some(raw) = node.get("apriori").and_then(Value::as_str) {
            match Score::parse(raw) {
                Some(score) => diagnosis.apriori = Some(score),
                None => {
                    report.format_issue(format!("diagnosis {id}: unparsable score \"{raw}\""))
                }
            }
        }
        diagnosis.properties = parse_properties(node, report);
        Some((diagnosis, self.parse_children(node)))
    }

    fn parse_children(&self, node: &Value) -> Vec<ChildRef> {
        array_of(node.get("children"))
            .iter()
            .filter_map(|child| {
                let id = child.get("id").and_then(Value::as_str)?;
                let linked = child.get("link").and_then(Value::as_bool).unwrap_or(false);
                Some(ChildRef {
                    id: id.to_string(),
                    linked,
                })
            })
            .collect()
    }

    fn detect_collisions(&self, kb: &KnowledgeBase, report: &mut LoadReport) {
        let resolver = Resolver::new(kb);
        let mut ids: Vec<&str> = kb
            .qasets()
            .map(|q| q.id.as_str())
            .chain(kb.diagnoses().map(|d| d.id.as_str()))
            .chain(kb.slices().map(|s| s.id()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        for id in ids {
            let namespaces = resolver.namespaces_of(id);
            if namespaces.len() > 1 {
                tracing::warn!(id, ?namespaces, "id resolves in more than one namespace");
                report
                    .namespace_collisions
                    .push(format!("{id}: {}", namespaces.join(", ")));
            }
        }
    }
}

fn array_of(node: Option<&Value>) -> &[Value] {
    node.and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

fn parse_properties(node: &Value, report: &mut LoadReport) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    if let Some(props) = node.get("properties").and_then(Value::as_object) {
        for (key, value) in props {
            match value.as_str() {
                Some(v) => {
                    properties.insert(key.clone(), v.to_string());
                }
                None => report.format_issue(format!("property {key} is not a string")),
            }
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(doc: serde_json::Value) -> (KnowledgeBase, LoadReport) {
        let extensions = Extensions::default();
        let loader = DocumentLoader::new(&extensions);
        let mut report = LoadReport::new();
        let kb = loader.load_document(&doc, &mut report).unwrap();
        (kb, report)
    }

    fn sample_doc() -> serde_json::Value {
        json!({
            "knowledge-base": {
                "id": "kb-sample",
                "properties": {"author": "unit test"},
                "costs": [{"id": "risk", "verbalization": "patient risk", "unit": "points"}],
                "qcontainers": [
                    {"id": "Q000", "text": "root", "children": [{"id": "QC1"}]},
                    {"id": "QC1", "text": "anamnesis", "children": [
                        {"id": "Q1"}, {"id": "Q2", "link": true}
                    ]}
                ],
                "questions": [
                    {"id": "Q1", "type": "OC", "text": "color", "choices": [
                        {"id": "A1", "text": "red"}, {"id": "A2", "text": "blue"}
                    ]},
                    {"id": "Q2", "type": "Num", "text": "temperature", "partitions": [
                        {"lo": 35.0, "hi": 37.5}, {"lo": 37.5, "hi": 42.0, "lo_open": true}
                    ], "children": [{"id": "Q1", "link": true}]}
                ],
                "diagnoses": [
                    {"id": "P000", "text": "solutions", "children": [{"id": "P1"}]},
                    {"id": "P1", "text": "flu", "apriori": "p3"}
                ],
                "init-questions": ["QC1"],
                "slices": [
                    {"id": "R1", "type": "rule",
                     "condition": {"type": "equal", "id": "Q1", "value": "A1"},
                     "action": {"type": "heuristic", "diagnosis": "P1", "score": "p4"}},
                    {"id": "S1", "type": "schema", "question": "Q2",
                     "thresholds": [37.5, 39.0]}
                ]
            }
        })
    }

    #[test]
    fn loads_a_complete_document() {
        let (kb, report) = load(sample_doc());
        assert_eq!(kb.id(), Some("kb-sample"));
        assert_eq!(kb.qasets().count(), 4);
        assert_eq!(kb.diagnoses().count(), 2);
        assert_eq!(kb.slices().count(), 2);
        assert_eq!(kb.init_questions(), ["QC1"]);
        assert_eq!(kb.costs().get("risk").unwrap().verbalization, "patient risk");
        assert!(report.is_clean(), "unexpected report: {report:?}");

        // Linked edge captured as linked parent.
        assert_eq!(kb.qaset_linked_parents("Q2"), ["QC1"]);
        assert!(kb.qaset_linked_parents("Q1").contains(&"Q2".to_string()));
    }

    #[test]
    fn unresolved_child_is_reported_not_fatal() {
        let doc = json!({
            "knowledge-base": {
                "qcontainers": [
                    {"id": "Q000", "text": "root", "children": [{"id": "missing"}]}
                ]
            }
        });
        let (kb, report) = load(doc);
        assert_eq!(kb.qasets().count(), 1);
        assert_eq!(report.unresolved_ids(), ["missing"]);
    }

    #[test]
    fn orphans_are_cleaned_after_wiring() {
        let doc = json!({
            "knowledge-base": {
                "qcontainers": [
                    {"id": "Q000", "text": "root", "children": [{"id": "Q1"}]}
                ],
                "questions": [
                    {"id": "Q1", "type": "Text", "text": "kept"},
                    {"id": "Q9", "type": "Text", "text": "stray"}
                ]
            }
        });
        let (kb, _) = load(doc);
        assert!(kb.qaset("Q1").is_some());
        assert!(kb.qaset("Q9").is_none());
    }

    #[test]
    fn resolver_priority_and_scan_fallback() {
        let (kb, _) = load(sample_doc());
        let resolver = Resolver::new(&kb);

        assert!(matches!(resolver.search("QC1"), Some(Resolved::Container(_))));
        assert!(matches!(resolver.search("Q1"), Some(Resolved::Question(_))));
        assert!(matches!(resolver.search("P1"), Some(Resolved::Diagnosis(_))));
        assert!(matches!(resolver.search("R1"), Some(Resolved::Slice(_))));

        // Choices are only reachable through the scan fallback.
        let (question, choice) = resolver.search_choice("A2").unwrap();
        assert_eq!(question.id, "Q1");
        assert_eq!(choice.text, "blue");
        assert!(matches!(resolver.search("A2"), Some(Resolved::Choice { .. })));
        assert!(resolver.search("nowhere").is_none());
    }

    #[test]
    fn namespace_collisions_are_reported() {
        let doc = json!({
            "knowledge-base": {
                "questions": [{"id": "Q000", "type": "Text", "text": "root-question"}],
                "diagnoses": [{"id": "Q000", "text": "colliding diagnosis"}]
            }
        });
        let (_, report) = load(doc);
        assert_eq!(report.namespace_collisions.len(), 1);
        assert!(report.namespace_collisions[0].starts_with("Q000"));
    }

    #[test]
    fn bad_score_is_a_format_issue() {
        let doc = json!({
            "knowledge-base": {
                "diagnoses": [{"id": "P1", "text": "flu", "apriori": "pp"}]
            }
        });
        let (kb, report) = load(doc);
        assert_eq!(kb.diagnosis("P1").unwrap().apriori, None);
        assert_eq!(report.format_issues.len(), 1);
    }
}
