//! The primary-document handler.
//!
//! Loads and saves the knowledge base's own document: root attributes,
//! costs, the QASet tree, diagnoses, init-question order, and the
//! knowledge-slice list. The persistence manager consumes this as an
//! opaque load/save contract; incremental patches are probed for and
//! applied here when requested.

use std::path::Path;

use serde_json::{Value, json};

use crate::error::PersistError;
use crate::knowledge::KnowledgeBase;
use crate::knowledge::qaset::{ChoiceKind, QASetPayload, QuestionKind};
use crate::knowledge::slice::KnowledgeSlice;
use crate::persist::factory::{Extensions, action_to_node, condition_to_node};
use crate::persist::loader::{DocumentLoader, PRIMARY_ROOT_KEY};
use crate::persist::patch;
use crate::persist::progress::SlotProgress;
use crate::persist::report::LoadReport;

/// The primary handler's id in the container index.
pub const BASIC_HANDLER_ID: &str = "basic";

/// Default location of the primary document inside the container.
pub const BASIC_STORAGE_LOCATION: &str = "kb/basic.json";

/// Loads and saves the primary knowledge-base document.
#[derive(Debug, Default)]
pub struct BasicHandler;

impl BasicHandler {
    /// Create the handler.
    pub fn new() -> Self {
        Self
    }

    /// The handler id.
    pub fn id(&self) -> &str {
        BASIC_HANDLER_ID
    }

    /// Where the primary document lives inside the container.
    pub fn default_storage_location(&self) -> String {
        BASIC_STORAGE_LOCATION.to_string()
    }

    /// Load the primary document at `location` under the extracted
    /// container `base`. When `apply_patch` is set and the container ships
    /// a patch document, the patch is applied before returning; a missing
    /// patch is not an error.
    pub fn load(
        &self,
        base: &Path,
        location: &Path,
        apply_patch: bool,
        extensions: &Extensions,
        progress: &mut SlotProgress<'_>,
    ) -> Result<(KnowledgeBase, LoadReport), PersistError> {
        let path = base.join(location);
        progress.update(0.0, "reading primary document");
        let raw = std::fs::read_to_string(&path).map_err(|e| PersistError::Document {
            location: location.display().to_string(),
            message: e.to_string(),
        })?;
        let doc: Value = serde_json::from_str(&raw).map_err(|e| PersistError::Document {
            location: location.display().to_string(),
            message: e.to_string(),
        })?;
        progress.update(0.2, "parsing primary document");

        let mut report = LoadReport::new();
        let loader = DocumentLoader::new(extensions);
        let mut kb = loader.load_document(&doc, &mut report)?;
        progress.update(0.8, "primary document loaded");

        if apply_patch {
            let patch_path = base.join(patch::PATCH_STORAGE_LOCATION);
            if patch_path.exists() {
                let replaced =
                    patch::apply_from_path(&mut kb, &patch_path, extensions, &mut report)?;
                tracing::info!(replaced, "applied knowledge-base patch");
            }
        }
        progress.update(1.0, "primary document done");

        Ok((kb, report))
    }

    /// Serialize the knowledge base into its primary document.
    pub fn save(&self, kb: &KnowledgeBase) -> Value {
        let qcontainers: Vec<Value> = kb
            .qasets()
            .filter(|q| q.is_container())
            .map(|q| self.qaset_node(kb, q))
            .collect();
        let questions: Vec<Value> = kb
            .qasets()
            .filter(|q| q.is_question())
            .map(|q| self.qaset_node(kb, q))
            .collect();
        let diagnoses: Vec<Value> = kb
            .diagnoses()
            .map(|d| {
                let mut node = json!({
                    "id": d.id,
                    "text": d.text,
                    "children": children_nodes(
                        kb.diagnosis_children(&d.id),
                        |child| kb.diagnosis_linked_parents(child).contains(&d.id),
                    ),
                });
                if let Some(score) = d.apriori {
                    node["apriori"] = json!(score.as_str());
                }
                if !d.properties.is_empty() {
                    node["properties"] = json!(d.properties);
                }
                node
            })
            .collect();
        let costs: Vec<Value> = kb
            .costs()
            .iter()
            .map(|(id, decl)| {
                json!({
                    "id": id,
                    "verbalization": decl.verbalization,
                    "unit": decl.unit,
                })
            })
            .collect();
        let slices: Vec<Value> = kb.slices().map(slice_node).collect();

        let mut root = json!({
            "root": kb.root_qaset_id(),
            "properties": kb.properties(),
            "costs": costs,
            "qcontainers": qcontainers,
            "questions": questions,
            "diagnoses": diagnoses,
            "init-questions": kb.init_questions(),
            "slices": slices,
        });
        if let Some(id) = kb.id() {
            root["id"] = json!(id);
        }
        json!({ PRIMARY_ROOT_KEY: root })
    }

    fn qaset_node(&self, kb: &KnowledgeBase, qaset: &crate::knowledge::qaset::QASet) -> Value {
        let mut node = json!({
            "id": qaset.id,
            "text": qaset.text,
            "children": children_nodes(
                kb.qaset_children(&qaset.id),
                |child| kb.qaset_linked_parents(child).contains(&qaset.id),
            ),
        });
        if !qaset.properties.is_empty() {
            node["properties"] = json!(qaset.properties);
        }
        match &qaset.payload {
            QASetPayload::Container { priority } => {
                if let Some(priority) = priority {
                    node["priority"] = json!(priority);
                }
            }
            QASetPayload::Question(kind) => {
                node["type"] = json!(kind.tag());
                match kind {
                    QuestionKind::OneChoice { choices }
                    | QuestionKind::MultipleChoice { choices }
                    | QuestionKind::YesNo { choices } => {
                        node["choices"] = Value::Array(
                            choices
                                .iter()
                                .map(|c| {
                                    let mut choice = json!({"id": c.id, "text": c.text});
                                    match c.kind {
                                        ChoiceKind::Yes => choice["kind"] = json!("yes"),
                                        ChoiceKind::No => choice["kind"] = json!("no"),
                                        ChoiceKind::Regular => {}
                                    }
                                    choice
                                })
                                .collect(),
                        );
                    }
                    QuestionKind::Numeric { partitions } => {
                        if !partitions.is_empty() {
                            node["partitions"] = serde_json::to_value(partitions)
                                .expect("intervals serialize");
                        }
                    }
                    _ => {}
                }
            }
        }
        node
    }
}

fn children_nodes(children: Vec<String>, is_linked: impl Fn(&str) -> bool) -> Vec<Value> {
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        let mut node = json!({"id": child});
        if is_linked(&child) {
            node["link"] = json!(true);
        }
        nodes.push(node);
    }
    nodes
}

fn slice_node(slice: &KnowledgeSlice) -> Value {
    match slice {
        KnowledgeSlice::Rule(rule) => {
            let mut node = json!({
                "id": rule.id,
                "type": "rule",
                "action": action_to_node(&rule.action),
            });
            if let Some(condition) = &rule.condition {
                node["condition"] = condition_to_node(condition);
            }
            if let Some(exception) = &rule.exception {
                node["exception"] = condition_to_node(exception);
            }
            if let Some(context) = &rule.context {
                node["context"] = condition_to_node(context);
            }
            if !rule.active {
                node["active"] = json!(false);
            }
            if let Some(comment) = &rule.comment {
                node["comment"] = json!(comment);
            }
            node
        }
        KnowledgeSlice::Schema(schema) => json!({
            "id": schema.id,
            "type": "schema",
            "question": schema.question,
            "thresholds": schema.thresholds,
        }),
        KnowledgeSlice::Similarity(model) => json!({
            "id": model.id,
            "type": "similarity",
            "weights": model.weights,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::progress::{NoProgress, OperationKind, ProgressAggregator};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn write_doc(dir: &Path, rel: &str, doc: &Value) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
    }

    fn load_from(dir: &Path, apply_patch: bool) -> (KnowledgeBase, LoadReport) {
        let handler = BasicHandler::new();
        let extensions = Extensions::default();
        let mut sink = NoProgress;
        let mut agg = ProgressAggregator::new(&mut sink, OperationKind::Load, 1);
        let mut slot = agg.slot(1);
        handler
            .load(
                dir,
                Path::new(BASIC_STORAGE_LOCATION),
                apply_patch,
                &extensions,
                &mut slot,
            )
            .unwrap()
    }

    fn sample_doc() -> Value {
        json!({
            "knowledge-base": {
                "id": "kb-roundtrip",
                "qcontainers": [
                    {"id": "Q000", "text": "root", "children": [{"id": "Q1"}, {"id": "Qn"}]}
                ],
                "questions": [
                    {"id": "Q1", "type": "YN", "text": "fever", "choices": [
                        {"id": "A_yes", "text": "yes", "kind": "yes"},
                        {"id": "A_no", "text": "no", "kind": "no"}
                    ]},
                    {"id": "Qn", "type": "Num", "text": "temperature"}
                ],
                "diagnoses": [{"id": "P1", "text": "flu", "apriori": "p1"}],
                "init-questions": ["Q1"],
                "slices": [
                    {"id": "R1", "type": "rule",
                     "condition": {"type": "choiceYes", "id": "Q1"},
                     "action": {"type": "heuristic", "diagnosis": "P1", "score": "p4"}}
                ]
            }
        })
    }

    #[test]
    fn save_load_round_trip_preserves_id_sets() {
        let dir = tempfile::TempDir::new().unwrap();
        write_doc(dir.path(), BASIC_STORAGE_LOCATION, &sample_doc());
        let (kb, report) = load_from(dir.path(), false);
        assert!(report.is_clean(), "{report:?}");

        // Save and reload into a second base.
        let saved = BasicHandler::new().save(&kb);
        let dir2 = tempfile::TempDir::new().unwrap();
        write_doc(dir2.path(), BASIC_STORAGE_LOCATION, &saved);
        let (kb2, report2) = load_from(dir2.path(), false);
        assert!(report2.is_clean(), "{report2:?}");

        let ids = |kb: &KnowledgeBase| -> BTreeSet<String> {
            kb.qasets()
                .map(|q| q.id.clone())
                .chain(kb.diagnoses().map(|d| d.id.clone()))
                .chain(kb.slices().map(|s| s.id().to_string()))
                .collect()
        };
        assert_eq!(ids(&kb), ids(&kb2));
        assert_eq!(kb2.init_questions(), ["Q1"]);
        assert_eq!(kb2.id(), Some("kb-roundtrip"));
    }

    #[test]
    fn missing_patch_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        write_doc(dir.path(), BASIC_STORAGE_LOCATION, &sample_doc());
        let (kb, _) = load_from(dir.path(), true);
        assert_eq!(kb.slices().count(), 1);
    }

    #[test]
    fn patch_is_applied_when_present() {
        let dir = tempfile::TempDir::new().unwrap();
        write_doc(dir.path(), BASIC_STORAGE_LOCATION, &sample_doc());
        write_doc(
            dir.path(),
            patch::PATCH_STORAGE_LOCATION,
            &json!({
                "knowledge-base-patch": {
                    "slices": [
                        {"id": "R1", "type": "rule",
                         "condition": {"type": "choiceNo", "id": "Q1"},
                         "action": {"type": "heuristic", "diagnosis": "P1", "score": "n4"}}
                    ]
                }
            }),
        );

        let (kb, _) = load_from(dir.path(), true);
        assert_eq!(kb.slices().count(), 1);
        let KnowledgeSlice::Rule(rule) = kb.slice("R1").unwrap() else {
            panic!("expected rule");
        };
        assert!(matches!(
            rule.condition,
            Some(crate::knowledge::condition::Condition::ChoiceNo { .. })
        ));
    }
}
