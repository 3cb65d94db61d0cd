//! Incremental knowledge-base patches.
//!
//! A patch replaces a named subset of knowledge slices without reloading
//! the whole graph. Its document root is distinct from the primary
//! document's but carries the same slice-list shape, so ordinary slice
//! construction is reused against the restricted root. Replacement is
//! remove-then-insert keyed by id, which makes applying the same patch
//! twice idempotent. Only rule slices have a removal path; re-declaring a
//! slice of any other kind leaves the existing one untouched.

use std::path::Path;

use serde_json::Value;

use crate::error::PersistError;
use crate::knowledge::KnowledgeBase;
use crate::persist::factory::Extensions;
use crate::persist::loader::DocumentLoader;
use crate::persist::report::LoadReport;

/// Root key of the patch document, distinct from the primary document's.
pub const PATCH_ROOT_KEY: &str = "knowledge-base-patch";

/// Default location of the patch document inside the container.
pub const PATCH_STORAGE_LOCATION: &str = "kb/patch.json";

/// Read and apply a patch document from disk.
pub fn apply_from_path(
    kb: &mut KnowledgeBase,
    path: &Path,
    extensions: &Extensions,
    report: &mut LoadReport,
) -> Result<usize, PersistError> {
    let raw = std::fs::read_to_string(path).map_err(|e| PersistError::Document {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|e| PersistError::Document {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;
    apply(kb, &doc, extensions, report)
}

/// Apply a parsed patch document, returning the number of slices inserted.
pub fn apply(
    kb: &mut KnowledgeBase,
    doc: &Value,
    extensions: &Extensions,
    report: &mut LoadReport,
) -> Result<usize, PersistError> {
    let root = doc
        .get(PATCH_ROOT_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| PersistError::Document {
            location: PATCH_ROOT_KEY.into(),
            message: format!("patch document has no \"{PATCH_ROOT_KEY}\" object"),
        })?;
    let nodes = root
        .get("slices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    // Remove-then-insert, keyed by id. Declared ids held by a non-removable
    // slice kind are skipped entirely: no removal path, no replacement.
    let mut accepted = Vec::new();
    for node in nodes {
        let Some(id) = node.get("id").and_then(Value::as_str) else {
            report.format_issue("patch slice without id");
            continue;
        };
        match kb.slice(id) {
            Some(existing) if !existing.is_removable() => {
                tracing::warn!(
                    id,
                    kind = %existing.kind(),
                    "patch re-declares a slice kind without a removal path, skipping"
                );
                report.format_issue(format!(
                    "patch slice {id}: existing {} slice is not replaceable",
                    existing.kind()
                ));
                continue;
            }
            Some(_) => {
                kb.remove_removable_slice(id);
                accepted.push(node.clone());
            }
            None => accepted.push(node.clone()),
        }
    }

    let loader = DocumentLoader::new(extensions);
    Ok(loader.load_slices(kb, &accepted, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::diagnosis::Diagnosis;
    use crate::knowledge::qaset::{QASet, QuestionKind};
    use crate::knowledge::slice::{KnowledgeSlice, ValueSchema};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn base_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::container("Q000", "root")).unwrap();
        kb.insert_qaset(QASet::question(
            "Qn",
            "temperature",
            QuestionKind::Numeric { partitions: vec![] },
        ))
        .unwrap();
        kb.insert_diagnosis(Diagnosis::new("P1", "flu")).unwrap();
        kb
    }

    fn rule_patch(score: &str) -> Value {
        json!({
            "knowledge-base-patch": {
                "slices": [
                    {"id": "R1", "type": "rule",
                     "condition": {"type": "numGreater", "id": "Qn", "value": 38.0},
                     "action": {"type": "heuristic", "diagnosis": "P1", "score": score}}
                ]
            }
        })
    }

    fn slice_ids(kb: &KnowledgeBase) -> BTreeSet<String> {
        kb.slices().map(|s| s.id().to_string()).collect()
    }

    #[test]
    fn patch_replaces_rule_by_id() {
        let mut kb = base_kb();
        let extensions = Extensions::default();
        let mut report = LoadReport::new();

        apply(&mut kb, &rule_patch("p2"), &extensions, &mut report).unwrap();
        apply(&mut kb, &rule_patch("p7"), &extensions, &mut report).unwrap();

        assert_eq!(kb.slices().count(), 1);
        let KnowledgeSlice::Rule(rule) = kb.slice("R1").unwrap() else {
            panic!("expected rule");
        };
        let crate::knowledge::action::RuleAction::Heuristic { score, .. } = &rule.action else {
            panic!("expected heuristic");
        };
        assert_eq!(score.as_str(), "p7");
    }

    #[test]
    fn applying_the_same_patch_twice_is_idempotent() {
        let mut kb = base_kb();
        let extensions = Extensions::default();
        let mut report = LoadReport::new();

        apply(&mut kb, &rule_patch("p4"), &extensions, &mut report).unwrap();
        let after_once = slice_ids(&kb);
        apply(&mut kb, &rule_patch("p4"), &extensions, &mut report).unwrap();
        assert_eq!(slice_ids(&kb), after_once);
    }

    #[test]
    fn non_removable_kinds_are_left_untouched() {
        let mut kb = base_kb();
        kb.insert_slice(KnowledgeSlice::Schema(ValueSchema {
            id: "S1".into(),
            question: "Qn".into(),
            thresholds: vec![37.5],
        }))
        .unwrap();

        let patch = json!({
            "knowledge-base-patch": {
                "slices": [
                    {"id": "S1", "type": "schema", "question": "Qn",
                     "thresholds": [40.0]}
                ]
            }
        });
        let extensions = Extensions::default();
        let mut report = LoadReport::new();
        let inserted = apply(&mut kb, &patch, &extensions, &mut report).unwrap();

        assert_eq!(inserted, 0);
        let KnowledgeSlice::Schema(schema) = kb.slice("S1").unwrap() else {
            panic!("expected schema");
        };
        assert_eq!(schema.thresholds, [37.5]);
        assert!(!report.format_issues.is_empty());
    }

    #[test]
    fn wrong_root_key_is_rejected() {
        let mut kb = base_kb();
        let extensions = Extensions::default();
        let mut report = LoadReport::new();
        let err = apply(
            &mut kb,
            &json!({"knowledge-base": {"slices": []}}),
            &extensions,
            &mut report,
        )
        .unwrap_err();
        assert!(matches!(err, PersistError::Document { .. }));
    }
}
