//! The knowledge-base domain model.
//!
//! [`KnowledgeBase`] is the root aggregate owning every other entity:
//! QASet trees, the diagnosis DAG, the global slice table, the cost
//! catalog, and any loaded case repositories. Entities are stored in
//! id-keyed arenas; cross-references between them are plain id strings
//! resolved against those arenas.

pub mod action;
pub mod condition;
pub mod diagnosis;
pub mod formula;
pub mod hierarchy;
pub mod qaset;
pub mod slice;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::knowledge::diagnosis::Diagnosis;
use crate::knowledge::hierarchy::{Hierarchy, LinkKind};
use crate::knowledge::qaset::{Choice, QASet};
use crate::knowledge::slice::{KnowledgeSlice, SliceKind};

/// A declared cost dimension (risk, duration, …) with display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDeclaration {
    /// Human-readable description of the cost dimension.
    pub verbalization: String,
    /// Optional unit (minutes, euros, …).
    pub unit: Option<String>,
}

/// A loaded case repository: plain data records, opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRepository {
    /// The repository's records as raw documents.
    pub records: Vec<serde_json::Value>,
}

impl CaseRepository {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the repository holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The root aggregate of the domain model.
#[derive(Debug)]
pub struct KnowledgeBase {
    id: Option<String>,
    properties: BTreeMap<String, String>,
    costs: BTreeMap<String, CostDeclaration>,
    init_questions: Vec<String>,
    root_qaset_id: String,
    qasets: BTreeMap<String, QASet>,
    qaset_hierarchy: Hierarchy,
    diagnoses: BTreeMap<String, Diagnosis>,
    diagnosis_hierarchy: Hierarchy,
    slices: BTreeMap<String, KnowledgeSlice>,
    case_repositories: BTreeMap<String, CaseRepository>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base with the given designated QASet root
    /// id. The root is the only QASet allowed to have no parent.
    pub fn new(root_qaset_id: impl Into<String>) -> Self {
        Self {
            id: None,
            properties: BTreeMap::new(),
            costs: BTreeMap::new(),
            init_questions: Vec::new(),
            root_qaset_id: root_qaset_id.into(),
            qasets: BTreeMap::new(),
            qaset_hierarchy: Hierarchy::new(),
            diagnoses: BTreeMap::new(),
            diagnosis_hierarchy: Hierarchy::new(),
            slices: BTreeMap::new(),
            case_repositories: BTreeMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Root attributes
    // -----------------------------------------------------------------------

    /// The knowledge base id, if one was declared.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Set the knowledge base id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// The designated QASet root id.
    pub fn root_qaset_id(&self) -> &str {
        &self.root_qaset_id
    }

    /// The free-form property bag.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Set a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// The cost catalog.
    pub fn costs(&self) -> &BTreeMap<String, CostDeclaration> {
        &self.costs
    }

    /// Declare a cost dimension.
    pub fn declare_cost(&mut self, id: impl Into<String>, decl: CostDeclaration) {
        self.costs.insert(id.into(), decl);
    }

    /// The initial question order.
    pub fn init_questions(&self) -> &[String] {
        &self.init_questions
    }

    /// Replace the initial question order.
    pub fn set_init_questions(&mut self, ids: Vec<String>) {
        self.init_questions = ids;
    }

    // -----------------------------------------------------------------------
    // QASets
    // -----------------------------------------------------------------------

    /// Insert a QASet. Errors on duplicate id.
    pub fn insert_qaset(&mut self, qaset: QASet) -> Result<(), DomainError> {
        if self.qasets.contains_key(&qaset.id) {
            return Err(DomainError::DuplicateId {
                namespace: "qaset",
                id: qaset.id,
            });
        }
        self.qaset_hierarchy.ensure_node(&qaset.id);
        self.qasets.insert(qaset.id.clone(), qaset);
        Ok(())
    }

    /// Look up a QASet by id.
    pub fn qaset(&self, id: &str) -> Option<&QASet> {
        self.qasets.get(id)
    }

    /// Iterate over all QASets.
    pub fn qasets(&self) -> impl Iterator<Item = &QASet> {
        self.qasets.values()
    }

    /// Wire a parent → child QASet edge.
    pub fn add_qaset_edge(&mut self, parent: &str, child: &str, kind: LinkKind) {
        self.qaset_hierarchy.add_edge(parent, child, kind);
    }

    /// Parents of a QASet, owning and linked alike.
    pub fn qaset_parents(&self, id: &str) -> Vec<String> {
        self.qaset_hierarchy.parents(id)
    }

    /// Children of a QASet.
    pub fn qaset_children(&self, id: &str) -> Vec<String> {
        self.qaset_hierarchy.children(id)
    }

    /// Linked (non-owning) parents of a QASet.
    pub fn qaset_linked_parents(&self, id: &str) -> Vec<String> {
        self.qaset_hierarchy.linked_parents(id)
    }

    /// Search every choice question for a choice with the given id.
    pub fn find_choice(&self, choice_id: &str) -> Option<(&QASet, &Choice)> {
        self.qasets.values().find_map(|q| {
            q.find_choice(choice_id).map(|c| (q, c))
        })
    }

    /// Remove parentless QASets (except the designated root) until none
    /// remain, returning the removed ids.
    ///
    /// Terminates in at most N passes for N nodes: removing a node can only
    /// orphan its own children, so the parentless set shrinks to empty.
    pub fn cleanup_orphan_qasets(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        loop {
            let orphans: Vec<String> = self
                .qaset_hierarchy
                .parentless(&self.root_qaset_id)
                .into_iter()
                .filter(|id| self.qasets.contains_key(id))
                .collect();
            if orphans.is_empty() {
                return removed;
            }
            for id in orphans {
                tracing::debug!(id = %id, "removing orphaned qaset");
                self.qasets.remove(&id);
                self.qaset_hierarchy.remove(&id);
                removed.push(id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Diagnoses
    // -----------------------------------------------------------------------

    /// Insert a diagnosis. Errors on duplicate id.
    pub fn insert_diagnosis(&mut self, diagnosis: Diagnosis) -> Result<(), DomainError> {
        if self.diagnoses.contains_key(&diagnosis.id) {
            return Err(DomainError::DuplicateId {
                namespace: "diagnosis",
                id: diagnosis.id,
            });
        }
        self.diagnosis_hierarchy.ensure_node(&diagnosis.id);
        self.diagnoses.insert(diagnosis.id.clone(), diagnosis);
        Ok(())
    }

    /// Look up a diagnosis by id.
    pub fn diagnosis(&self, id: &str) -> Option<&Diagnosis> {
        self.diagnoses.get(id)
    }

    /// Iterate over all diagnoses.
    pub fn diagnoses(&self) -> impl Iterator<Item = &Diagnosis> {
        self.diagnoses.values()
    }

    /// Wire a parent → child diagnosis edge.
    pub fn add_diagnosis_edge(&mut self, parent: &str, child: &str, kind: LinkKind) {
        self.diagnosis_hierarchy.add_edge(parent, child, kind);
    }

    /// Parents of a diagnosis.
    pub fn diagnosis_parents(&self, id: &str) -> Vec<String> {
        self.diagnosis_hierarchy.parents(id)
    }

    /// Children of a diagnosis.
    pub fn diagnosis_children(&self, id: &str) -> Vec<String> {
        self.diagnosis_hierarchy.children(id)
    }

    /// Linked (non-owning) parents of a diagnosis.
    pub fn diagnosis_linked_parents(&self, id: &str) -> Vec<String> {
        self.diagnosis_hierarchy.linked_parents(id)
    }

    // -----------------------------------------------------------------------
    // Slices
    // -----------------------------------------------------------------------

    /// Insert a slice into the global slice table. Errors on duplicate id.
    pub fn insert_slice(&mut self, slice: KnowledgeSlice) -> Result<(), DomainError> {
        let id = slice.id().to_string();
        if self.slices.contains_key(&id) {
            return Err(DomainError::DuplicateId {
                namespace: "slice",
                id,
            });
        }
        self.slices.insert(id, slice);
        Ok(())
    }

    /// Look up a slice by id.
    pub fn slice(&self, id: &str) -> Option<&KnowledgeSlice> {
        self.slices.get(id)
    }

    /// Iterate over all slices.
    pub fn slices(&self) -> impl Iterator<Item = &KnowledgeSlice> {
        self.slices.values()
    }

    /// Remove the slice with the given id if it is of a removable kind.
    ///
    /// Only rule slices have a defined removal path; for any other kind the
    /// table is left untouched and `false` is returned.
    pub fn remove_removable_slice(&mut self, id: &str) -> bool {
        match self.slices.get(id) {
            Some(slice) if slice.is_removable() => {
                self.slices.remove(id);
                true
            }
            Some(slice) => {
                tracing::warn!(
                    id,
                    kind = %slice.kind(),
                    "slice kind has no removal path, leaving it in place"
                );
                false
            }
            None => false,
        }
    }

    /// Whether a slice of the given kind exists under this id.
    pub fn has_slice_of_kind(&self, id: &str, kind: SliceKind) -> bool {
        self.slices.get(id).is_some_and(|s| s.kind() == kind)
    }

    // -----------------------------------------------------------------------
    // Case repositories
    // -----------------------------------------------------------------------

    /// Attach a loaded case repository under the given loader id.
    pub fn add_case_repository(&mut self, id: impl Into<String>, repo: CaseRepository) {
        self.case_repositories.insert(id.into(), repo);
    }

    /// The case repository registered under the given loader id.
    pub fn case_repository(&self, id: &str) -> Option<&CaseRepository> {
        self.case_repositories.get(id)
    }

    /// Iterate over (loader id, repository) pairs.
    pub fn case_repositories(&self) -> impl Iterator<Item = (&str, &CaseRepository)> {
        self.case_repositories.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::qaset::QuestionKind;

    fn question(id: &str) -> QASet {
        QASet::question(id, format!("text {id}"), QuestionKind::Text)
    }

    #[test]
    fn duplicate_ids_are_rejected_per_namespace() {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(question("Q1")).unwrap();
        let err = kb.insert_qaset(question("Q1")).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateId { namespace: "qaset", .. }));

        // The same id is fine in another namespace.
        kb.insert_diagnosis(Diagnosis::new("Q1", "odd but legal")).unwrap();
    }

    #[test]
    fn orphan_cleanup_reaches_fixpoint() {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::container("Q000", "root")).unwrap();
        // Chain hanging off a stray node: removing "stray" orphans "child",
        // which orphans "grandchild" — three passes needed.
        for id in ["stray", "child", "grandchild", "kept"] {
            kb.insert_qaset(question(id)).unwrap();
        }
        kb.add_qaset_edge("stray", "child", LinkKind::Owned);
        kb.add_qaset_edge("child", "grandchild", LinkKind::Owned);
        kb.add_qaset_edge("Q000", "kept", LinkKind::Owned);

        let mut removed = kb.cleanup_orphan_qasets();
        removed.sort();
        assert_eq!(removed, ["child", "grandchild", "stray"]);
        assert!(kb.qaset("kept").is_some());
        assert!(kb.qaset("Q000").is_some());

        // Fixpoint: exactly one parentless node remains, the root.
        assert!(kb.cleanup_orphan_qasets().is_empty());
        let parentless: Vec<_> = kb
            .qasets()
            .filter(|q| kb.qaset_parents(&q.id).is_empty())
            .collect();
        assert_eq!(parentless.len(), 1);
        assert_eq!(parentless[0].id, "Q000");
    }

    #[test]
    fn linked_parents_do_not_count_as_orphaned() {
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::container("Q000", "root")).unwrap();
        kb.insert_qaset(question("shared")).unwrap();
        kb.add_qaset_edge("Q000", "shared", LinkKind::Linked);

        assert!(kb.cleanup_orphan_qasets().is_empty());
        assert_eq!(kb.qaset_linked_parents("shared"), ["Q000"]);
    }

    #[test]
    fn choice_scan_finds_owner() {
        use crate::knowledge::qaset::Choice;
        let mut kb = KnowledgeBase::new("Q000");
        kb.insert_qaset(QASet::question(
            "Q1",
            "color",
            QuestionKind::OneChoice {
                choices: vec![Choice::new("A_red", "red"), Choice::new("A_blue", "blue")],
            },
        ))
        .unwrap();

        let (owner, choice) = kb.find_choice("A_blue").unwrap();
        assert_eq!(owner.id, "Q1");
        assert_eq!(choice.text, "blue");
        assert!(kb.find_choice("A_green").is_none());
    }
}
