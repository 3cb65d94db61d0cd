//! Persistence: multi-document container save/load orchestration.
//!
//! [`PersistenceManager`] drives the full pipeline: extract the container
//! into a scoped temporary directory, read the container index, then load
//! the primary document, each auxiliary document, and each case repository
//! — strictly in that order, because later stages resolve references into
//! earlier stages' tables. Progress across all sub-handlers is normalized
//! into one 0..1 stream. Loading and saving are single-threaded and
//! strictly sequential; nothing runs concurrently with an in-flight load.

pub mod archive;
pub mod basic;
pub mod factory;
pub mod handler;
pub mod index;
pub mod loader;
pub mod patch;
pub mod progress;
pub mod report;

use std::path::{Path, PathBuf};

use crate::error::PersistError;
use crate::knowledge::KnowledgeBase;

pub use archive::{ArchiveWriter, ScopedExtraction};
pub use basic::{BASIC_STORAGE_LOCATION, BasicHandler};
pub use factory::{ActionHandler, ConditionHandler, Extensions, Factory};
pub use handler::{AuxiliaryHandler, CaseRepositoryHandler, Document, HandlerRegistry};
pub use index::{CRS_INDEX_LOCATION, ContainerIndex, KB_INDEX_LOCATION};
pub use loader::{DocumentLoader, Resolved, Resolver};
pub use progress::{
    NoProgress, OperationKind, ProgressEvent, ProgressSink, ProgressStage, ProgressWeight,
};
pub use report::{LoadReport, UnresolvedReference};

/// The result of a successful load: the graph plus everything non-fatal
/// that went wrong while assembling it.
#[derive(Debug)]
pub struct LoadOutcome {
    pub knowledge_base: KnowledgeBase,
    pub report: LoadReport,
}

/// Orchestrates container save/load across the primary handler and all
/// registered side-channel handlers.
pub struct PersistenceManager {
    registry: HandlerRegistry,
    extensions: Extensions,
    basic: BasicHandler,
}

impl PersistenceManager {
    /// Create a manager over an explicit, caller-built handler registry.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            extensions: Extensions::default(),
            basic: BasicHandler::new(),
        }
    }

    /// Attach condition/action extension chains for open vocabularies.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Load a container, applying any shipped patch, without progress.
    pub fn load(&self, source: &Path) -> Result<LoadOutcome, PersistError> {
        self.load_with(source, true, &mut NoProgress)
    }

    /// Load a container.
    ///
    /// The archive is extracted into a temporary directory owned by this
    /// call and released on every exit path. Pipeline order is fixed:
    /// primary document, auxiliaries in index order, case repositories in
    /// index order. A missing or unusable primary index is the only fatal
    /// condition; everything else degrades into the [`LoadReport`].
    pub fn load_with(
        &self,
        source: &Path,
        apply_patch: bool,
        sink: &mut dyn ProgressSink,
    ) -> Result<LoadOutcome, PersistError> {
        let extraction = ScopedExtraction::extract(source)?;
        let root = extraction.root();
        let mut report = LoadReport::new();
        let index = ContainerIndex::read(root, &mut report)?;

        tracing::info!(source = %source.display(), "loading knowledge base");

        // One cost slot per handler, weighted by content length where it
        // can be probed; a probe failure contributes zero.
        let primary_weight = content_length(&root.join(&index.primary));

        let mut aux_plan: Vec<(&dyn AuxiliaryHandler, PathBuf, u64)> = Vec::new();
        for (loader_id, location) in &index.auxiliaries {
            match self.registry.auxiliary(loader_id) {
                Some(handler) => {
                    let path = root.join(location);
                    let weight = content_length(&path);
                    aux_plan.push((handler, path, weight));
                }
                None => {
                    tracing::warn!(loader_id = %loader_id, "no auxiliary handler registered, skipping");
                }
            }
        }

        let mut case_plan: Vec<(String, &dyn CaseRepositoryHandler, PathBuf, u64)> = Vec::new();
        for (loader_id, location) in &index.case_repositories {
            match self.registry.case_repository(loader_id) {
                Some((canonical, handler)) => {
                    let path = root.join(location);
                    let weight = content_length(&path);
                    case_plan.push((canonical.to_string(), handler, path, weight));
                }
                None => {
                    tracing::warn!(loader_id = %loader_id, "no case-repository handler registered, skipping");
                }
            }
        }

        let total = primary_weight
            + aux_plan.iter().map(|(_, _, w)| w).sum::<u64>()
            + case_plan.iter().map(|(_, _, _, w)| w).sum::<u64>();
        let mut agg = progress::ProgressAggregator::new(sink, OperationKind::Load, total);
        agg.start("loading knowledge base");

        let (mut kb, primary_report) = {
            let mut slot = agg.slot(primary_weight);
            self.basic.load(
                root,
                &index.primary,
                apply_patch,
                &self.extensions,
                &mut slot,
            )?
        };
        agg.complete_slot(primary_weight, "primary document");
        report.merge(primary_report);

        for (handler, path, weight) in aux_plan {
            {
                let mut slot = agg.slot(weight);
                if let Err(e) = handler.load(&mut kb, &path, &mut slot) {
                    tracing::warn!(handler = handler.id(), error = %e, "auxiliary load failed");
                    report.format_issue(format!("auxiliary {}: {e}", handler.id()));
                }
            }
            agg.complete_slot(weight, &format!("auxiliary {}", handler.id()));
        }

        for (canonical, handler, path, weight) in case_plan {
            {
                let mut slot = agg.slot(weight);
                match handler.load(&kb, &path, &mut slot) {
                    Ok(repo) => kb.add_case_repository(&canonical, repo),
                    Err(e) => {
                        tracing::warn!(handler = %canonical, error = %e, "case repository load failed");
                        report.format_issue(format!("case repository {canonical}: {e}"));
                    }
                }
            }
            agg.complete_slot(weight, &format!("case repository {canonical}"));
        }

        agg.done("knowledge base loaded");
        Ok(LoadOutcome {
            knowledge_base: kb,
            report,
        })
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Save the knowledge base as a container, without progress.
    pub fn save(&self, kb: &KnowledgeBase, target: &Path) -> Result<(), PersistError> {
        self.save_with(kb, target, &mut NoProgress)
    }

    /// Save the knowledge base as a container at `target`.
    ///
    /// Writes the index manifests plus one storage entry per handler. The
    /// archive writer is closed on every exit path; a failure partway
    /// through leaves whatever was already written in place — save is
    /// documented best-effort, not all-or-nothing.
    pub fn save_with(
        &self,
        kb: &KnowledgeBase,
        target: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<(), PersistError> {
        let basic_weight =
            (kb.qasets().count() + kb.diagnoses().count() + kb.slices().count()).max(1) as u64;
        let aux_weights: Vec<u64> = self
            .registry
            .auxiliaries()
            .map(|h| h.progress_weight(OperationKind::Save, Some(kb)).units())
            .collect();
        let case_handlers: Vec<&dyn CaseRepositoryHandler> = self
            .registry
            .case_repository_handlers()
            .filter(|h| kb.case_repository(h.id()).is_some())
            .collect();
        let case_weights: Vec<u64> = case_handlers
            .iter()
            .map(|h| {
                h.progress_weight(OperationKind::Save, kb.case_repository(h.id()))
                    .units()
            })
            .collect();
        let total = basic_weight
            + aux_weights.iter().sum::<u64>()
            + case_weights.iter().sum::<u64>();

        let mut agg = progress::ProgressAggregator::new(sink, OperationKind::Save, total);
        agg.start("saving knowledge base");

        let mut writer = ArchiveWriter::create(target)?;
        let result = self.write_entries(
            kb,
            &mut writer,
            &mut agg,
            basic_weight,
            &aux_weights,
            &case_handlers,
            &case_weights,
        );
        // The writer is closed whether or not the pipeline succeeded; a
        // partial archive stays in place.
        let closed = writer.finish();
        result?;
        closed?;

        agg.done("knowledge base saved");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_entries(
        &self,
        kb: &KnowledgeBase,
        writer: &mut ArchiveWriter,
        agg: &mut progress::ProgressAggregator<'_>,
        basic_weight: u64,
        aux_weights: &[u64],
        case_handlers: &[&dyn CaseRepositoryHandler],
        case_weights: &[u64],
    ) -> Result<(), PersistError> {
        let kb_index = ContainerIndex::kb_index_document(
            BASIC_STORAGE_LOCATION,
            self.registry
                .auxiliaries()
                .map(|h| (h.id().to_string(), h.default_storage_location())),
        );
        writer.append(KB_INDEX_LOCATION, kb_index.as_bytes())?;

        let primary = self.basic.save(kb);
        writer.append(BASIC_STORAGE_LOCATION, &to_pretty_bytes(&primary))?;
        agg.complete_slot(basic_weight, "primary document");

        for (handler, weight) in self.registry.auxiliaries().zip(aux_weights) {
            let artifacts = {
                let mut slot = agg.slot(*weight);
                handler.save_all(kb, &mut slot).map_err(|e| {
                    PersistError::Document {
                        location: handler.default_storage_location(),
                        message: e.to_string(),
                    }
                })?
            };
            for (entry_name, document) in artifacts {
                writer.append(&entry_name, &to_pretty_bytes(&document))?;
            }
            agg.complete_slot(*weight, &format!("auxiliary {}", handler.id()));
        }

        let crs_index = ContainerIndex::crs_index_document(
            case_handlers
                .iter()
                .map(|h| (h.id().to_string(), h.default_storage_location())),
        );
        writer.append(CRS_INDEX_LOCATION, crs_index.as_bytes())?;

        for (handler, weight) in case_handlers.iter().zip(case_weights) {
            let repo = kb
                .case_repository(handler.id())
                .expect("case handlers are pre-filtered to those with a repository");
            let document = {
                let mut slot = agg.slot(*weight);
                handler.save(repo, &mut slot).map_err(|e| {
                    PersistError::Document {
                        location: handler.default_storage_location(),
                        message: e.to_string(),
                    }
                })?
            };
            writer.append(&handler.default_storage_location(), &to_pretty_bytes(&document))?;
            agg.complete_slot(*weight, &format!("case repository {}", handler.id()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("registry", &self.registry)
            .finish()
    }
}

fn content_length(path: &Path) -> u64 {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot probe content length");
            0
        }
    }
}

fn to_pretty_bytes(document: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec_pretty(document).expect("documents serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::qaset::{Choice, QASet, QuestionKind};

    fn sample_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new("Q000");
        kb.set_id("kb-manager");
        kb.insert_qaset(QASet::container("Q000", "root")).unwrap();
        kb.insert_qaset(QASet::question(
            "Q1",
            "color",
            QuestionKind::OneChoice {
                choices: vec![Choice::new("A1", "red")],
            },
        ))
        .unwrap();
        kb.add_qaset_edge("Q000", "Q1", crate::knowledge::hierarchy::LinkKind::Owned);
        kb
    }

    #[test]
    fn save_then_load_round_trips_without_handlers() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("sample.dkb");

        let manager = PersistenceManager::new(HandlerRegistry::new());
        manager.save(&sample_kb(), &target).unwrap();

        let outcome = manager.load(&target).unwrap();
        assert_eq!(outcome.knowledge_base.id(), Some("kb-manager"));
        assert_eq!(outcome.knowledge_base.qasets().count(), 2);
        assert!(outcome.report.is_clean(), "{:?}", outcome.report);
    }

    #[test]
    fn load_of_container_without_index_is_structural() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("empty.dkb");
        let mut writer = ArchiveWriter::create(&target).unwrap();
        writer.append("unrelated.txt", b"not a knowledge base").unwrap();
        writer.finish().unwrap();

        let manager = PersistenceManager::new(HandlerRegistry::new());
        let err = manager.load(&target).unwrap_err();
        assert!(matches!(err, PersistError::Structural { .. }));
    }
}
