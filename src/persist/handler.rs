//! Pluggable side-channel handler contracts and their registry.
//!
//! Auxiliary handlers load and save one named document each; handlers that
//! must emit several artifacts override [`AuxiliaryHandler::save_all`].
//! Case-repository handlers are the parallel contract for training-case
//! storage. The registry is an explicit value built and injected by the
//! caller — there is no global discovery.

use std::path::Path;

use crate::error::DianoiaResult;
use crate::knowledge::{CaseRepository, KnowledgeBase};
use crate::persist::progress::{OperationKind, ProgressWeight, SlotProgress};

/// A persisted document.
pub type Document = serde_json::Value;

/// Legacy loader id accepted for case repositories saved by older tools.
const LEGACY_TRAIN_ALIAS: &str = "webTrain";
/// The handler id the legacy alias resolves to.
const TRAIN_HANDLER_ID: &str = "train";

/// A pluggable loader/saver for one auxiliary knowledge document.
pub trait AuxiliaryHandler {
    /// Stable handler id, used as the `loader` key in the container index.
    fn id(&self) -> &str;

    /// Where this handler's document lives inside the container.
    fn default_storage_location(&self) -> String;

    /// Load the document at `source` into the knowledge base.
    ///
    /// Earlier pipeline stages are fully loaded when this runs, so
    /// references into the primary document resolve.
    fn load(
        &self,
        kb: &mut KnowledgeBase,
        source: &Path,
        progress: &mut SlotProgress<'_>,
    ) -> DianoiaResult<()>;

    /// Produce this handler's document for saving.
    fn save(&self, kb: &KnowledgeBase, progress: &mut SlotProgress<'_>) -> DianoiaResult<Document>;

    /// Produce all artifacts to write. The default emits the single
    /// [`save`](Self::save) document at the default location; handlers with
    /// several named artifacts override this.
    fn save_all(
        &self,
        kb: &KnowledgeBase,
        progress: &mut SlotProgress<'_>,
    ) -> DianoiaResult<Vec<(String, Document)>> {
        Ok(vec![(self.default_storage_location(), self.save(kb, progress)?)])
    }

    /// Estimated share of the total work, for progress normalization.
    fn progress_weight(
        &self,
        _operation: OperationKind,
        _kb: Option<&KnowledgeBase>,
    ) -> ProgressWeight {
        ProgressWeight::Unknown
    }
}

/// A pluggable loader/saver for one case repository.
pub trait CaseRepositoryHandler {
    /// Stable handler id, used as the `loader` key in the repository index.
    fn id(&self) -> &str;

    /// Where this handler's repository lives inside the container.
    fn default_storage_location(&self) -> String;

    /// Load the repository at `source`, resolving against the loaded base.
    fn load(
        &self,
        kb: &KnowledgeBase,
        source: &Path,
        progress: &mut SlotProgress<'_>,
    ) -> DianoiaResult<CaseRepository>;

    /// Produce the repository document for saving.
    fn save(
        &self,
        repo: &CaseRepository,
        progress: &mut SlotProgress<'_>,
    ) -> DianoiaResult<Document>;

    /// Estimated share of the total work, for progress normalization.
    fn progress_weight(
        &self,
        _operation: OperationKind,
        _repo: Option<&CaseRepository>,
    ) -> ProgressWeight {
        ProgressWeight::Unknown
    }
}

/// Explicit registry of all side-channel handlers, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    auxiliary: Vec<Box<dyn AuxiliaryHandler>>,
    case_repositories: Vec<Box<dyn CaseRepositoryHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an auxiliary handler. Later registrations with the same id
    /// shadow earlier ones at lookup time but keep their pipeline position.
    pub fn register_auxiliary(&mut self, handler: Box<dyn AuxiliaryHandler>) {
        self.auxiliary.push(handler);
    }

    /// Register a case-repository handler.
    pub fn register_case_repository(&mut self, handler: Box<dyn CaseRepositoryHandler>) {
        self.case_repositories.push(handler);
    }

    /// The auxiliary handler registered under `id`.
    pub fn auxiliary(&self, id: &str) -> Option<&dyn AuxiliaryHandler> {
        self.auxiliary
            .iter()
            .rev()
            .find(|h| h.id() == id)
            .map(Box::as_ref)
    }

    /// Resolve a case-repository loader id to `(canonical id, handler)`.
    ///
    /// Containers written by older tools use the `webTrain` loader id; when
    /// no handler is registered under it, the entry resolves to the handler
    /// registered as `train` and is stored under that canonical id.
    pub fn case_repository(&self, id: &str) -> Option<(&str, &dyn CaseRepositoryHandler)> {
        let direct = self
            .case_repositories
            .iter()
            .rev()
            .find(|h| h.id() == id)
            .map(Box::as_ref);
        match direct {
            Some(handler) => Some((handler.id(), handler)),
            None if id == LEGACY_TRAIN_ALIAS => {
                let handler = self
                    .case_repositories
                    .iter()
                    .rev()
                    .find(|h| h.id() == TRAIN_HANDLER_ID)?;
                Some((TRAIN_HANDLER_ID, handler.as_ref()))
            }
            None => None,
        }
    }

    /// All auxiliary handlers in registration order.
    pub fn auxiliaries(&self) -> impl Iterator<Item = &dyn AuxiliaryHandler> {
        self.auxiliary.iter().map(Box::as_ref)
    }

    /// All case-repository handlers in registration order.
    pub fn case_repository_handlers(&self) -> impl Iterator<Item = &dyn CaseRepositoryHandler> {
        self.case_repositories.iter().map(Box::as_ref)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("auxiliary", &self.auxiliary.len())
            .field("case_repositories", &self.case_repositories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCaseHandler {
        id: &'static str,
    }

    impl CaseRepositoryHandler for StubCaseHandler {
        fn id(&self) -> &str {
            self.id
        }

        fn default_storage_location(&self) -> String {
            format!("cases/{}.json", self.id)
        }

        fn load(
            &self,
            _kb: &KnowledgeBase,
            _source: &Path,
            _progress: &mut SlotProgress<'_>,
        ) -> DianoiaResult<CaseRepository> {
            Ok(CaseRepository::default())
        }

        fn save(
            &self,
            _repo: &CaseRepository,
            _progress: &mut SlotProgress<'_>,
        ) -> DianoiaResult<Document> {
            Ok(Document::Null)
        }
    }

    #[test]
    fn legacy_alias_resolves_to_train() {
        let mut registry = HandlerRegistry::new();
        registry.register_case_repository(Box::new(StubCaseHandler { id: "train" }));

        let (canonical, handler) = registry.case_repository("webTrain").unwrap();
        assert_eq!(canonical, "train");
        assert_eq!(handler.id(), "train");
    }

    #[test]
    fn direct_registration_wins_over_alias() {
        let mut registry = HandlerRegistry::new();
        registry.register_case_repository(Box::new(StubCaseHandler { id: "train" }));
        registry.register_case_repository(Box::new(StubCaseHandler { id: "webTrain" }));

        let (canonical, _) = registry.case_repository("webTrain").unwrap();
        assert_eq!(canonical, "webTrain");
    }

    #[test]
    fn unknown_loader_id_resolves_to_nothing() {
        let registry = HandlerRegistry::new();
        assert!(registry.case_repository("webTrain").is_none());
        assert!(registry.auxiliary("xclpattern").is_none());
    }
}
