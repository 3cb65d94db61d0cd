//! # dianoia
//!
//! A knowledge-base engine for diagnostic expert systems: questions,
//! diagnoses and rules, persisted to and from a multi-document container.
//!
//! ## Architecture
//!
//! - **Domain model** (`knowledge`): the knowledge base aggregate — QASet
//!   trees, diagnosis DAGs, tagged knowledge slices, composite rule
//!   conditions with tri-valued evaluation
//! - **Persistence** (`persist`): container index, two-phase document
//!   loading with reference resolution, condition/action factories,
//!   incremental patches, and save/load orchestration with aggregated
//!   progress reporting
//!
//! ## Library usage
//!
//! ```no_run
//! use dianoia::persist::{HandlerRegistry, PersistenceManager};
//!
//! let manager = PersistenceManager::new(HandlerRegistry::new());
//! let outcome = manager.load(std::path::Path::new("anamnesis.dkb")).unwrap();
//! println!("{} slices", outcome.knowledge_base.slices().count());
//! ```

pub mod error;
pub mod interval;
pub mod knowledge;
pub mod persist;
pub mod score;
