//! Indexes `TreeChanged` events from the identity manager into a chain of
//! tree roots, each annotated with the size of the batch that produced it.
//!
//! Events come either from a JSON file (see [`event`]), or from a node
//! (see [`rpc`]), and are applied by [`handler`] to a [`store::RootStore`].

use serde::{Deserialize, Serialize};

pub mod env;
pub mod event;
pub mod fs;
pub mod handler;
pub mod provider;
pub mod rpc;
pub mod store;
pub mod tracing;

use handler::IndexSummary;
use store::{ChainStats, MemoryRootStore, Root};

/// Common information for the `--version` CLI flags.
pub fn version() -> String {
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    format!("{pkg_name} {pkg_version}")
}

/// What an indexing run writes out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub summary: IndexSummary,
    pub stats: ChainStats,
    pub head: Option<Root>,
    pub roots: Vec<Root>,
}

impl IndexReport {
    pub fn new(store: &MemoryRootStore, summary: IndexSummary) -> Self {
        Self {
            summary,
            stats: store.stats(),
            head: store.head().cloned(),
            roots: store.roots().cloned().collect(),
        }
    }
}
