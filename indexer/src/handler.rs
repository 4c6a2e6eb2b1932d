//! Applies `TreeChanged` events to a [`RootStore`].

use calldata_decoder::DecodeError;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{TreeChangedArgs, TreeChangedEvent};
use crate::store::{Root, RootStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    Decoded,
    /// The transaction didn't call the identity manager directly.
    NotApplicable,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleOutcome {
    pub root_id: U256,
    pub batch_size: Option<usize>,
    pub status: DecodeStatus,
}

/// Counts of [`DecodeStatus`] over a run of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub events: usize,
    pub decoded: usize,
    pub not_applicable: usize,
    pub failed: usize,
}

impl IndexSummary {
    fn record(&mut self, status: DecodeStatus) {
        self.events += 1;
        match status {
            DecodeStatus::Decoded => self.decoded += 1,
            DecodeStatus::NotApplicable => self.not_applicable += 1,
            DecodeStatus::Failed => self.failed += 1,
        }
    }
}

/// Store the root created by `event`, with its batch size if the calldata
/// allows, and link it to its predecessor.
///
/// A transaction whose calldata doesn't decode still produces a root, just
/// without a batch size, so one bad transaction doesn't hold up the rest.
pub fn handle_tree_changed<S: RootStore + ?Sized>(
    store: &mut S,
    event: &TreeChangedEvent,
) -> HandleOutcome {
    let TreeChangedArgs {
        pre_root,
        post_root,
        kind,
    } = event.args;
    let tx = event.transaction.hash;

    let (batch_size, status) = match calldata_decoder::decode(kind, &event.transaction.input) {
        Ok(Some(batch)) => (Some(batch.size()), DecodeStatus::Decoded),
        Ok(None) => {
            debug!("transaction {tx:?} is not a direct {kind:?} call, leaving batch size unset");
            (None, DecodeStatus::NotApplicable)
        }
        Err(e @ DecodeError::BatchSizeMisaligned { .. }) => {
            warn!("unexpected deletion packing in transaction {tx:?}: {e}");
            (None, DecodeStatus::Failed)
        }
        Err(e) => {
            warn!("couldn't decode batch size of transaction {tx:?}: {e}");
            (None, DecodeStatus::Failed)
        }
    };

    store.upsert(Root {
        id: post_root,
        pre_root,
        post_root: None,
        kind,
        created_tx: tx,
        timestamp: event.block.timestamp,
        block_number: event.block.number,
        batch_size,
    });

    // the previous root may predate the indexed range
    if let Err(e) = store.link_successor(pre_root, post_root) {
        debug!("not linking {post_root:#x} to its predecessor: {e}");
    }

    HandleOutcome {
        root_id: post_root,
        batch_size,
        status,
    }
}

/// Apply `events` in chain order.
pub fn index_events<S: RootStore + ?Sized>(
    store: &mut S,
    events: impl IntoIterator<Item = TreeChangedEvent>,
) -> IndexSummary {
    let mut events = events.into_iter().collect::<Vec<_>>();
    events.sort_by_key(TreeChangedEvent::position);

    let mut summary = IndexSummary::default();
    for event in &events {
        summary.record(handle_tree_changed(store, event).status);
    }
    summary
}
