//! The history of the identity tree, as a chain of [`Root`]s.
//!
//! Each root points back at the root it replaced (`pre_root`), and once its
//! successor is known, forward at that (`post_root`).
//!
//! ```text
//! ┌────────┐ post_root ┌────────┐ post_root ┌────────┐
//! │ root 0 │──────────▶│ root 1 │──────────▶│ root 2 │
//! │        │◀──────────│        │◀──────────│        │
//! └────────┘  pre_root └────────┘  pre_root └────────┘
//! ```

use std::collections::{HashMap, HashSet};

use calldata_decoder::TreeChangeKind;
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};

/// One state of the identity tree, identified by its root hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    /// The root hash, i.e the `postRoot` of the event that created it.
    pub id: U256,
    pub pre_root: U256,
    /// The root that replaced this one, if any has been seen.
    pub post_root: Option<U256>,
    pub kind: TreeChangeKind,
    pub created_tx: H256,
    pub timestamp: u64,
    pub block_number: u64,
    /// Number of identities inserted or deleted, if the creating
    /// transaction's calldata could be decoded.
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("root {0:#x} not found")]
    RootNotFound(U256),
}

/// Where [`Root`]s are persisted.
#[cfg_attr(test, mockall::automock)]
pub trait RootStore {
    /// Insert `root`, replacing any root with the same id.
    fn upsert(&mut self, root: Root);

    /// Record that `post_root` replaced `pre_root`.
    fn link_successor(&mut self, pre_root: U256, post_root: U256) -> Result<(), StoreError>;

    fn get(&self, id: &U256) -> Option<Root>;
}

/// Totals over every root in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub roots: usize,
    pub insertion_batches: usize,
    pub deletion_batches: usize,
    pub identities_inserted: u64,
    pub identities_deleted: u64,
    /// Roots whose batch size is unknown.
    pub undecoded: usize,
}

/// [`RootStore`] which keeps everything in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryRootStore {
    roots: HashMap<U256, Root>,
    order: Vec<U256>,
}

impl MemoryRootStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All roots, in the order they were first inserted.
    pub fn roots(&self) -> impl Iterator<Item = &Root> {
        self.order.iter().filter_map(|id| self.roots.get(id))
    }

    /// The latest root that hasn't been replaced.
    pub fn head(&self) -> Option<&Root> {
        self.roots()
            .filter(|it| it.post_root.is_none())
            .max_by_key(|it| it.block_number)
    }

    /// Walk back from `from` along `pre_root`, yielding at most `limit` roots.
    ///
    /// Stops at the first root which isn't in the store, or if the chain
    /// loops back on itself.
    pub fn history(&self, from: &U256, limit: usize) -> Vec<&Root> {
        let mut seen = HashSet::new();
        std::iter::successors(self.roots.get(from), |it| self.roots.get(&it.pre_root))
            .take_while(|it| seen.insert(it.id))
            .take(limit)
            .collect()
    }

    pub fn stats(&self) -> ChainStats {
        self.roots().fold(ChainStats::default(), |mut acc, root| {
            acc.roots += 1;
            let size = root.batch_size.map(|it| it as u64);
            match root.kind {
                TreeChangeKind::Insertion => {
                    acc.insertion_batches += 1;
                    acc.identities_inserted += size.unwrap_or_default();
                }
                TreeChangeKind::Deletion => {
                    acc.deletion_batches += 1;
                    acc.identities_deleted += size.unwrap_or_default();
                }
            }
            if size.is_none() {
                acc.undecoded += 1;
            }
            acc
        })
    }
}

impl RootStore for MemoryRootStore {
    fn upsert(&mut self, mut root: Root) {
        match self.roots.get(&root.id) {
            // a replayed event shouldn't drop an existing link
            Some(existing) => root.post_root = root.post_root.or(existing.post_root),
            None => self.order.push(root.id),
        }
        self.roots.insert(root.id, root);
    }

    fn link_successor(&mut self, pre_root: U256, post_root: U256) -> Result<(), StoreError> {
        let root = self
            .roots
            .get_mut(&pre_root)
            .ok_or(StoreError::RootNotFound(pre_root))?;
        root.post_root = Some(post_root);
        Ok(())
    }

    fn get(&self, id: &U256) -> Option<Root> {
        self.roots.get(id).cloned()
    }
}

#[cfg(test)]
pub(crate) fn root(id: u64, pre_root: u64, kind: TreeChangeKind, batch_size: Option<usize>) -> Root {
    Root {
        id: U256::from(id),
        pre_root: U256::from(pre_root),
        post_root: None,
        kind,
        created_tx: H256::from_low_u64_be(id),
        timestamp: 1_700_000_000 + id,
        block_number: id,
        batch_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: u64) -> MemoryRootStore {
        let mut store = MemoryRootStore::new();
        for id in 1..=len {
            store.upsert(root(id, id - 1, TreeChangeKind::Insertion, Some(10)));
            let _ = store.link_successor(U256::from(id - 1), U256::from(id));
        }
        store
    }

    #[test]
    fn link_to_missing_root() {
        let mut store = MemoryRootStore::new();
        assert_eq!(
            store.link_successor(U256::from(7), U256::from(8)),
            Err(StoreError::RootNotFound(U256::from(7)))
        );
    }

    #[test]
    fn links_forward() {
        let store = chain(3);
        assert_eq!(store.get(&U256::from(1)).unwrap().post_root, Some(U256::from(2)));
        assert_eq!(store.get(&U256::from(3)).unwrap().post_root, None);
        // the genesis root is never materialized
        assert_eq!(store.get(&U256::zero()), None);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn upsert_keeps_link() {
        let mut store = chain(2);
        store.upsert(root(1, 0, TreeChangeKind::Insertion, Some(11)));
        let it = store.get(&U256::from(1)).unwrap();
        assert_eq!(it.batch_size, Some(11));
        assert_eq!(it.post_root, Some(U256::from(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn head_is_latest_unreplaced() {
        let store = chain(4);
        assert_eq!(store.head().map(|it| it.id), Some(U256::from(4)));
        assert_eq!(MemoryRootStore::new().head(), None);
    }

    #[test]
    fn history_walks_back() {
        let store = chain(5);
        let ids = store
            .history(&U256::from(4), 10)
            .into_iter()
            .map(|it| it.id.low_u64())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        assert_eq!(store.history(&U256::from(5), 2).len(), 2);
        assert!(store.history(&U256::from(99), 10).is_empty());
    }

    #[test]
    fn history_stops_on_loop() {
        let mut store = MemoryRootStore::new();
        store.upsert(root(1, 2, TreeChangeKind::Insertion, None));
        store.upsert(root(2, 1, TreeChangeKind::Insertion, None));
        assert_eq!(store.history(&U256::from(1), usize::MAX).len(), 2);
    }

    #[test]
    fn stats() {
        let mut store = MemoryRootStore::new();
        store.upsert(root(1, 0, TreeChangeKind::Insertion, Some(100)));
        store.upsert(root(2, 1, TreeChangeKind::Insertion, None));
        store.upsert(root(3, 2, TreeChangeKind::Deletion, Some(8)));
        store.upsert(root(4, 3, TreeChangeKind::Insertion, Some(5)));
        assert_eq!(
            store.stats(),
            ChainStats {
                roots: 4,
                insertion_batches: 3,
                deletion_batches: 1,
                identities_inserted: 105,
                identities_deleted: 8,
                undecoded: 1,
            }
        );
    }
}
