//! `TreeChanged` events, in the shape the event source delivers them.
//!
//! ```json
//! {
//!   "args": { "preRoot": "0x…", "postRoot": "0x…", "kind": 0 },
//!   "transaction": { "input": "0x…", "hash": "0x…" },
//!   "block": { "timestamp": 1700000000, "number": 123 }
//! }
//! ```

use calldata_decoder::{HexString, TreeChangeKind};
use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeChangedEvent {
    pub args: TreeChangedArgs,
    pub transaction: TransactionInfo,
    pub block: BlockInfo,
    /// Position of the log within its block.
    /// Hand-written events may leave this out.
    #[serde(default)]
    pub log_index: u64,
}

impl TreeChangedEvent {
    /// Chain order of events.
    pub fn position(&self) -> (u64, u64) {
        (self.block.number, self.log_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeChangedArgs {
    pub pre_root: U256,
    pub post_root: U256,
    pub kind: TreeChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Calldata of the transaction that emitted the event.
    pub input: HexString,
    pub hash: H256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub timestamp: u64,
    pub number: u64,
}
