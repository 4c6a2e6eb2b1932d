//! One-shot backfill of `TreeChanged` events over a bounded block range.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::transports::Transport;
use anyhow::{ensure, Context as _};
use calldata_decoder::{HexString, TreeChangeKind, UnknownTreeChangeKind};
use ethereum_types::{H256, U256};
use futures::{StreamExt as _, TryStreamExt as _};
use tracing::{info, warn};
use tree_indexer_common::{event_topic, TREE_CHANGED_SIGNATURE};

use crate::event::{BlockInfo, TransactionInfo, TreeChangedArgs, TreeChangedEvent};
use crate::provider::CachedProvider;

/// Number of transactions fetched at once.
const FETCH_CONCURRENCY: usize = 16;

/// The parts of a `TreeChanged` event that are in the log itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChangedLog {
    pub args: TreeChangedArgs,
    pub transaction_hash: B256,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub log_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("expected 4 topics, found {0}")]
    TopicCount(usize),
    #[error("not a TreeChanged log")]
    WrongEvent,
    #[error("kind topic {0:#x} is out of range")]
    KindOutOfRange(U256),
    #[error(transparent)]
    UnknownKind(#[from] UnknownTreeChangeKind),
    #[error("log is missing its {0}")]
    Missing(&'static str),
}

pub fn tree_changed_topic() -> B256 {
    B256::from_slice(event_topic(TREE_CHANGED_SIGNATURE).as_bytes())
}

impl TryFrom<&Log> for TreeChangedLog {
    type Error = LogError;

    /// All of `TreeChanged`'s parameters are indexed, so everything is in the
    /// topics: `[signature, preRoot, kind, postRoot]`.
    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let [signature, pre_root, kind, post_root] = log.inner.data.topics() else {
            return Err(LogError::TopicCount(log.inner.data.topics().len()));
        };
        if *signature != tree_changed_topic() {
            return Err(LogError::WrongEvent);
        }
        let kind = U256::from_big_endian(kind.as_slice());
        if kind.bits() > 8 {
            return Err(LogError::KindOutOfRange(kind));
        }
        Ok(Self {
            args: TreeChangedArgs {
                pre_root: U256::from_big_endian(pre_root.as_slice()),
                post_root: U256::from_big_endian(post_root.as_slice()),
                kind: TreeChangeKind::try_from(kind.low_u64() as u8)?,
            },
            transaction_hash: log
                .transaction_hash
                .ok_or(LogError::Missing("transaction hash"))?,
            block_number: log.block_number.ok_or(LogError::Missing("block number"))?,
            block_timestamp: log.block_timestamp,
            log_index: log.log_index.ok_or(LogError::Missing("log index"))?,
        })
    }
}

/// Fetch every `TreeChanged` event emitted by `contract` in
/// `start_block..=end_block`, along with the calldata of the transactions
/// that emitted them.
///
/// Logs that aren't well formed `TreeChanged` logs are skipped.
/// Events are returned in chain order.
pub async fn fetch_tree_changed_events<ProviderT, TransportT>(
    cached_provider: Arc<CachedProvider<ProviderT, TransportT>>,
    contract: Address,
    start_block: u64,
    end_block: u64,
) -> anyhow::Result<Vec<TreeChangedEvent>>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    ensure!(
        start_block <= end_block,
        "start block {start_block} is after end block {end_block}"
    );

    let filter = Filter::new()
        .address(contract)
        .event_signature(tree_changed_topic())
        .from_block(start_block)
        .to_block(end_block);
    let logs = cached_provider
        .get_provider()
        .await?
        .get_logs(&filter)
        .await
        .context("couldn't fetch TreeChanged logs")?;
    info!(
        "found {} TreeChanged logs in blocks {start_block}..={end_block}",
        logs.len()
    );

    let logs = logs
        .iter()
        .filter_map(|log| match TreeChangedLog::try_from(log) {
            Ok(it) => Some(it),
            Err(e) => {
                warn!("skipping log {:?}: {e}", log.transaction_hash);
                None
            }
        })
        .collect::<Vec<_>>();

    let mut events = futures::stream::iter(logs.into_iter().map(|log| {
        let cached_provider = &cached_provider;
        async move {
            let input = cached_provider
                .transaction_input(log.transaction_hash)
                .await
                .with_context(|| format!("couldn't fetch input of {}", log.transaction_hash))?;
            let timestamp = match log.block_timestamp {
                Some(it) => it,
                None => cached_provider.block_timestamp(log.block_number).await?,
            };
            anyhow::Ok(TreeChangedEvent {
                args: log.args,
                transaction: TransactionInfo {
                    input: HexString::from(&input[..]),
                    hash: H256::from_slice(log.transaction_hash.as_slice()),
                },
                block: BlockInfo {
                    timestamp,
                    number: log.block_number,
                },
                log_index: log.log_index,
            })
        }
    }))
    .buffered(FETCH_CONCURRENCY)
    .try_collect::<Vec<_>>()
    .await?;

    events.sort_by_key(TreeChangedEvent::position);
    Ok(events)
}
