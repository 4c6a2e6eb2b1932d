use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::Arc;

use alloy::primitives::{Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::client::ClientBuilder;
use alloy::rpc::types::{BlockId, BlockTransactionsKind};
use alloy::transports::http::{reqwest::Url, ReqwestTransport};
use alloy::transports::Transport;
use anyhow::Context as _;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

const CACHE_SIZE: usize = 1024;
const MAX_NUMBER_OF_PARALLEL_REQUESTS: usize = 32;

pub fn build_http_provider(rpc_url: Url) -> RootProvider<ReqwestTransport> {
    let client = ClientBuilder::default().http(rpc_url);
    ProviderBuilder::new().on_client(client)
}

/// Wrapper around alloy provider to cache block timestamps, since a block
/// usually carries several `TreeChanged` events.
pub struct CachedProvider<ProviderT, TransportT> {
    provider: Arc<ProviderT>,
    // `Alloy` provider is using `Reqwest` http client under the hood. It has an unbounded
    // connection pool. We need to limit the number of parallel connections by ourselves, so we
    // use semaphore to count the number of parallel RPC requests happening at any moment with
    // CachedProvider.
    semaphore: Arc<Semaphore>,
    timestamps: Arc<Mutex<lru::LruCache<u64, u64>>>,
    _phantom: std::marker::PhantomData<TransportT>,
}

pub struct ProviderGuard<'a, ProviderT> {
    provider: Arc<ProviderT>,
    _permit: SemaphorePermit<'a>,
}

impl<ProviderT> Deref for ProviderGuard<'_, ProviderT> {
    type Target = Arc<ProviderT>;

    fn deref(&self) -> &Self::Target {
        &self.provider
    }
}

impl<ProviderT, TransportT> CachedProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT) -> Self {
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(MAX_NUMBER_OF_PARALLEL_REQUESTS)),
            timestamps: Arc::new(Mutex::new(lru::LruCache::new(
                NonZeroUsize::new(CACHE_SIZE).expect("cache size is non-zero"),
            ))),
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn get_provider(&self) -> Result<ProviderGuard<ProviderT>, anyhow::Error> {
        Ok(ProviderGuard {
            provider: self.provider.clone(),
            _permit: self.semaphore.acquire().await?,
        })
    }

    /// Retrieves the timestamp of block `number`, caching it if it's not
    /// already cached.
    pub async fn block_timestamp(&self, number: u64) -> anyhow::Result<u64> {
        if let Some(timestamp) = self.timestamps.lock().await.get(&number).copied() {
            return Ok(timestamp);
        }

        let block = self
            .get_provider()
            .await?
            .get_block(BlockId::number(number), BlockTransactionsKind::Hashes)
            .await?
            .with_context(|| format!("block {number} does not exist"))?;

        self.timestamps
            .lock()
            .await
            .put(number, block.header.timestamp);
        Ok(block.header.timestamp)
    }

    /// Retrieves the calldata of transaction `hash`.
    pub async fn transaction_input(&self, hash: B256) -> anyhow::Result<Bytes> {
        let transaction = self
            .get_provider()
            .await?
            .get_transaction_by_hash(hash)
            .await?
            .with_context(|| format!("transaction {hash} does not exist"))?;
        Ok(transaction.input)
    }
}
