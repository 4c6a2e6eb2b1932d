use std::sync::Arc;

use anyhow::{Context as _, Result};
use calldata_decoder::HexString;
use clap::Parser;
use cli::Command;
use tracing::info;
use tree_indexer::env::load_dotenvy_vars_if_present;
use tree_indexer::fs::{read_events_from_stdin, write_json};
use tree_indexer::handler::index_events;
use tree_indexer::provider::{build_http_provider, CachedProvider};
use tree_indexer::rpc::fetch_tree_changed_events;
use tree_indexer::store::MemoryRootStore;
use tree_indexer::IndexReport;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenvy_vars_if_present();
    tree_indexer::tracing::init();

    let args = cli::Cli::parse();

    match args.command {
        Command::Decode { kind, input } => {
            let batch = calldata_decoder::decode(kind.into(), &HexString::new(input))
                .context("couldn't decode calldata")?;
            write_json(None, &batch).await?;
        }
        Command::Stdio { output } => {
            let events = read_events_from_stdin()?;
            info!("Indexing {} events", events.len());
            let mut store = MemoryRootStore::new();
            let summary = index_events(&mut store, events);
            write_json(output.as_deref(), &IndexReport::new(&store, summary)).await?;
        }
        Command::Rpc {
            rpc,
            contract,
            start_block,
            end_block,
            output,
        } => {
            let cached_provider = Arc::new(CachedProvider::new(build_http_provider(rpc.rpc_url)));
            info!("Indexing blocks {start_block}..={end_block} of {contract}");
            let events =
                fetch_tree_changed_events(cached_provider, contract, start_block, end_block)
                    .await?;
            let mut store = MemoryRootStore::new();
            let summary = index_events(&mut store, events);
            info!(
                "Indexed {} events, {} with a batch size",
                summary.events, summary.decoded
            );
            write_json(output.as_deref(), &IndexReport::new(&store, summary)).await?;
        }
        Command::Extract { rpc, tx, kind } => {
            let cached_provider = CachedProvider::new(build_http_provider(rpc.rpc_url));
            let input = cached_provider.transaction_input(tx).await?;
            let batch = calldata_decoder::decode(kind.into(), &HexString::from(&input[..]))
                .with_context(|| format!("couldn't decode calldata of {tx}"))?;
            write_json(None, &batch).await?;
        }
    }

    Ok(())
}
