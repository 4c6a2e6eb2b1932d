use std::path::PathBuf;

use alloy::primitives::{Address, B256};
use alloy::transports::http::reqwest::Url;
use calldata_decoder::TreeChangeKind;
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

/// identity tree indexer
#[derive(Parser)]
#[command(version = tree_indexer::version(), propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Clone, Debug)]
pub(crate) struct RpcConfig {
    /// The node RPC URL.
    #[arg(short = 'u', long, env = "TREE_INDEXER_RPC_URL", value_hint = ValueHint::Url)]
    pub(crate) rpc_url: Url,
}

/// Which identity manager method a transaction is expected to call.
#[derive(ValueEnum, Clone, Copy, PartialEq, Debug)]
pub(crate) enum Kind {
    /// `registerIdentities`
    Insertion,
    /// `deleteIdentities`
    Deletion,
}

impl From<Kind> for TreeChangeKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Insertion => TreeChangeKind::Insertion,
            Kind::Deletion => TreeChangeKind::Deletion,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Decodes the batch size out of raw calldata, and writes it to stdout.
    Decode {
        /// The expected method.
        #[arg(short, long, value_enum)]
        kind: Kind,
        /// The hex calldata, with or without `0x`.
        input: String,
    },
    /// Reads a JSON array of TreeChanged events from stdin and writes the
    /// indexed root chain to stdout.
    Stdio {
        /// Write to this file instead of stdout.
        #[arg(short, long, env = "TREE_INDEXER_OUTPUT", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Indexes a range of blocks from a node and writes the root chain to
    /// stdout.
    Rpc {
        #[command(flatten)]
        rpc: RpcConfig,
        /// Address of the identity manager contract.
        #[arg(short, long, env = "TREE_INDEXER_CONTRACT")]
        contract: Address,
        /// The start of the block range to index (inclusive).
        #[arg(short, long, env = "TREE_INDEXER_START_BLOCK")]
        start_block: u64,
        /// The end of the block range to index (inclusive).
        #[arg(short, long, env = "TREE_INDEXER_END_BLOCK")]
        end_block: u64,
        /// Write to this file instead of stdout.
        #[arg(short, long, env = "TREE_INDEXER_OUTPUT", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
    /// Fetches a single transaction from a node and decodes its batch size.
    Extract {
        #[command(flatten)]
        rpc: RpcConfig,
        /// Transaction hash.
        #[arg(long, short)]
        tx: B256,
        /// The expected method.
        #[arg(short, long, value_enum)]
        kind: Kind,
    },
}
