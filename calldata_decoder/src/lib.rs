//! The identity manager contract advances its Merkle tree in batches, and
//! emits a `TreeChanged(preRoot, kind, postRoot)` event for each one.
//!
//! The event says *that* the tree changed, but not by how much. The batch size
//! lives in the calldata of the transaction that emitted it, so this library
//! walks that calldata to recover it, for the two shapes of transaction the
//! contract accepts:
//! - `registerIdentities`, see [`decode_registration_batch`].
//! - `deleteIdentities`, see [`decode_deletion_batch`].
//!
//! Callers that only have the event's `kind` in hand should use [`decode`],
//! which skips transactions whose outer calldata is not a direct call
//! (e.g. calls routed through a proxy or a multicall contract).
//!
//! # Non-Goals
//! - General ABI decoding. Only the two layouts above are understood, and only
//!   the head slots needed to reach their dynamic parameters are read.
//!
//! # Layouts
//!
//! Offsets are relative to the end of the 4-byte selector.
//!
//! ```text
//! registerIdentities
//! ┌──────────────────┬─────────┬────────────┬────────────┬──────────┬────────┬───────────────┐
//! │ insertionProof×8 │ preRoot │ startIndex │ offset (O) │ postRoot │ length │ commitments…  │
//! └──────────────────┴─────────┴────────────┴────────────┴──────────┴────────┴───────────────┘
//!   words 0..8         word 8    word 9       word 10      word 11    at O     at O + 32
//!
//! deleteIdentities
//! ┌──────────────────┬────────────┬─────────┬──────────┬──────────┬──────────────────────────┐
//! │ deletionProof×8  │ offset (O) │ preRoot │ postRoot │ len (L)  │ packed indices, padded   │
//! └──────────────────┴────────────┴─────────┴──────────┴──────────┴──────────────────────────┘
//!   words 0..8         word 8       word 9    word 10    at O       at O + 32
//! ```

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

mod wire;

use std::fmt;

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use tree_indexer_common::{
    DELETE_IDENTITIES_SELECTOR, PACKED_INDEX_HEX_WIDTH, REGISTER_IDENTITIES_SELECTOR,
    SELECTOR_BYTES, WORD_BYTES,
};
use wire::Calldata;

/// Head slot holding the offset of `identityCommitments`.
const IDENTITY_COMMITMENTS_SLOT: usize = 10;

/// Head slot holding the offset of `packedDeletionIndices`.
const PACKED_DELETION_INDICES_SLOT: usize = 8;

/// Hex-encoded bytes, as they arrive in a transaction's `input` field.
///
/// A leading `0x` is tolerated on the way in and emitted on the way out.
/// The digits themselves are only checked when they are read, so that a
/// [`HexString`] can be carried around (and serialized) before it is known
/// to be well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct HexString(String);

impl HexString {
    /// Wraps `s`, stripping a leading `0x` or `0X`.
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(rest) => Self(rest.to_owned()),
            None => Self(s),
        }
    }

    /// The hex digits, without any prefix.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Decodes the digits into bytes.
    ///
    /// # Errors
    /// - On non-hex characters or an odd number of digits.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MalformedCalldata> {
        Ok(hex::decode(&self.0)?)
    }

    /// Whether the input begins with `selector`.
    ///
    /// Inputs that are too short, or whose first 8 characters aren't hex,
    /// simply don't match.
    pub fn has_selector(&self, selector: [u8; SELECTOR_BYTES]) -> bool {
        self.0
            .get(..SELECTOR_BYTES * 2)
            .is_some_and(|it| it.eq_ignore_ascii_case(&hex::encode(selector)))
    }
}

impl From<String> for HexString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for HexString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<HexString> for String {
    fn from(value: HexString) -> Self {
        value.to_string()
    }
}

impl From<&[u8]> for HexString {
    fn from(value: &[u8]) -> Self {
        Self(hex::encode(value))
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

/// The `TreeChange` enum of the identity manager, as carried by
/// `TreeChanged` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TreeChangeKind {
    /// Identities were registered with `registerIdentities`.
    Insertion,
    /// Identities were removed with `deleteIdentities`.
    Deletion,
}

impl TreeChangeKind {
    /// The selector of the contract method that produces this kind of change.
    pub fn selector(self) -> [u8; SELECTOR_BYTES] {
        match self {
            TreeChangeKind::Insertion => REGISTER_IDENTITIES_SELECTOR,
            TreeChangeKind::Deletion => DELETE_IDENTITIES_SELECTOR,
        }
    }
}

impl TryFrom<u8> for TreeChangeKind {
    type Error = UnknownTreeChangeKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TreeChangeKind::Insertion),
            1 => Ok(TreeChangeKind::Deletion),
            other => Err(UnknownTreeChangeKind(other)),
        }
    }
}

impl From<TreeChangeKind> for u8 {
    fn from(value: TreeChangeKind) -> Self {
        match value {
            TreeChangeKind::Insertion => 0,
            TreeChangeKind::Deletion => 1,
        }
    }
}

/// A `TreeChanged` kind this library doesn't know how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown tree change kind {0}")]
pub struct UnknownTreeChangeKind(pub u8);

/// Why calldata couldn't be walked.
///
/// None of these are retryable: the same bytes will fail the same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedCalldata {
    /// The input contains non-hex characters, or an odd number of digits.
    #[error("input is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The input doesn't start with the selector of the decoded method.
    #[error("expected selector 0x{}, input starts with 0x{}", hex::encode(.expected), hex::encode(.found))]
    UnexpectedSelector {
        /// Selector of the method being decoded.
        expected: [u8; SELECTOR_BYTES],
        /// Up to the first four bytes of the input.
        found: Vec<u8>,
    },
    /// The calldata after the selector isn't a whole number of words.
    #[error("calldata body of {len} bytes is not word aligned")]
    Unaligned {
        /// Length of the calldata after the selector.
        len: usize,
    },
    /// A read fell outside of the calldata.
    #[error("read of {len} bytes at offset {offset} exceeds calldata length {available}")]
    OutOfBounds {
        /// Byte offset of the read, relative to the end of the selector.
        offset: usize,
        /// Number of bytes requested.
        len: usize,
        /// Length of the calldata after the selector.
        available: usize,
    },
    /// An offset or length word is too large to address anything.
    #[error("word {0:#x} is too large to be an offset or a length")]
    Overflow(U256),
}

/// Error type for both decoders.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The calldata is truncated or otherwise unreadable.
    #[error("malformed calldata: {0}")]
    MalformedCalldata(#[from] MalformedCalldata),
    /// The calldata is readable, but `packedDeletionIndices` doesn't split
    /// into whole entries.
    #[error("packed deletion indices span {length} bytes, which is not a multiple of {width}")]
    BatchSizeMisaligned {
        /// Declared byte length of `packedDeletionIndices`.
        length: usize,
        /// Expected divisor of `length`.
        width: usize,
    },
}

/// The identities added by a `registerIdentities` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationBatch {
    /// `identityCommitments.length`
    pub count: usize,
    /// The commitments, in calldata order.
    pub commitments: Vec<U256>,
}

/// The identities removed by a `deleteIdentities` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionBatch {
    /// Number of packed entries in `packedDeletionIndices`.
    pub batch_size: usize,
    /// The raw `packedDeletionIndices` bytes, without padding.
    #[serde(with = "hex")]
    pub packed_indices: Vec<u8>,
}

/// Either decoded batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodedBatch {
    /// See [`decode_registration_batch`].
    Registration(RegistrationBatch),
    /// See [`decode_deletion_batch`].
    Deletion(DeletionBatch),
}

impl DecodedBatch {
    /// The number of identities the batch touched.
    pub fn size(&self) -> usize {
        match self {
            DecodedBatch::Registration(it) => it.count,
            DecodedBatch::Deletion(it) => it.batch_size,
        }
    }
}

/// Decode `input` according to the method that produces `kind`.
///
/// Returns [`None`] if `input` doesn't start with that method's selector,
/// which happens when the identity manager was called indirectly.
///
/// # Errors
/// - If the selector matches, but the rest of the calldata doesn't decode.
pub fn decode(
    kind: TreeChangeKind,
    input: &HexString,
) -> Result<Option<DecodedBatch>, DecodeError> {
    if !input.has_selector(kind.selector()) {
        return Ok(None);
    }
    let batch = match kind {
        TreeChangeKind::Insertion => DecodedBatch::Registration(decode_registration_batch(input)?),
        TreeChangeKind::Deletion => DecodedBatch::Deletion(decode_deletion_batch(input)?),
    };
    Ok(Some(batch))
}

/// Recover `identityCommitments` from a `registerIdentities` call.
///
/// # Errors
/// - [`DecodeError::MalformedCalldata`] if `input` isn't a call to
///   `registerIdentities`, or if the array isn't within the calldata.
pub fn decode_registration_batch(input: &HexString) -> Result<RegistrationBatch, DecodeError> {
    let calldata = Calldata::parse(input, REGISTER_IDENTITIES_SELECTOR)?;
    let offset = calldata.offset(IDENTITY_COMMITMENTS_SLOT)?;
    let count = calldata.usize_at(offset)?;
    let commitments = calldata
        .words_from(offset.saturating_add(WORD_BYTES), count)?
        .collect::<Vec<_>>();
    Ok(RegistrationBatch { count, commitments })
}

/// Recover the batch size of a `deleteIdentities` call.
///
/// The batch size is the byte length of `packedDeletionIndices` divided by
/// [`PACKED_INDEX_HEX_WIDTH`].
///
/// # Errors
/// - [`DecodeError::MalformedCalldata`] if `input` isn't a call to
///   `deleteIdentities`, or if the packed bytes (and their padding) aren't
///   within the calldata.
/// - [`DecodeError::BatchSizeMisaligned`] if the packed bytes are present,
///   but don't divide into whole entries.
pub fn decode_deletion_batch(input: &HexString) -> Result<DeletionBatch, DecodeError> {
    let calldata = Calldata::parse(input, DELETE_IDENTITIES_SELECTOR)?;
    let offset = calldata.offset(PACKED_DELETION_INDICES_SLOT)?;
    let packed_indices = calldata.bytes_at(offset)?;
    let length = packed_indices.len();
    if length % PACKED_INDEX_HEX_WIDTH != 0 {
        return Err(DecodeError::BatchSizeMisaligned {
            length,
            width: PACKED_INDEX_HEX_WIDTH,
        });
    }
    Ok(DeletionBatch {
        batch_size: length / PACKED_INDEX_HEX_WIDTH,
        packed_indices: packed_indices.to_vec(),
    })
}
