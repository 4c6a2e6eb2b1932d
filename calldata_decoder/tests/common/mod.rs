//! Calldata builders shared by the integration tests.
//!
//! Encoding goes through [`alloy::sol_types`], so the decoder is always checked
//! against an independent ABI implementation.

use alloy::sol_types::SolCall as _;
use calldata_decoder::HexString;
use ethereum_types::U256;

alloy::sol! {
    function registerIdentities(
        uint256[8] insertionProof,
        uint256 preRoot,
        uint32 startIndex,
        uint256[] identityCommitments,
        uint256 postRoot
    ) external;

    function deleteIdentities(
        uint256[8] deletionProof,
        bytes packedDeletionIndices,
        uint256 preRoot,
        uint256 postRoot
    ) external;
}

pub const WORD: usize = 32;

fn to_alloy(it: &U256) -> alloy::primitives::U256 {
    let mut buf = [0; WORD];
    it.to_big_endian(&mut buf);
    alloy::primitives::U256::from_be_bytes(buf)
}

/// `n` distinct commitments, using the full width of a word.
pub fn commitments(n: usize) -> Vec<U256> {
    (0..n).map(|i| U256::MAX - U256::from(i as u64)).collect()
}

/// `len` packed bytes with a recognisable pattern.
pub fn packed(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn register_identities(commitments: &[U256]) -> Vec<u8> {
    registerIdentitiesCall {
        insertionProof: [alloy::primitives::U256::from(7); 8],
        preRoot: alloy::primitives::U256::from(1),
        startIndex: 42,
        identityCommitments: commitments.iter().map(to_alloy).collect(),
        postRoot: alloy::primitives::U256::from(2),
    }
    .abi_encode()
}

pub fn delete_identities(packed_indices: &[u8]) -> Vec<u8> {
    deleteIdentitiesCall {
        deletionProof: [alloy::primitives::U256::from(7); 8],
        packedDeletionIndices: packed_indices.to_vec().into(),
        preRoot: alloy::primitives::U256::from(2),
        postRoot: alloy::primitives::U256::from(3),
    }
    .abi_encode()
}

/// A big-endian word.
pub fn word(value: U256) -> [u8; WORD] {
    let mut out = [0; WORD];
    value.to_big_endian(&mut out);
    out
}

pub fn hex_input(bytes: &[u8]) -> HexString {
    HexString::new(format!("0x{}", hex::encode(bytes)))
}

/// `bytes` with the last `by` bytes dropped.
pub fn truncated(bytes: &[u8], by: usize) -> HexString {
    hex_input(&bytes[..bytes.len() - by])
}
