use ethereum_types::H256;

/// `registerIdentities(uint256[8],uint256,uint32,uint256[],uint256)`
pub const REGISTER_IDENTITIES_SIGNATURE: &str =
    "registerIdentities(uint256[8],uint256,uint32,uint256[],uint256)";

/// `deleteIdentities(uint256[8],bytes,uint256,uint256)`
pub const DELETE_IDENTITIES_SIGNATURE: &str = "deleteIdentities(uint256[8],bytes,uint256,uint256)";

/// Emitted by the identity manager on every root transition.
/// All three parameters are indexed, and the `TreeChange` enum is encoded as
/// `uint8`.
pub const TREE_CHANGED_SIGNATURE: &str = "TreeChanged(uint256,uint8,uint256)";

/// 0x2217b211
pub const REGISTER_IDENTITIES_SELECTOR: [u8; SELECTOR_BYTES] = [0x22, 0x17, 0xb2, 0x11];

/// 0xea10fbbe
pub const DELETE_IDENTITIES_SELECTOR: [u8; SELECTOR_BYTES] = [0xea, 0x10, 0xfb, 0xbe];

/// Width of a method selector.
pub const SELECTOR_BYTES: usize = 4;

/// Base alignment of the ABI encoding.
pub const WORD_BYTES: usize = 32;

/// Packed deletion indices are 4 bytes wide, which is 8 hex digits.
/// The deletion batch size is the declared byte length of
/// `packedDeletionIndices` divided by this width.
pub const PACKED_INDEX_HEX_WIDTH: usize = 8;

/// Computes the 4-byte method selector of a canonical function signature.
pub fn selector(signature: &str) -> [u8; SELECTOR_BYTES] {
    let hash = keccak_hash::keccak(signature.as_bytes());
    let mut out = [0; SELECTOR_BYTES];
    out.copy_from_slice(&hash.as_bytes()[..SELECTOR_BYTES]);
    out
}

/// Computes the `topic0` of a canonical event signature.
pub fn event_topic(signature: &str) -> H256 {
    keccak_hash::keccak(signature.as_bytes())
}

#[test]
fn test_register_identities_selector() {
    assert_eq!(
        REGISTER_IDENTITIES_SELECTOR,
        selector(REGISTER_IDENTITIES_SIGNATURE)
    );
}

#[test]
fn test_delete_identities_selector() {
    assert_eq!(
        DELETE_IDENTITIES_SELECTOR,
        selector(DELETE_IDENTITIES_SIGNATURE)
    );
}

#[test]
fn test_event_topic_is_full_hash() {
    let topic = event_topic(TREE_CHANGED_SIGNATURE);
    assert_eq!(
        selector(TREE_CHANGED_SIGNATURE),
        topic.as_bytes()[..SELECTOR_BYTES]
    );
}
