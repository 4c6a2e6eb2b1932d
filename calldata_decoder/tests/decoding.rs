//! Checks both decoders against calldata produced by a reference ABI encoder,
//! and against hand-assembled layouts.

mod common;

use assert2::{check, let_assert};
use calldata_decoder::{
    decode, decode_deletion_batch, decode_registration_batch, DecodeError, DecodedBatch,
    HexString, MalformedCalldata, TreeChangeKind,
};
use common::{
    commitments, delete_identities, hex_input, packed, register_identities, truncated, word, WORD,
};
use ethereum_types::U256;
use rstest::rstest;

#[rstest]
fn registration_round_trip(#[values(0, 1, 2, 3, 17, 31, 32, 33, 63, 64)] n: usize) {
    let expected = commitments(n);
    let input = hex_input(&register_identities(&expected));

    let batch = decode_registration_batch(&input).unwrap();
    check!(batch.count == n);
    check!(batch.commitments == expected);
}

#[test]
fn registration_round_trip_exhaustive() {
    for n in 0..=64 {
        let input = hex_input(&register_identities(&commitments(n)));
        let_assert!(Ok(Some(DecodedBatch::Registration(batch))) = decode(TreeChangeKind::Insertion, &input));
        assert_eq!(batch.count, n, "n = {n}");
    }
}

#[rstest]
fn deletion_round_trip(#[values(0, 1, 2, 4, 5, 100)] m: usize) {
    let indices = packed(8 * m);
    let input = hex_input(&delete_identities(&indices));

    let batch = decode_deletion_batch(&input).unwrap();
    check!(batch.batch_size == m);
    check!(batch.packed_indices == indices);
}

#[rstest]
#[case::single_byte(1)]
#[case::one_index(4)]
#[case::almost(7)]
#[case::one_and_a_half(12)]
#[case::past_a_word(33)]
fn deletion_misaligned(#[case] length: usize) {
    let input = hex_input(&delete_identities(&packed(length)));

    let_assert!(
        Err(DecodeError::BatchSizeMisaligned { length: found, width }) =
            decode_deletion_batch(&input)
    );
    check!(found == length);
    check!(width == 8);
}

#[rstest]
#[case::last_commitment(WORD)]
#[case::all_commitments(3 * WORD)]
#[case::length_word(4 * WORD)]
#[case::mid_word(WORD / 2)]
fn registration_truncated(#[case] by: usize) {
    let input = truncated(&register_identities(&commitments(3)), by);

    let_assert!(Err(DecodeError::MalformedCalldata(_)) = decode_registration_batch(&input));
}

#[rstest]
#[case::padding(WORD)]
#[case::length_word(2 * WORD)]
#[case::into_head(3 * WORD)]
#[case::mid_word(3)]
fn deletion_truncated(#[case] by: usize) {
    let input = truncated(&delete_identities(&packed(16)), by);

    let_assert!(Err(DecodeError::MalformedCalldata(_)) = decode_deletion_batch(&input));
}

#[test]
fn truncation_wins_over_misalignment() {
    // 12 packed bytes would be misaligned, but they aren't all there
    let input = truncated(&delete_identities(&packed(12)), WORD);

    let_assert!(
        Err(DecodeError::MalformedCalldata(MalformedCalldata::OutOfBounds { .. })) =
            decode_deletion_batch(&input)
    );
}

#[test]
fn selector_mismatch_is_not_applicable() {
    let deletion = hex_input(&delete_identities(&packed(8)));
    check!(decode(TreeChangeKind::Insertion, &deletion) == Ok(None));

    let registration = hex_input(&register_identities(&commitments(1)));
    check!(decode(TreeChangeKind::Deletion, &registration) == Ok(None));

    check!(decode(TreeChangeKind::Insertion, &HexString::new("0x")) == Ok(None));
}

#[test]
fn dispatch_by_kind() {
    let registration = hex_input(&register_identities(&commitments(5)));
    let_assert!(Ok(Some(batch)) = decode(TreeChangeKind::Insertion, &registration));
    check!(batch.size() == 5);

    let deletion = hex_input(&delete_identities(&packed(24)));
    let_assert!(Ok(Some(batch)) = decode(TreeChangeKind::Deletion, &deletion));
    check!(batch.size() == 3);
}

#[test]
fn registration_two_commitments() {
    let aa = U256::from_big_endian(&[0xaa; WORD]);
    let bb = U256::from_big_endian(&[0xbb; WORD]);

    let mut input = vec![0x22, 0x17, 0xb2, 0x11];
    for _ in 0..8 {
        input.extend(word(U256::zero())); // insertionProof
    }
    input.extend(word(U256::one())); // preRoot
    input.extend(word(U256::zero())); // startIndex
    input.extend(word(U256::from(12 * WORD as u64))); // identityCommitments
    input.extend(word(U256::from(9))); // postRoot
    input.extend(word(U256::from(2)));
    input.extend([0xaa; WORD]);
    input.extend([0xbb; WORD]);

    let batch = decode_registration_batch(&hex_input(&input)).unwrap();
    check!(batch.count == 2);
    check!(batch.commitments == vec![aa, bb]);
}

#[test]
fn registration_follows_offset() {
    // an unused word between the head and the array
    let mut input = vec![0x22, 0x17, 0xb2, 0x11];
    for _ in 0..10 {
        input.extend(word(U256::zero()));
    }
    input.extend(word(U256::from(13 * WORD as u64)));
    input.extend(word(U256::zero()));
    input.extend(word(U256::from(0xdead)));
    input.extend(word(U256::one()));
    input.extend(word(U256::from(0xbeef)));

    let batch = decode_registration_batch(&hex_input(&input)).unwrap();
    check!(batch.commitments == vec![U256::from(0xbeef)]);
}

#[test]
fn registration_length_past_end() {
    let mut input = vec![0x22, 0x17, 0xb2, 0x11];
    for _ in 0..10 {
        input.extend(word(U256::zero()));
    }
    input.extend(word(U256::from(12 * WORD as u64)));
    input.extend(word(U256::zero()));
    input.extend(word(U256::MAX)); // length

    let_assert!(
        Err(DecodeError::MalformedCalldata(MalformedCalldata::Overflow(_))) =
            decode_registration_batch(&hex_input(&input))
    );
}

#[test]
fn head_only_calldata() {
    // the offset word itself is missing
    let mut input = vec![0xea, 0x10, 0xfb, 0xbe];
    for _ in 0..8 {
        input.extend(word(U256::zero()));
    }

    let_assert!(
        Err(DecodeError::MalformedCalldata(MalformedCalldata::OutOfBounds { offset, .. })) =
            decode_deletion_batch(&hex_input(&input))
    );
    check!(offset == 8 * WORD);
}

#[test]
fn upper_case_hex() {
    let input = HexString::new(
        hex_input(&delete_identities(&packed(8)))
            .to_string()
            .to_uppercase(),
    );
    let_assert!(Ok(Some(batch)) = decode(TreeChangeKind::Deletion, &input));
    check!(batch.size() == 1);
}
