//! Word-level access to ABI-encoded calldata.
//!
//! Every read is bounds checked, and offsets and lengths read out of the
//! calldata are checked before they are used, so hostile input produces a
//! [`MalformedCalldata`] rather than a panic or a huge allocation.

use ethereum_types::U256;
use tree_indexer_common::{SELECTOR_BYTES, WORD_BYTES};

use crate::{HexString, MalformedCalldata};

/// Calldata with its selector stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calldata {
    body: Vec<u8>,
}

impl Calldata {
    /// Decode `input`, and strip `selector` from the front of it.
    pub fn parse(
        input: &HexString,
        selector: [u8; SELECTOR_BYTES],
    ) -> Result<Self, MalformedCalldata> {
        let bytes = input.to_bytes()?;
        let Some(body) = bytes.strip_prefix(&selector[..]) else {
            return Err(MalformedCalldata::UnexpectedSelector {
                expected: selector,
                found: bytes.iter().copied().take(SELECTOR_BYTES).collect(),
            });
        };
        if body.len() % WORD_BYTES != 0 {
            return Err(MalformedCalldata::Unaligned { len: body.len() });
        }
        Ok(Self {
            body: body.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// `len` bytes starting at byte `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8], MalformedCalldata> {
        offset
            .checked_add(len)
            .and_then(|end| self.body.get(offset..end))
            .ok_or(MalformedCalldata::OutOfBounds {
                offset,
                len,
                available: self.len(),
            })
    }

    /// The big-endian word starting at byte `offset`.
    ///
    /// `offset` need not be word aligned.
    pub fn word_at(&self, offset: usize) -> Result<U256, MalformedCalldata> {
        self.slice(offset, WORD_BYTES).map(U256::from_big_endian)
    }

    /// The word at byte `offset`, as an offset or a length.
    pub fn usize_at(&self, offset: usize) -> Result<usize, MalformedCalldata> {
        let word = self.word_at(offset)?;
        if word.bits() > usize::BITS as usize {
            return Err(MalformedCalldata::Overflow(word));
        }
        Ok(word.low_u64() as usize)
    }

    /// Follow the offset held in head slot `slot`.
    pub fn offset(&self, slot: usize) -> Result<usize, MalformedCalldata> {
        self.usize_at(slot * WORD_BYTES)
    }

    /// `count` consecutive words starting at byte `offset`.
    ///
    /// The whole run is bounds checked up front.
    pub fn words_from(
        &self,
        offset: usize,
        count: usize,
    ) -> Result<impl Iterator<Item = U256> + '_, MalformedCalldata> {
        let len = count
            .checked_mul(WORD_BYTES)
            .ok_or(MalformedCalldata::OutOfBounds {
                offset,
                len: usize::MAX,
                available: self.len(),
            })?;
        Ok(self
            .slice(offset, len)?
            .chunks_exact(WORD_BYTES)
            .map(U256::from_big_endian))
    }

    /// The dynamic `bytes` whose length word is at byte `offset`.
    ///
    /// The content is followed by zero padding up to a word boundary, which
    /// must also be present.
    pub fn bytes_at(&self, offset: usize) -> Result<&[u8], MalformedCalldata> {
        let len = self.usize_at(offset)?;
        let start = offset.saturating_add(WORD_BYTES);
        let padded = len
            .checked_next_multiple_of(WORD_BYTES)
            .ok_or(MalformedCalldata::OutOfBounds {
                offset: start,
                len,
                available: self.len(),
            })?;
        let content = self.slice(start, padded)?;
        Ok(&content[..len])
    }
}

#[cfg(test)]
fn word(value: u64) -> [u8; WORD_BYTES] {
    let mut out = [0; WORD_BYTES];
    U256::from(value).to_big_endian(&mut out);
    out
}

#[cfg(test)]
#[track_caller]
fn calldata(words: &[[u8; WORD_BYTES]]) -> Calldata {
    let selector = [0xde, 0xad, 0xbe, 0xef];
    let input = HexString::new(format!("{}{}", hex::encode(selector), hex::encode(words.concat())));
    Calldata::parse(&input, selector).unwrap()
}

#[test]
fn parse_strips_selector() {
    let it = calldata(&[word(1), word(2)]);
    assert_eq!(it.len(), 64);
    assert_eq!(it.word_at(0), Ok(U256::from(1)));
    assert_eq!(it.word_at(32), Ok(U256::from(2)));
}

#[test]
fn parse_rejects_unaligned_body() {
    let input = HexString::new(format!("deadbeef{}", "00".repeat(33)));
    assert_eq!(
        Calldata::parse(&input, [0xde, 0xad, 0xbe, 0xef]),
        Err(MalformedCalldata::Unaligned { len: 33 })
    );
}

#[test]
fn parse_rejects_odd_digits() {
    let input = HexString::new("deadbeef0");
    assert!(matches!(
        Calldata::parse(&input, [0xde, 0xad, 0xbe, 0xef]),
        Err(MalformedCalldata::InvalidHex(_))
    ));
}

#[test]
fn parse_reports_found_selector() {
    let input = HexString::new("0xcafe");
    assert_eq!(
        Calldata::parse(&input, [0xde, 0xad, 0xbe, 0xef]),
        Err(MalformedCalldata::UnexpectedSelector {
            expected: [0xde, 0xad, 0xbe, 0xef],
            found: vec![0xca, 0xfe],
        })
    );
}

#[test]
fn unaligned_word_read() {
    let mut high = [0; WORD_BYTES];
    high[0] = 0x01;
    let it = calldata(&[word(0), high]);
    assert_eq!(it.word_at(1), Ok(U256::from(1)));
    assert_eq!(
        it.word_at(33),
        Err(MalformedCalldata::OutOfBounds {
            offset: 33,
            len: 32,
            available: 64
        })
    );
}

#[test]
fn oversized_offset_overflows() {
    let it = calldata(&[[0xff; WORD_BYTES]]);
    assert_eq!(
        it.usize_at(0),
        Err(MalformedCalldata::Overflow(U256::MAX))
    );
}

#[test]
fn huge_count_does_not_allocate() {
    let it = calldata(&[word(0)]);
    assert!(matches!(
        it.words_from(0, usize::MAX / 2),
        Err(MalformedCalldata::OutOfBounds { .. })
    ));
}

#[test]
fn bytes_require_padding() {
    let mut content = [0; WORD_BYTES];
    content[..3].copy_from_slice(&[1, 2, 3]);
    let it = calldata(&[word(3), content]);
    assert_eq!(it.bytes_at(0), Ok(&[1u8, 2, 3][..]));

    let truncated = calldata(&[word(33), content]);
    assert!(matches!(
        truncated.bytes_at(0),
        Err(MalformedCalldata::OutOfBounds { .. })
    ));
}

#[test]
fn empty_bytes() {
    let it = calldata(&[word(0)]);
    assert_eq!(it.bytes_at(0), Ok(&[][..]));
}
