use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

pub use ethereum_types::{H256, H512};

pub type BlockNumber = u32;
pub type Slot = u64;
pub type AbsoluteSlot = u64;
pub type UnixSeconds = u64;
pub type ShareType = i64;
pub type VoteWeight = u64;
pub type TransactionId = H256;

/// Index of a block in the ring of block summaries used for TaPoS.
pub type BlockSummaryIndex = u16;

#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Display,
    From,
    Into,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct AccountName(String);

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AccountName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Display,
    From,
    Into,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct TypeName(String);

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl TypeName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Block identifier.
///
/// The first 4 bytes of a block ID hold the block number in big-endian order.
/// The rest is taken from the digest of the block header.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Debug,
    Display,
    From,
    Into,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct BlockId(H256);

impl BlockId {
    #[must_use]
    pub fn new(digest: H256, block_number: BlockNumber) -> Self {
        let mut bytes = digest.to_fixed_bytes();
        bytes[..4].copy_from_slice(&block_number.to_be_bytes());
        Self(H256(bytes))
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(H256::zero())
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub const fn block_number(self) -> BlockNumber {
        let [b0, b1, b2, b3, ..] = self.0 .0;
        BlockNumber::from_be_bytes([b0, b1, b2, b3])
    }

    /// The part of the ID that transactions embed to prove they observed this block.
    #[must_use]
    pub const fn tapos_prefix(self) -> u32 {
        let bytes = self.0 .0;
        u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])
    }

    #[must_use]
    pub const fn as_h256(self) -> H256 {
        self.0
    }
}

#[must_use]
pub const fn block_summary_index(block_number: BlockNumber) -> BlockSummaryIndex {
    let [low, high, _, _] = block_number.to_le_bytes();
    BlockSummaryIndex::from_le_bytes([low, high])
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(0x0102_0304)]
    #[test_case(BlockNumber::MAX)]
    fn block_id_encodes_block_number(block_number: BlockNumber) {
        let block_id = BlockId::new(H256::repeat_byte(0xaa), block_number);

        assert_eq!(block_id.block_number(), block_number);
        assert_eq!(&block_id.as_h256()[4..], &H256::repeat_byte(0xaa)[4..]);
    }

    #[test]
    fn tapos_prefix_reads_bytes_8_to_12() {
        let mut bytes = [0; 32];
        bytes[8..12].copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(BlockId::from(H256(bytes)).tapos_prefix(), 0x0403_0201);
    }

    #[test_case(0 => 0)]
    #[test_case(0xffff => 0xffff)]
    #[test_case(0x1_0000 => 0)]
    #[test_case(0x1_2345 => 0x2345)]
    fn block_summary_index_wraps(block_number: BlockNumber) -> BlockSummaryIndex {
        block_summary_index(block_number)
    }

    #[test]
    fn account_name_serializes_as_plain_string() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&AccountName::from("alice"))?, r#""alice""#);
        Ok(())
    }
}
