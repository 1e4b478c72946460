use super::*;

/// Packed size of a raw header: five scalar fields and five 32-byte digests.
pub const RAW_HEADER_SIZE: usize = 192;

/// The consensus fields of a CKB block header, minus the nonce. The pow-hash
/// miners grind on is the ckb-blake2b of this packed record, so the nonce
/// must never be part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawHeader {
    pub version: u32,
    pub compact_target: u32,
    pub timestamp: u64,
    pub number: u64,
    pub epoch: u64,
    pub parent_hash: [u8; 32],
    pub transactions_root: [u8; 32],
    pub proposals_hash: [u8; 32],
    pub extra_hash: [u8; 32],
    pub dao: [u8; 32],
}

impl RawHeader {
    /// Fixed-offset little-endian packing: scalars first, digests after.
    pub fn to_bytes(&self) -> [u8; RAW_HEADER_SIZE] {
        let mut bytes = [0u8; RAW_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.compact_target.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.number.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.epoch.to_le_bytes());
        bytes[32..64].copy_from_slice(&self.parent_hash);
        bytes[64..96].copy_from_slice(&self.transactions_root);
        bytes[96..128].copy_from_slice(&self.proposals_hash);
        bytes[128..160].copy_from_slice(&self.extra_hash);
        bytes[160..192].copy_from_slice(&self.dao);
        bytes
    }

    pub fn pow_hash(&self) -> [u8; 32] {
        blake2b::ckb_blake2b(&self.to_bytes())
    }
}

/// The packed epoch field: number in the low 24 bits, block index in the
/// next 16, epoch length in the 16 above that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub number: u64,
    pub index: u64,
    pub length: u64,
}

impl From<u64> for Epoch {
    fn from(raw: u64) -> Self {
        Epoch {
            number: raw & 0x00ff_ffff,
            index: (raw >> 24) & 0xffff,
            length: (raw >> 40) & 0xffff,
        }
    }
}

impl From<Epoch> for u64 {
    fn from(epoch: Epoch) -> u64 {
        (epoch.length << 40) | (epoch.index << 24) | epoch.number
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}/{})", self.number, self.index, self.length)
    }
}
