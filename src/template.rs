use super::*;

/// `0x`-prefixed hex scalars, the encoding every CKB RPC number travels in.
macro_rules! hex_scalar {
    ($name:ident, $inner:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr,
        )]
        pub struct $name(pub $inner);

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .ok_or_else(|| anyhow!("expected 0x-prefixed hex, got `{s}`"))?;
                Ok(Self(<$inner>::from_str_radix(digits, 16)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:x}", self.0)
            }
        }
    };
}

hex_scalar!(HexU32, u32);
hex_scalar!(HexU64, u64);

/// A 32-byte RPC digest, `0x` plus 64 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr)]
pub struct H256(pub [u8; 32]);

impl FromStr for H256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| anyhow!("expected 0x-prefixed hash, got `{s}`"))?;
        let bytes = hex::decode(digits)?;
        ensure!(bytes.len() == 32, "hash must be 32 bytes, got {}", bytes.len());
        Ok(H256(bytes.try_into().expect("length checked")))
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A `get_block_template` result. Header fields are typed; everything the
/// proxy only has to copy back into `submit_block` stays raw JSON so node
/// versions can add fields without breaking us.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockTemplate {
    pub work_id: HexU64,
    pub version: HexU32,
    pub compact_target: HexU32,
    pub current_time: HexU64,
    pub number: HexU64,
    pub epoch: HexU64,
    pub parent_hash: H256,
    #[serde(default)]
    pub transactions_root: H256,
    #[serde(default)]
    pub proposals_hash: H256,
    #[serde(default, alias = "uncles_hash")]
    pub extra_hash: H256,
    pub dao: H256,
    #[serde(default)]
    pub cellbase: Option<Value>,
    #[serde(default)]
    pub uncles: Vec<Value>,
    #[serde(default)]
    pub transactions: Vec<Value>,
    #[serde(default)]
    pub proposals: Vec<Value>,
}

impl BlockTemplate {
    pub fn raw_header(&self) -> RawHeader {
        RawHeader {
            version: self.version.0,
            compact_target: self.compact_target.0,
            timestamp: self.current_time.0,
            number: self.number.0,
            epoch: self.epoch.0,
            parent_hash: self.parent_hash.0,
            transactions_root: self.transactions_root.0,
            proposals_hash: self.proposals_hash.0,
            extra_hash: self.extra_hash.0,
            dao: self.dao.0,
        }
    }

    pub fn height(&self) -> u64 {
        self.number.0
    }

    /// The block body for `submit_block`: the template's header fields plus
    /// the found nonce, with uncles, transactions and proposals copied over.
    pub fn assemble_block(&self, nonce: Nonce) -> Value {
        let header = json!({
            "version": self.version,
            "compact_target": self.compact_target,
            "timestamp": self.current_time,
            "number": self.number,
            "epoch": self.epoch,
            "parent_hash": self.parent_hash,
            "transactions_root": self.transactions_root,
            "proposals_hash": self.proposals_hash,
            "extra_hash": self.extra_hash,
            "dao": self.dao,
            "nonce": format!("0x{:032x}", u128::from(nonce)),
        });

        let transactions: Vec<Value> = self
            .cellbase
            .iter()
            .chain(self.transactions.iter())
            .map(unwrap_template_entry)
            .collect();

        let uncles: Vec<Value> = self.uncles.iter().map(unwrap_uncle_entry).collect();

        json!({
            "header": header,
            "uncles": uncles,
            "transactions": transactions,
            "proposals": self.proposals,
        })
    }
}

/// Template transaction entries wrap the actual transaction in a `data`
/// field alongside hash and cycle metadata; blocks want the bare
/// transaction.
fn unwrap_template_entry(entry: &Value) -> Value {
    match entry.get("data") {
        Some(data) => data.clone(),
        None => entry.clone(),
    }
}

/// Uncle templates carry `{hash, required, header, proposals}`; blocks want
/// `{header, proposals}`.
fn unwrap_uncle_entry(entry: &Value) -> Value {
    match entry.get("header") {
        Some(header) => json!({
            "header": header,
            "proposals": entry.get("proposals").cloned().unwrap_or_else(|| json!([])),
        }),
        None => entry.clone(),
    }
}
