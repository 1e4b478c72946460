use {super::*, snafu::ResultExt};

/// Server-assigned byte prefix partitioning nonce space among miners.
/// Travels as a hex string; may legitimately be empty (some pools hand out
/// no extranonce1 at all).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Extranonce(Vec<u8>);

impl Extranonce {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn from_hex(s: &str) -> Result<Self, InternalError> {
        Ok(Self(ResultExt::context(hex::decode(s), HexParseSnafu)?))
    }

    /// This extranonce extended with one suffix byte: the per-miner
    /// extranonce1 handed out at subscribe time.
    pub fn with_suffix(&self, suffix: u8) -> Self {
        let mut bytes = self.0.clone();
        bytes.push(suffix);
        Self(bytes)
    }

    /// One prefix byte followed by this extranonce: the rewritten
    /// extranonce2 forwarded upstream for a miner's share.
    pub fn with_prefix(&self, prefix: u8) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.push(prefix);
        bytes.extend_from_slice(&self.0);
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Serialize for Extranonce {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Extranonce {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        Self::from_hex(&s).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl fmt::Display for Extranonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Extranonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let enonce: Extranonce = serde_json::from_str(r#""abcd""#).unwrap();
        assert_eq!(enonce.len(), 2);
        assert_eq!(serde_json::to_string(&enonce).unwrap(), r#""abcd""#);
    }

    #[test]
    fn empty_is_valid() {
        let enonce = Extranonce::from_hex("").unwrap();
        assert!(enonce.is_empty());
        assert_eq!(enonce.to_hex(), "");
    }

    #[test]
    fn rejects_odd_length_hex() {
        assert!("abc".parse::<Extranonce>().is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!("zz".parse::<Extranonce>().is_err());
    }

    #[test]
    fn suffix_appends_id_byte() {
        let pool = Extranonce::from_hex("08000002").unwrap();
        assert_eq!(pool.with_suffix(0x2a).to_hex(), "080000022a");
        assert_eq!(Extranonce::default().with_suffix(0xff).to_hex(), "ff");
    }

    #[test]
    fn prefix_prepends_id_byte() {
        let enonce2 = Extranonce::from_hex("aa").unwrap();
        assert_eq!(enonce2.with_prefix(0x07).to_hex(), "07aa");
    }

    #[test]
    fn distinct_suffixes_never_collide() {
        let pool = Extranonce::from_hex("0800").unwrap();
        for i in 0u8..=254 {
            let a = pool.with_suffix(i);
            let b = pool.with_suffix(i + 1);
            assert_ne!(a, b);
            assert_eq!(a.as_bytes()[..2], b.as_bytes()[..2]);
        }
    }
}
