use super::*;

/// CKB's 128-bit header nonce. Canonical wire form is 32 hex characters,
/// zero-padded on the left; parsing tolerates the shorter strings some
/// firmware sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Nonce(u128);

impl Nonce {
    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl FromStr for Nonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 32 {
            return Err(InternalError::InvalidLength {
                expected: 32,
                actual: s.len(),
            });
        }
        let nonce = u128::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid nonce hex string '{s}': {e}"),
        })?;
        Ok(Nonce(nonce))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for Nonce {
    fn from(nonce: u128) -> Nonce {
        Nonce(nonce)
    }
}

impl From<Nonce> for u128 {
    fn from(nonce: Nonce) -> u128 {
        nonce.0
    }
}
