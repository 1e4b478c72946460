use {super::*, primitive_types::U256};

/// Mining difficulty as the Stratum wire understands it: a positive real
/// scaling factor over the diff-1 baseline target of 2^224. Difficulty and
/// target are two views of the same thing, with difficulty the human-facing
/// one; conversions are lossy in the last float bits, which is fine for
/// share pacing but is why consensus comparisons always go through `Target`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Difficulty(f64);

impl Difficulty {
    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn to_target(self) -> Target {
        Target::from_difficulty(self)
    }

    pub fn clamp(self, min: Difficulty, max: Difficulty) -> Difficulty {
        Difficulty(self.0.clamp(min.0, max.0))
    }
}

impl From<f64> for Difficulty {
    fn from(difficulty: f64) -> Self {
        assert!(
            difficulty.is_finite() && difficulty > 0.0,
            "difficulty must be finite and > 0"
        );
        Difficulty(difficulty)
    }
}

impl From<u64> for Difficulty {
    fn from(difficulty: u64) -> Self {
        Difficulty::from(difficulty as f64)
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        // Integral difficulties go out as JSON integers, the form every
        // Stratum implementation accepts; fractional ones as floats.
        if self.0.fract() == 0.0 && self.0 <= u64::MAX as f64 {
            ser.serialize_u64(self.0 as u64)
        } else {
            ser.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let difficulty = f64::deserialize(de)?;
        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(de::Error::custom("difficulty must be finite and > 0"));
        }
        Ok(Difficulty(difficulty))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 && self.0 <= u64::MAX as f64 {
            write!(f, "{}", self.0 as u64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let difficulty = s.trim().parse::<f64>()?;
        ensure!(
            difficulty.is_finite() && difficulty > 0.0,
            "difficulty must be finite and > 0, got `{s}`"
        );
        Ok(Difficulty(difficulty))
    }
}

/// A 256-bit share or network target in little-endian byte order: byte 0 is
/// the least significant. This is the order CKB targets travel in over the
/// five-parameter Stratum dialect, and the order Eaglesong digests are
/// compared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct Target([u8; 32]);

/// Difficulty-1 baseline, 2^224.
const DIFF_1_TARGET: U256 = U256([0, 0, 0, 1u64 << 32]);

/// Fixed-point scale applied to difficulty before the integer division, so
/// fractional difficulties down to 1e-6 survive the conversion.
const DIFFICULTY_SCALE: u64 = 1_000_000;

impl Target {
    pub const MAX: Target = Target([0xff; 32]);

    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Target(bytes)
    }

    pub fn as_le_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn from_u256(value: U256) -> Self {
        Target(value.to_little_endian())
    }

    fn to_u256(self) -> U256 {
        U256::from_little_endian(&self.0)
    }

    /// Decodes the 32-bit compact form: exponent in the high byte, 24-bit
    /// mantissa below, value = mantissa * 256^(exponent - 3). Overflow
    /// clamps to 2^256 - 1.
    pub fn from_compact(compact: u32) -> Self {
        let exponent = compact >> 24;
        let mantissa = compact & 0x00ff_ffff;

        if mantissa == 0 {
            return Target([0u8; 32]);
        }

        if exponent <= 3 {
            return Target::from_u256(U256::from(mantissa >> (8 * (3 - exponent))));
        }

        let shift = 8 * (exponent - 3);
        let mantissa_bits = 32 - mantissa.leading_zeros();
        if mantissa_bits + shift > 256 {
            return Target::MAX;
        }

        Target::from_u256(U256::from(mantissa) << shift)
    }

    /// T1 / difficulty in fixed point, clamped to 2^256 - 1 when the
    /// difficulty is too small to represent.
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        let scaled = (difficulty.as_f64() * DIFFICULTY_SCALE as f64).round();
        if scaled < 1.0 {
            return Target::MAX;
        }
        if scaled >= u128::MAX as f64 {
            return Target([0u8; 32]);
        }

        let numerator = DIFF_1_TARGET * U256::from(DIFFICULTY_SCALE);
        Target::from_u256(numerator / U256::from(scaled as u128))
    }

    /// A hash meets the target iff, read as little-endian 256-bit integers,
    /// hash <= target.
    pub fn is_met_by(&self, hash: &[u8; 32]) -> bool {
        for i in (0..32).rev() {
            if hash[i] < self.0[i] {
                return true;
            }
            if hash[i] > self.0[i] {
                return false;
            }
        }
        true
    }

    /// Approximate difficulty this target corresponds to, for display only.
    pub fn difficulty(&self) -> f64 {
        let value = self.to_u256();
        if value.is_zero() {
            return f64::INFINITY;
        }

        let mut target = 0.0f64;
        for (i, limb) in value.0.iter().enumerate() {
            target += *limb as f64 * 2f64.powi(64 * i as i32);
        }
        2f64.powi(224) / target
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        ensure!(
            bytes.len() == 32,
            "target must be 64 hex characters, got {}",
            s.len()
        );
        Ok(Target(bytes.try_into().expect("length checked")))
    }
}
