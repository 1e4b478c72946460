use {super::*, serde::ser::SerializeSeq};

/// `mining.set_difficulty` params: one positive number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetDifficulty(pub Difficulty);

impl SetDifficulty {
    pub fn difficulty(self) -> Difficulty {
        self.0
    }
}

impl Serialize for SetDifficulty {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(&self.0)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SetDifficulty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (difficulty,): (Difficulty,) = Deserialize::deserialize(deserializer)?;
        Ok(SetDifficulty(difficulty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let parsed: SetDifficulty = serde_json::from_str("[9999]").unwrap();
        assert_eq!(parsed.difficulty(), Difficulty::from(9999u64));
        assert_eq!(serde_json::to_value(parsed).unwrap(), json!([9999]));
    }

    #[test]
    fn fractional_difficulty() {
        let parsed: SetDifficulty = serde_json::from_str("[0.5]").unwrap();
        assert_eq!(parsed.difficulty(), Difficulty::from(0.5));
    }

    #[test]
    fn rejects_bad_arity() {
        assert!(serde_json::from_str::<SetDifficulty>("[]").is_err());
        assert!(serde_json::from_str::<SetDifficulty>("[1,2]").is_err());
    }
}
