use {super::*, serde::ser::SerializeSeq};

/// `mining.set_target` params: one 64-character little-endian target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTarget(pub Target);

impl Serialize for SetTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(1))?;
        seq.serialize_element(&self.0)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SetTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (target,): (Target,) = Deserialize::deserialize(deserializer)?;
        Ok(SetTarget(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let set_target = SetTarget(Target::from_difficulty(Difficulty::from(2.0)));
        let value = serde_json::to_value(set_target).unwrap();

        let params = value.as_array().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].as_str().unwrap().len(), 64);

        let back: SetTarget = serde_json::from_value(value).unwrap();
        assert_eq!(back, set_target);
    }

    #[test]
    fn rejects_bad_arity() {
        assert!(serde_json::from_str::<SetTarget>("[]").is_err());
    }
}
