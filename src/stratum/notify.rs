use {super::*, serde::ser::SerializeSeq};

/// The five-parameter ViaBTC-dialect `mining.notify` used in solo mode:
/// `[job_id, pow_hash, height, target, clean_jobs]`. Pool mode never builds
/// one of these; upstream notifies are relayed as raw params.
#[derive(Debug, PartialEq, Clone)]
pub struct Notify {
    pub job_id: JobId,
    pub pow_hash: String,
    pub height: u64,
    pub target: Target,
    pub clean_jobs: bool,
}

impl Serialize for Notify {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(5))?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.pow_hash)?;
        seq.serialize_element(&self.height)?;
        seq.serialize_element(&self.target)?;
        seq.serialize_element(&self.clean_jobs)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Notify {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (job_id, pow_hash, height, target, clean_jobs) =
            <(JobId, String, u64, Target, bool)>::deserialize(deserializer)?;

        Ok(Notify {
            job_id,
            pow_hash,
            height,
            target,
            clean_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let notify = Notify {
            job_id: JobId::from(0x1fu32),
            pow_hash: "44f4c69744d5f8c55d642062949dcae49bc4e7ef43d388c5a12f42b5633d163e".into(),
            height: 4_500_000,
            target: Target::from_difficulty(Difficulty::from(1.0)),
            clean_jobs: true,
        };

        let value = serde_json::to_value(&notify).unwrap();
        let params = value.as_array().unwrap();

        assert_eq!(params.len(), 5);
        assert_eq!(params[0], json!("1f"));
        assert_eq!(params[2], json!(4_500_000));
        assert_eq!(params[3].as_str().unwrap().len(), 64);
        assert_eq!(params[4], json!(true));
    }

    #[test]
    fn roundtrip() {
        let notify = Notify {
            job_id: JobId::from(7u32),
            pow_hash: "00".repeat(32),
            height: 1,
            target: Target::MAX,
            clean_jobs: false,
        };

        let back: Notify =
            serde_json::from_str(&serde_json::to_string(&notify).unwrap()).unwrap();
        assert_eq!(back, notify);
    }
}
