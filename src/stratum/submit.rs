use {super::*, serde::ser::SerializeSeq};

/// The five-tuple `mining.submit`:
/// `[worker, job_id, extranonce2, ntime, nonce]`. The job id stays a raw
/// string because in pool mode it is the upstream pool's opaque handle;
/// solo mode parses it into a `JobId` when it checks for staleness.
#[derive(Debug, PartialEq, Clone)]
pub struct Submit {
    pub worker: String,
    pub job_id: String,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(5))?;
        seq.serialize_element(&self.worker)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (worker, job_id, extranonce2, ntime, nonce) =
            <(String, String, Extranonce, Ntime, Nonce)>::deserialize(deserializer)?;

        Ok(Submit {
            worker,
            job_id,
            extranonce2,
            ntime,
            nonce,
        })
    }
}
