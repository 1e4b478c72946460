use super::*;

/// Wrapping u32 job counter, hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
#[repr(transparent)]
pub struct JobId(u32);

impl JobId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl FromStr for JobId {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = u32::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid job id hex string '{s}': {e}"),
        })?;
        Ok(JobId(id))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u32> for JobId {
    fn from(id: u32) -> JobId {
        JobId(id)
    }
}

impl From<JobId> for u32 {
    fn from(id: JobId) -> u32 {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(JobId::from(0).to_string(), "0");
        assert_eq!(JobId::from(0x1f).to_string(), "1f");
        assert_eq!("1F".parse::<JobId>().unwrap(), JobId::from(0x1f));
        assert_eq!(
            "ffffffff".parse::<JobId>().unwrap(),
            JobId::from(u32::MAX)
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<JobId>().is_err());
        assert!("0x1".parse::<JobId>().is_err());
        assert!("g".parse::<JobId>().is_err());
        assert!("100000000".parse::<JobId>().is_err());
    }

    #[test]
    fn wraps() {
        assert_eq!(JobId::new(u32::MAX).next(), JobId::new(0));
        assert_eq!(JobId::new(41).next(), JobId::new(42));
    }

    #[test]
    fn serde_as_hex_string() {
        let id = JobId::from(0xbeefu32);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"beef\"");
        assert_eq!(serde_json::from_str::<JobId>("\"beef\"").unwrap(), id);
    }
}
