use super::*;

/// The ntime slot of the five-tuple submit. CKB headers carry millisecond
/// timestamps, so this is a u64 rather than Bitcoin's u32; miners echo back
/// whatever the job handed them and nothing here validates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Ntime(u64);

impl FromStr for Ntime {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ntime = u64::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid ntime hex string '{s}': {e}"),
        })?;
        Ok(Ntime(ntime))
    }
}

impl fmt::Display for Ntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<u64> for Ntime {
    fn from(ntime: u64) -> Ntime {
        Ntime(ntime)
    }
}

impl From<Ntime> for u64 {
    fn from(ntime: Ntime) -> u64 {
        ntime.0
    }
}
