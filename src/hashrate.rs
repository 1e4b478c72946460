use super::*;

/// Hashes behind one difficulty-1 share, the 2^32 the whole ecosystem
/// settles on even though the exact figure is 2^256 / T1.
const HASHES_PER_DIFF_1: f64 = 4_294_967_296.0;

const SI_PREFIXES: [(f64, &str); 6] = [
    (1e18, "E"),
    (1e15, "P"),
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "M"),
    (1e3, "K"),
];

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct HashRate(pub f64);

impl HashRate {
    pub const ZERO: Self = Self(0.0);

    /// Accepted-share estimate: shares * difficulty * 2^32 / elapsed.
    pub fn estimate(shares: u64, difficulty: f64, elapsed: Duration) -> Self {
        if elapsed.is_zero() {
            return Self::ZERO;
        }
        Self(shares as f64 * difficulty * HASHES_PER_DIFF_1 / elapsed.as_secs_f64())
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (scale, prefix) in SI_PREFIXES {
            if self.0 >= scale {
                let scaled = self.0 / scale;
                return if scaled >= 100.0 {
                    write!(f, "{scaled:.0} {prefix}H/s")
                } else {
                    write!(f, "{} {prefix}H/s", trim_zeros(scaled))
                };
            }
        }
        write!(f, "{:.0} H/s", self.0)
    }
}

fn trim_zeros(value: f64) -> String {
    let s = format!("{value:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
