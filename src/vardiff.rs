use super::*;

/// Ratio clamp per retarget, so one noisy window can at most quarter or
/// quadruple a miner's difficulty.
const RATIO_FLOOR: f64 = 0.25;
const RATIO_CEIL: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
pub struct VardiffConfig {
    pub target_share_secs: f64,
    pub retarget_secs: f64,
    pub variance: f64,
    pub min_diff: f64,
    pub max_diff: f64,
    pub initial_diff: f64,
}

impl Default for VardiffConfig {
    fn default() -> Self {
        Self {
            target_share_secs: 30.0,
            retarget_secs: 60.0,
            variance: 0.30,
            min_diff: 0.001,
            max_diff: 1e9,
            initial_diff: 1.0,
        }
    }
}

/// Per-miner difficulty controller. Counts accepted shares over a sliding
/// window and, at most once per retarget interval, rescales difficulty
/// toward the configured share cadence.
#[derive(Debug, Clone)]
pub struct Vardiff {
    config: VardiffConfig,
    current: Difficulty,
    window_start: Instant,
    shares_in_window: u32,
    last_retarget: Instant,
}

impl Vardiff {
    pub fn new(config: VardiffConfig, now: Instant) -> Self {
        Self {
            current: Difficulty::from(config.initial_diff),
            config,
            window_start: now,
            shares_in_window: 0,
            last_retarget: now,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.current
    }

    pub fn record_accepted(&mut self) {
        self.shares_in_window = self.shares_in_window.saturating_add(1);
    }

    /// Evaluated on every submission. Returns the new difficulty when a
    /// retarget actually changes it.
    pub fn maybe_retarget(&mut self, now: Instant) -> Option<Difficulty> {
        if now.duration_since(self.last_retarget).as_secs_f64() < self.config.retarget_secs {
            return None;
        }

        let window_secs = now.duration_since(self.window_start).as_secs_f64();
        let actual = window_secs / self.shares_in_window.max(1) as f64;
        let target = self.config.target_share_secs;
        let ratio = (target / actual).clamp(RATIO_FLOOR, RATIO_CEIL);

        self.window_start = now;
        self.shares_in_window = 0;
        self.last_retarget = now;

        if (actual - target).abs() / target <= self.config.variance {
            return None;
        }

        let new_diff = Difficulty::from(
            (self.current.as_f64() * ratio).clamp(self.config.min_diff, self.config.max_diff),
        );

        if new_diff == self.current {
            return None;
        }

        debug!(
            "Vardiff retarget: {} -> {} (actual {actual:.1}s vs target {target:.1}s)",
            self.current, new_diff
        );

        self.current = new_diff;
        Some(new_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn vardiff_at(start: Instant) -> Vardiff {
        Vardiff::new(VardiffConfig::default(), start)
    }

    #[test]
    fn starts_at_initial_difficulty() {
        let vardiff = vardiff_at(Instant::now());
        assert_eq!(vardiff.difficulty(), Difficulty::from(1.0));
    }

    #[test]
    fn no_retarget_before_interval() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        for i in 0..10 {
            vardiff.record_accepted();
            assert!(
                vardiff.maybe_retarget(start + secs(i * 5)).is_none(),
                "retargeted {}s in, before the 60s interval",
                i * 5
            );
        }
    }

    #[test]
    fn on_pace_shares_keep_difficulty() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        // Four shares in 120s is exactly the 30s target cadence.
        for _ in 0..4 {
            vardiff.record_accepted();
        }
        assert_eq!(vardiff.maybe_retarget(start + secs(120)), None);
        assert_eq!(vardiff.difficulty(), Difficulty::from(1.0));
    }

    #[test]
    fn fast_shares_double_difficulty() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        // Eight shares in 120s: twice the target rate.
        for _ in 0..8 {
            vardiff.record_accepted();
        }

        let new_diff = vardiff.maybe_retarget(start + secs(120)).unwrap();
        let factor = new_diff.as_f64();
        assert!(
            (1.5..=2.0).contains(&factor),
            "expected roughly doubled difficulty, got {factor}"
        );
    }

    #[test]
    fn idle_miner_drops_difficulty() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        // One share in 10 minutes: far below the target cadence, ratio
        // clamps at 0.25.
        vardiff.record_accepted();
        let new_diff = vardiff.maybe_retarget(start + secs(600)).unwrap();
        assert_eq!(new_diff.as_f64(), 0.25);
    }

    #[test]
    fn ratio_clamped_to_quadruple() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        // Absurd burst: 1000 shares in 61s.
        for _ in 0..1000 {
            vardiff.record_accepted();
        }
        let new_diff = vardiff.maybe_retarget(start + secs(61)).unwrap();
        assert_eq!(new_diff.as_f64(), 4.0);
    }

    #[test]
    fn clamped_to_max_diff() {
        let start = Instant::now();
        let config = VardiffConfig {
            initial_diff: 1e9,
            ..VardiffConfig::default()
        };
        let mut vardiff = Vardiff::new(config, start);

        for _ in 0..1000 {
            vardiff.record_accepted();
        }
        assert_eq!(
            vardiff.maybe_retarget(start + secs(61)),
            None,
            "already at max, no change to announce"
        );
        assert_eq!(vardiff.difficulty().as_f64(), 1e9);
    }

    #[test]
    fn clamped_to_min_diff() {
        let start = Instant::now();
        let config = VardiffConfig {
            initial_diff: 0.001,
            ..VardiffConfig::default()
        };
        let mut vardiff = Vardiff::new(config, start);

        // No shares at all: ratio would shrink, min_diff holds.
        assert_eq!(vardiff.maybe_retarget(start + secs(600)), None);
        assert_eq!(vardiff.difficulty().as_f64(), 0.001);
    }

    #[test]
    fn window_resets_after_retarget() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        for _ in 0..8 {
            vardiff.record_accepted();
        }
        vardiff.maybe_retarget(start + secs(120)).unwrap();

        // Immediately after a retarget the window is empty and the clock
        // restarts; nothing fires until another interval passes.
        assert!(vardiff.maybe_retarget(start + secs(121)).is_none());

        for _ in 0..4 {
            vardiff.record_accepted();
        }
        assert_eq!(
            vardiff.maybe_retarget(start + secs(240)),
            None,
            "back on pace after the doubled difficulty"
        );
    }

    #[test]
    fn variance_band_suppresses_small_drift() {
        let start = Instant::now();
        let mut vardiff = vardiff_at(start);

        // Five shares in 120s is a 24s cadence: 20% off target, inside the
        // 30% band.
        for _ in 0..5 {
            vardiff.record_accepted();
        }
        assert_eq!(vardiff.maybe_retarget(start + secs(120)), None);
    }
}
