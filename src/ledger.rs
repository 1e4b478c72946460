use {super::*, dashmap::DashMap, parking_lot::Mutex};

/// Scale for storing a fractional difficulty in an atomic.
const DIFFICULTY_SCALE: f64 = 1_000_000.0;

/// Process-wide counters plus the registry of live miners. Everything here
/// is read-only from the stats surface; writers are the connection tasks
/// and the work drivers. Nothing survives a restart.
pub(crate) struct Ledger {
    started: Instant,
    next_miner_id: AtomicU32,
    blocks: AtomicU64,
    shares: AtomicU64,
    miners: DashMap<u32, Arc<MinerEntry>>,
}

pub(crate) struct MinerEntry {
    pub(crate) id: u32,
    pub(crate) peer: SocketAddr,
    worker: Mutex<Option<String>>,
    connected_at: Instant,
    submitted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    local_only: AtomicU64,
    stale_acks: AtomicU64,
    difficulty_scaled: AtomicU64,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            next_miner_id: AtomicU32::new(0),
            blocks: AtomicU64::new(0),
            shares: AtomicU64::new(0),
            miners: DashMap::new(),
        }
    }

    /// Allocates the next miner id and registers its entry. Ids are
    /// process-monotone; the low byte doubles as the extranonce suffix, so
    /// the session layer refuses connections past 256 live miners.
    pub(crate) fn register(&self, peer: SocketAddr, initial_diff: f64) -> Arc<MinerEntry> {
        let id = self.next_miner_id.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::new(MinerEntry {
            id,
            peer,
            worker: Mutex::new(None),
            connected_at: Instant::now(),
            submitted: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            local_only: AtomicU64::new(0),
            stale_acks: AtomicU64::new(0),
            difficulty_scaled: AtomicU64::new((initial_diff * DIFFICULTY_SCALE) as u64),
        });

        self.miners.insert(id, entry.clone());
        entry
    }

    pub(crate) fn unregister(&self, id: u32) {
        self.miners.remove(&id);
    }

    pub(crate) fn live_miners(&self) -> usize {
        self.miners.len()
    }

    pub(crate) fn add_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_share(&self) {
        self.shares.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn total_blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub(crate) fn total_shares(&self) -> u64 {
        self.shares.load(Ordering::Relaxed)
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn miner_snapshots(&self) -> Vec<MinerSnapshot> {
        let mut miners: Vec<MinerSnapshot> = self
            .miners
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        miners.sort_by_key(|miner| miner.id);
        miners
    }

    pub(crate) fn total_hashrate(&self) -> HashRate {
        self.miner_snapshots()
            .iter()
            .fold(HashRate::ZERO, |total, miner| {
                HashRate(total.0 + miner.hashrate.0)
            })
    }

    pub(crate) fn status_line(&self) -> String {
        format!(
            "hashrate={}  miners={}  shares={}  blocks={}  uptime={}s",
            self.total_hashrate(),
            self.live_miners(),
            self.total_shares(),
            self.total_blocks(),
            self.uptime().as_secs(),
        )
    }
}

impl MinerEntry {
    pub(crate) fn suffix(&self) -> u8 {
        (self.id & 0xff) as u8
    }

    pub(crate) fn set_worker(&self, worker: &str) {
        *self.worker.lock() = Some(worker.to_string());
    }

    pub(crate) fn set_difficulty(&self, difficulty: f64) {
        self.difficulty_scaled
            .store((difficulty * DIFFICULTY_SCALE) as u64, Ordering::Relaxed);
    }

    pub(crate) fn difficulty(&self) -> f64 {
        self.difficulty_scaled.load(Ordering::Relaxed) as f64 / DIFFICULTY_SCALE
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_local_only(&self) {
        self.local_only.fetch_add(1, Ordering::Relaxed);
    }

    /// Stale shares are ACKed as accepted to keep replaying miners calm;
    /// the separate counter keeps the books honest.
    pub(crate) fn record_stale_ack(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.stale_acks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> MinerSnapshot {
        let difficulty = self.difficulty();
        let uptime = self.connected_at.elapsed();
        let accepted = self.accepted.load(Ordering::Relaxed);

        MinerSnapshot {
            id: self.id,
            peer: self.peer.to_string(),
            worker: self.worker.lock().clone(),
            difficulty,
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted,
            rejected: self.rejected.load(Ordering::Relaxed),
            local_only: self.local_only.load(Ordering::Relaxed),
            stale_acks: self.stale_acks.load(Ordering::Relaxed),
            connected_secs: uptime.as_secs(),
            hashrate: HashRate::estimate(accepted, difficulty, uptime),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MinerSnapshot {
    pub(crate) id: u32,
    pub(crate) peer: String,
    pub(crate) worker: Option<String>,
    pub(crate) difficulty: f64,
    pub(crate) submitted: u64,
    pub(crate) accepted: u64,
    pub(crate) rejected: u64,
    pub(crate) local_only: u64,
    pub(crate) stale_acks: u64,
    pub(crate) connected_secs: u64,
    pub(crate) hashrate: HashRate,
}
