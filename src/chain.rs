use {super::*, parking_lot::Mutex};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);
const STALE_TEMPLATE_AFTER: Duration = Duration::from_secs(300);

/// After the first failure flips the node unhealthy, only every Nth failure
/// makes it into the log.
const FAILURE_LOG_EVERY: u64 = 30;

/// Solo-mode work source: polls the node for block templates, fans fresh
/// jobs out over a watch channel, and submits solved blocks back.
pub(crate) struct Chain {
    node: NodeClient,
    ledger: Arc<Ledger>,
    jobs: watch::Sender<Option<Arc<Job>>>,
    state: Mutex<PollState>,
    started: Instant,
    healthy: AtomicBool,
    fail_count: AtomicU64,
    last_fetch: Mutex<Option<Instant>>,
}

struct PollState {
    template: Option<Arc<BlockTemplate>>,
    next_job_id: JobId,
}

impl Chain {
    pub(crate) fn new(settings: &Settings, ledger: Arc<Ledger>) -> Result<Arc<Self>> {
        let node = NodeClient::new(settings.node_host(), settings.node_port())?;
        let (jobs, _) = watch::channel(None);

        Ok(Arc::new(Self {
            node,
            ledger,
            jobs,
            state: Mutex::new(PollState {
                template: None,
                next_job_id: JobId::new(0),
            }),
            started: Instant::now(),
            healthy: AtomicBool::new(true),
            fail_count: AtomicU64::new(0),
            last_fetch: Mutex::new(None),
        }))
    }

    pub(crate) fn watch_jobs(&self) -> watch::Receiver<Option<Arc<Job>>> {
        self.jobs.subscribe()
    }

    pub(crate) fn current_job(&self) -> Option<Arc<Job>> {
        self.jobs.borrow().clone()
    }

    pub(crate) fn has_template(&self) -> bool {
        self.current_job().is_some()
    }

    pub(crate) fn node_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub(crate) fn node_url(&self) -> &str {
        self.node.url()
    }

    pub(crate) fn spawn(self: &Arc<Self>, cancel: CancellationToken) {
        let chain = self.clone();
        let poll_cancel = cancel.clone();
        tokio::spawn(async move {
            info!("Polling {} for block templates", chain.node.url());

            let mut ticker = interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = poll_cancel.cancelled() => break,
                    _ = ticker.tick() => chain.poll_once().await,
                }
            }

            info!("Shutting down template poller");
        });

        let chain = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(WATCHDOG_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => chain.check_staleness(),
                }
            }
        });
    }

    async fn poll_once(&self) {
        match self.node.get_block_template().await {
            Ok(template) => {
                self.record_success();
                self.apply_template(template);
            }
            Err(err) => self.record_failure(err),
        }
    }

    pub(crate) fn apply_template(&self, template: BlockTemplate) {
        let mut state = self.state.lock();

        let (parent_changed, is_new) = match &state.template {
            Some(current) => (
                current.parent_hash != template.parent_hash,
                current.work_id != template.work_id || current.parent_hash != template.parent_hash,
            ),
            None => (true, true),
        };

        let template = Arc::new(template);

        if !is_new {
            // Same work: only the node's clock moved. Remember it so a
            // submitted block carries the freshest timestamp, but do not
            // disturb the miners.
            state.template = Some(template);
            return;
        }

        let job_id = state.next_job_id;
        state.next_job_id = state.next_job_id.next();
        state.template = Some(template.clone());
        drop(state);

        let job = Arc::new(Job::new(job_id, template, parent_changed));

        info!(
            "New job {} at height {} (clean={})",
            job.job_id, job.height, job.clean
        );

        self.jobs.send_replace(Some(job));
    }

    fn record_success(&self) {
        *self.last_fetch.lock() = Some(Instant::now());

        if !self.healthy.swap(true, Ordering::Relaxed) {
            let failures = self.fail_count.swap(0, Ordering::Relaxed);
            info!("Node recovered after {failures} failed polls");
        }
    }

    fn record_failure(&self, err: Error) {
        let failures = self.fail_count.fetch_add(1, Ordering::Relaxed) + 1;

        if self.healthy.swap(false, Ordering::Relaxed) {
            error!("Node poll failed, marking unhealthy: {err:#}");
        } else if failures % FAILURE_LOG_EVERY == 0 {
            warn!("Node still unreachable after {failures} polls: {err:#}");
        }
    }

    fn check_staleness(&self) {
        let last_fetch = *self.last_fetch.lock();

        // A node that has never answered counts from process start.
        let reference = last_fetch.unwrap_or(self.started);
        if reference.elapsed() > STALE_TEMPLATE_AFTER {
            warn!(
                "No block template fetched for over {}s; miners are working stale jobs",
                STALE_TEMPLATE_AFTER.as_secs()
            );
        }
    }

    /// Submits a solved block. The freshest template for the job's work is
    /// preferred so the header carries the node's latest timestamp.
    pub(crate) async fn submit_found(&self, job: Arc<Job>, nonce: Nonce) {
        let template = {
            let state = self.state.lock();
            match &state.template {
                Some(current)
                    if current.work_id == job.template.work_id
                        && current.parent_hash == job.template.parent_hash =>
                {
                    current.clone()
                }
                _ => job.template.clone(),
            }
        };

        let block = template.assemble_block(nonce);

        match self.node.submit_block(template.work_id, block).await {
            Ok(hash) => {
                info!("Block accepted at height {}: {hash}", template.height());
                self.ledger.add_block();

                // Force a clean-job broadcast so miners abandon queued work
                // for the solved height immediately.
                if let Some(current) = self.current_job() {
                    self.jobs.send_replace(Some(Arc::new(current.as_clean())));
                }
            }
            Err(err) => error!("Block rejected by node: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Json, Router, routing::post},
        std::sync::atomic::AtomicU32,
    };

    fn template_json(work_id: u64, parent: u8, time: u64) -> Value {
        json!({
            "work_id": format!("0x{work_id:x}"),
            "version": "0x0",
            "compact_target": "0x1d00ffff",
            "current_time": format!("0x{time:x}"),
            "number": "0x64",
            "epoch": "0x1",
            "parent_hash": format!("0x{}", hex::encode([parent; 32])),
            "transactions_root": format!("0x{}", "00".repeat(32)),
            "proposals_hash": format!("0x{}", "00".repeat(32)),
            "extra_hash": format!("0x{}", "00".repeat(32)),
            "dao": format!("0x{}", "00".repeat(32)),
            "uncles": [],
            "transactions": [],
            "proposals": [],
        })
    }

    fn chain_for_tests() -> Arc<Chain> {
        let settings = Settings::for_tests();
        Chain::new(&settings, Arc::new(Ledger::new())).unwrap()
    }

    #[tokio::test]
    async fn new_template_broadcasts_job() {
        let chain = chain_for_tests();
        let mut jobs = chain.watch_jobs();

        let template = serde_json::from_value(template_json(1, 0x11, 100)).unwrap();
        chain.apply_template(template);

        let job = jobs.borrow_and_update().clone().unwrap();
        assert_eq!(job.job_id, JobId::new(0));
        assert!(job.clean, "first job is always clean");
    }

    #[tokio::test]
    async fn same_work_id_and_parent_only_refreshes_time() {
        let chain = chain_for_tests();
        let mut jobs = chain.watch_jobs();

        chain.apply_template(serde_json::from_value(template_json(1, 0x11, 100)).unwrap());
        jobs.borrow_and_update();

        chain.apply_template(serde_json::from_value(template_json(1, 0x11, 200)).unwrap());
        assert!(!jobs.has_changed().unwrap(), "no broadcast for a time refresh");

        // But the stored template did pick up the new timestamp.
        let state = chain.state.lock();
        assert_eq!(state.template.as_ref().unwrap().current_time.0, 200);
    }

    #[tokio::test]
    async fn work_id_change_with_same_parent_is_not_clean() {
        let chain = chain_for_tests();
        let mut jobs = chain.watch_jobs();

        chain.apply_template(serde_json::from_value(template_json(1, 0x11, 100)).unwrap());
        jobs.borrow_and_update();

        chain.apply_template(serde_json::from_value(template_json(2, 0x11, 200)).unwrap());
        let job = jobs.borrow_and_update().clone().unwrap();

        assert_eq!(job.job_id, JobId::new(1));
        assert!(!job.clean, "same parent means miners may finish queued work");
    }

    #[tokio::test]
    async fn parent_change_is_clean() {
        let chain = chain_for_tests();
        let mut jobs = chain.watch_jobs();

        chain.apply_template(serde_json::from_value(template_json(1, 0x11, 100)).unwrap());
        chain.apply_template(serde_json::from_value(template_json(2, 0x22, 200)).unwrap());

        let job = jobs.borrow_and_update().clone().unwrap();
        assert_eq!(job.job_id, JobId::new(1));
        assert!(job.clean);
    }

    #[tokio::test]
    async fn health_flips_and_recovers() {
        let chain = chain_for_tests();

        assert!(chain.node_healthy());
        chain.record_failure(anyhow!("connection refused"));
        assert!(!chain.node_healthy());
        chain.record_failure(anyhow!("connection refused"));

        chain.record_success();
        assert!(chain.node_healthy());
        assert_eq!(chain.fail_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn submit_found_posts_block_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen_work_id = Arc::new(Mutex::new(String::new()));

        let app_calls = calls.clone();
        let app_seen = seen_work_id.clone();
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| {
                let calls = app_calls.clone();
                let seen = app_seen.clone();
                async move {
                    assert_eq!(request["method"], json!("submit_block"));
                    calls.fetch_add(1, Ordering::Relaxed);
                    *seen.lock() =
                        request["params"][0].as_str().unwrap_or_default().to_string();
                    Json(json!({
                        "id": request["id"],
                        "jsonrpc": "2.0",
                        "result": format!("0x{}", "ab".repeat(32)),
                    }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let ledger = Arc::new(Ledger::new());
        let settings = Settings::for_tests_with_node(&addr.ip().to_string(), addr.port());
        let chain = Chain::new(&settings, ledger.clone()).unwrap();

        let template = serde_json::from_value(template_json(0x25, 0x11, 100)).unwrap();
        chain.apply_template(template);
        let job = chain.current_job().unwrap();

        chain.submit_found(job, Nonce::from(42u128)).await;

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(seen_work_id.lock().as_str(), "0x25");
        assert_eq!(ledger.total_blocks(), 1);

        // The post-submission rebroadcast re-announces the job clean.
        let job = chain.current_job().unwrap();
        assert!(job.clean);
    }
}
