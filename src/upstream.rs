use {super::*, tokio::sync::RwLock};

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Doubled on every connection loss, reset on every successful connect.
pub(crate) fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// What the pool handed us at subscribe time plus the latest notifications,
/// kept for replay to miners that connect or authorize later.
#[derive(Debug, Clone, Default)]
pub(crate) struct PoolState {
    pub(crate) extranonce1: Extranonce,
    pub(crate) extranonce2_size: u32,
    pub(crate) current_job: Option<Value>,
    pub(crate) current_target: Option<Value>,
    pub(crate) difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone)]
pub(crate) enum UpstreamEvent {
    Notify(Value),
    SetTarget(Value),
    SetDifficulty(Difficulty),
    Down,
}

/// Pool-mode upstream manager: owns the Stratum client, runs the
/// reconnect loop, tracks pool state and relays notifications to miner
/// connections.
pub(crate) struct Upstream {
    settings: Arc<Settings>,
    client: Client,
    state: RwLock<Option<PoolState>>,
    ready: AtomicBool,
    accepted: AtomicU64,
    rejected: AtomicU64,
    events: broadcast::Sender<UpstreamEvent>,
}

impl Upstream {
    pub(crate) fn new(settings: Arc<Settings>) -> Result<Arc<Self>> {
        let client = Client::new(ClientConfig {
            host: settings.pool_host()?.to_string(),
            port: settings.pool_port()?,
            username: settings.pool_user()?.to_string(),
            password: settings.pool_pass().map(str::to_string),
            user_agent: USER_AGENT.into(),
            timeout: Duration::from_secs(10),
        });

        let (events, _) = broadcast::channel(256);

        Ok(Arc::new(Self {
            settings,
            client,
            state: RwLock::new(None),
            ready: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            events,
        }))
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<UpstreamEvent> {
        self.events.subscribe()
    }

    pub(crate) fn ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub(crate) async fn pool_state(&self) -> Option<PoolState> {
        self.state.read().await.clone()
    }

    pub(crate) fn endpoint(&self) -> String {
        match (self.settings.pool_host(), self.settings.pool_port()) {
            (Ok(host), Ok(port)) => format!("{host}:{port}"),
            _ => String::new(),
        }
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub(crate) fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Reconnect loop. Runs until cancelled; each connection loss doubles
    /// the delay from 2s up to 60s, and any successful connect resets it.
    pub(crate) fn spawn(self: &Arc<Self>, cancel: CancellationToken) {
        let upstream = self.clone();

        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;

            loop {
                match upstream.establish().await {
                    Ok(events) => {
                        backoff = INITIAL_BACKOFF;
                        upstream.pump(events, &cancel).await;

                        if cancel.is_cancelled() {
                            break;
                        }

                        upstream.mark_down();
                        warn!(
                            "Upstream {} lost, reconnecting in {}s",
                            upstream.endpoint(),
                            backoff.as_secs()
                        );
                    }
                    Err(err) => {
                        upstream.mark_down();
                        warn!(
                            "Upstream {} handshake failed: {err}; retrying in {}s",
                            upstream.endpoint(),
                            backoff.as_secs()
                        );
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(backoff) => {}
                }

                backoff = next_backoff(backoff);
            }

            upstream.client.disconnect().await;
            info!("Upstream manager stopped");
        });
    }

    async fn establish(&self) -> ClientResult<broadcast::Receiver<ClientEvent>> {
        self.client.connect().await?;

        // Subscribe to events before the handshake so the first notify is
        // never missed.
        let events = self.client.subscribe_events();

        let subscribe = self.client.subscribe(USER_AGENT).await?;
        let extranonce1 =
            Extranonce::from_hex(&subscribe.extranonce1).map_err(|e| ClientError::Protocol {
                message: format!("pool sent a malformed extranonce1: {e}"),
            })?;

        info!(
            "Subscribed to {}: extranonce1={} extranonce2_size={}",
            self.endpoint(),
            subscribe.extranonce1,
            subscribe.extranonce2_size
        );

        {
            let mut state = self.state.write().await;
            let previous = state.take();
            *state = Some(PoolState {
                extranonce1,
                extranonce2_size: subscribe.extranonce2_size.max(1),
                current_job: previous.as_ref().and_then(|s| s.current_job.clone()),
                current_target: previous.as_ref().and_then(|s| s.current_target.clone()),
                difficulty: previous.and_then(|s| s.difficulty),
            });
        }

        let username = self.settings.pool_user().map_err(|e| ClientError::Protocol {
            message: e.to_string(),
        })?;
        self.client
            .authorize(username, self.settings.pool_pass())
            .await?;

        info!("Authorized to {} as {}", self.endpoint(), username);
        self.ready.store(true, Ordering::Relaxed);

        Ok(events)
    }

    async fn pump(&self, mut events: broadcast::Receiver<ClientEvent>, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Ok(ClientEvent::Notify(params)) => {
                        if let Some(state) = self.state.write().await.as_mut() {
                            state.current_job = Some(params.clone());
                        }
                        let _ = self.events.send(UpstreamEvent::Notify(params));
                    }
                    Ok(ClientEvent::SetTarget(params)) => {
                        if let Some(state) = self.state.write().await.as_mut() {
                            state.current_target = Some(params.clone());
                        }
                        let _ = self.events.send(UpstreamEvent::SetTarget(params));
                    }
                    Ok(ClientEvent::SetDifficulty(difficulty)) => {
                        if let Some(state) = self.state.write().await.as_mut() {
                            state.difficulty = Some(difficulty);
                        }
                        let _ = self.events.send(UpstreamEvent::SetDifficulty(difficulty));
                    }
                    Ok(ClientEvent::Disconnected) => return,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Upstream event stream lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    fn mark_down(&self) {
        if self.ready.swap(false, Ordering::Relaxed) {
            let _ = self.events.send(UpstreamEvent::Down);
        }
    }

    /// Rewrites a miner share for the pool and enqueues it: the miner's
    /// suffix byte goes in front of its extranonce2 and the configured
    /// username replaces the local worker name. Returns the in-flight
    /// handle; enqueue order is wire order.
    pub(crate) async fn forward_share(
        &self,
        suffix: u8,
        submit: &Submit,
    ) -> ClientResult<PendingSubmit> {
        let username = self.settings.pool_user().map_err(|e| ClientError::Protocol {
            message: e.to_string(),
        })?;

        let rewritten = Submit {
            worker: username.to_string(),
            job_id: submit.job_id.clone(),
            extranonce2: submit.extranonce2.with_prefix(suffix),
            ntime: submit.ntime,
            nonce: submit.nonce,
        };

        self.client.submit(&rewritten).await
    }

    pub(crate) fn record_outcome(&self, outcome: &SubmitOutcome) {
        if outcome.accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("Upstream rejected share: {:?}", outcome.error);
        }
    }

    #[cfg(test)]
    pub(crate) async fn prime_for_tests(&self, state: PoolState, ready: bool) {
        *self.state.write().await = Some(state);
        self.ready.store(ready, Ordering::Relaxed);
    }
}
