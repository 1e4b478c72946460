use super::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum State {
    Init,
    Subscribed,
    Working,
}

/// Which upstream this session relays to.
#[derive(Clone)]
pub(crate) enum Link {
    Pool(Arc<Upstream>),
    Solo(Arc<Chain>),
}

/// One miner session. Owns both halves of the socket through line codecs;
/// inbound frames are handled one at a time in arrival order, so direct
/// replies always go out in request order. Only pool-forwarded share
/// verdicts arrive later, routed through the reply queue under the miner's
/// original request id.
pub(crate) struct Connection<R, W> {
    ledger: Arc<Ledger>,
    entry: Arc<MinerEntry>,
    link: Link,
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    cancel: CancellationToken,
    out_tx: mpsc::Sender<Message>,
    out_rx: Option<mpsc::Receiver<Message>>,
    state: State,
    vardiff: Vardiff,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(
        settings: Arc<Settings>,
        ledger: Arc<Ledger>,
        link: Link,
        peer: SocketAddr,
        reader: R,
        writer: W,
        cancel: CancellationToken,
    ) -> Self {
        let vardiff = Vardiff::new(settings.vardiff(), Instant::now());
        let entry = ledger.register(peer, vardiff.difficulty().as_f64());
        let (out_tx, out_rx) = mpsc::channel(64);

        info!("Miner {} connected from {peer}", entry.id);

        Self {
            ledger,
            entry,
            link,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            cancel,
            out_tx,
            out_rx: Some(out_rx),
            state: State::Init,
            vardiff,
        }
    }

    pub(crate) async fn serve(&mut self) -> Result {
        match self.link.clone() {
            Link::Pool(upstream) => self.serve_pool(upstream).await,
            Link::Solo(chain) => self.serve_solo(chain).await,
        }
    }

    async fn serve_pool(&mut self, upstream: Arc<Upstream>) -> Result {
        let mut events = upstream.subscribe_events();
        let mut out_rx = self.out_rx.take().expect("serve runs once");
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(reply) = out_rx.recv() => {
                    self.send(reply).await?;
                }

                event = events.recv() => match event {
                    Ok(event) => self.relay_upstream_event(event).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Miner {} lagged {skipped} upstream events", self.entry.id);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                message = self.read_message() => {
                    let Some(message) = message? else {
                        break;
                    };
                    self.dispatch(message).await?;
                }
            }
        }

        Ok(())
    }

    async fn serve_solo(&mut self, chain: Arc<Chain>) -> Result {
        let mut jobs = chain.watch_jobs();
        jobs.mark_unchanged();
        let mut out_rx = self.out_rx.take().expect("serve runs once");
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(reply) = out_rx.recv() => {
                    self.send(reply).await?;
                }

                changed = jobs.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let job = jobs.borrow_and_update().clone();
                    if self.state == State::Working
                        && let Some(job) = job
                    {
                        self.send(Message::notification(
                            "mining.notify",
                            json!(job.notify()),
                        ))
                        .await?;
                    }
                }

                message = self.read_message() => {
                    let Some(message) = message? else {
                        break;
                    };
                    self.dispatch(message).await?;
                }
            }
        }

        Ok(())
    }

    /// Reads until a complete, parseable frame arrives. Malformed lines are
    /// logged and skipped; the connection only ends on EOF or a transport
    /// error.
    async fn read_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.reader.next().await {
                Some(Ok(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<Message>(line) {
                        Ok(message) => return Ok(Some(message)),
                        Err(e) => {
                            warn!(
                                "Discarding malformed line from miner {}: {e}",
                                self.entry.id
                            );
                        }
                    }
                }
                Some(Err(e)) => {
                    return Err(anyhow!("read error from miner {}: {e}", self.entry.id));
                }
                None => {
                    info!("Miner {} disconnected", self.entry.id);
                    return Ok(None);
                }
            }
        }
    }

    async fn dispatch(&mut self, message: Message) -> Result {
        let Message::Request { id, method, params } = message else {
            debug!("Ignoring non-request frame from miner {}", self.entry.id);
            return Ok(());
        };

        match method.as_str() {
            "mining.subscribe" => self.subscribe(id, params).await,
            "mining.authorize" => self.authorize(id, params).await,
            "mining.submit" => self.submit(id, params).await,
            "mining.get_transactions" => self.send(Message::ok(id, json!([]))).await,
            "mining.extranonce.subscribe"
            | "mining.suggest_difficulty"
            | "mining.suggest_target" => self.send(Message::ok(id, json!(true))).await,
            method => {
                warn!("Unknown method {method} from miner {}", self.entry.id);
                Ok(())
            }
        }
    }

    async fn subscribe(&mut self, id: Id, params: Value) -> Result {
        let Ok(subscribe) = serde_json::from_value::<Subscribe>(params) else {
            return self.send(Message::error(id, StratumError::InvalidParams)).await;
        };

        if let Some(user_agent) = &subscribe.user_agent {
            debug!("Miner {} user agent: {user_agent}", self.entry.id);
        }

        let result = match self.link.clone() {
            Link::Pool(upstream) => match upstream.pool_state().await {
                Some(pool) => SubscribeResult {
                    subscriptions: None,
                    extranonce1: pool.extranonce1.with_suffix(self.entry.suffix()).to_hex(),
                    extranonce2_size: pool.extranonce2_size.saturating_sub(1).max(1),
                },
                None => {
                    return self.send(Message::error(id, StratumError::NoJob)).await;
                }
            },
            Link::Solo(_) => {
                // Goldshell-style resume: echo the session id the device
                // asked for, or mint one.
                let session_id = subscribe
                    .session_id
                    .clone()
                    .unwrap_or_else(|| format!("{:08x}", rand::random::<u32>()));
                debug!("Miner {} session id {session_id}", self.entry.id);
                SubscribeResult::resumed_session(&session_id, 4)
            }
        };

        self.send(Message::ok(id, json!(result))).await?;

        if self.state == State::Init {
            self.state = State::Subscribed;
        }

        Ok(())
    }

    async fn authorize(&mut self, id: Id, params: Value) -> Result {
        if self.state == State::Init {
            return self
                .send(Message::error(id, StratumError::NotSubscribed))
                .await;
        }

        let Ok(authorize) = serde_json::from_value::<Authorize>(params) else {
            return self.send(Message::error(id, StratumError::InvalidParams)).await;
        };

        // Any credentials are accepted; the worker name only labels stats.
        self.entry.set_worker(&authorize.username);
        info!(
            "Miner {} authorized as {}",
            self.entry.id, authorize.username
        );

        self.send(Message::ok(id, json!(true))).await?;
        self.state = State::Working;

        match self.link.clone() {
            Link::Pool(upstream) => {
                if let Some(pool) = upstream.pool_state().await {
                    if let Some(difficulty) = pool.difficulty {
                        self.entry.set_difficulty(difficulty.as_f64());
                        self.send(Message::notification(
                            "mining.set_difficulty",
                            json!(SetDifficulty(difficulty)),
                        ))
                        .await?;
                    }
                    if let Some(target) = pool.current_target {
                        self.send(Message::notification("mining.set_target", target))
                            .await?;
                    }
                    if let Some(job) = pool.current_job {
                        self.send(Message::notification("mining.notify", job)).await?;
                    }
                }
            }
            Link::Solo(chain) => {
                let difficulty = self.vardiff.difficulty();
                self.send(Message::notification(
                    "mining.set_difficulty",
                    json!(SetDifficulty(difficulty)),
                ))
                .await?;
                self.send(Message::notification(
                    "mining.set_target",
                    json!(SetTarget(difficulty.to_target())),
                ))
                .await?;

                if let Some(job) = chain.current_job() {
                    self.send(Message::notification("mining.notify", json!(job.notify())))
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn submit(&mut self, id: Id, params: Value) -> Result {
        if self.state != State::Working {
            return self
                .send(Message::error(id, StratumError::Unauthorized))
                .await;
        }

        let Ok(submit) = serde_json::from_value::<Submit>(params) else {
            return self.send(Message::error(id, StratumError::InvalidParams)).await;
        };

        self.entry.record_submitted();
        self.ledger.add_share();

        match self.link.clone() {
            Link::Pool(upstream) => self.submit_pool(id, submit, upstream).await,
            Link::Solo(chain) => self.submit_solo(id, submit, chain).await,
        }
    }

    /// Pool mode never validates; the share is rewritten and forwarded, and
    /// the pool's verdict is relayed later under the miner's original id.
    async fn submit_pool(&mut self, id: Id, submit: Submit, upstream: Arc<Upstream>) -> Result {
        if !upstream.ready() {
            self.entry.record_rejected();
            return self.send(Message::rejected(id, StratumError::NoJob)).await;
        }

        // Enqueued inline so shares hit the pool socket in submission
        // order; only the verdict is awaited off to the side.
        let pending = match upstream.forward_share(self.entry.suffix(), &submit).await {
            Ok(pending) => pending,
            Err(err) => {
                debug!("Share for miner {} not forwarded: {err}", self.entry.id);
                self.entry.record_rejected();
                return self.send(Message::rejected(id, StratumError::NoJob)).await;
            }
        };

        let entry = self.entry.clone();
        let out_tx = self.out_tx.clone();

        tokio::spawn(async move {
            match pending.outcome().await {
                Ok(outcome) => {
                    upstream.record_outcome(&outcome);
                    if outcome.accepted {
                        entry.record_accepted();
                    } else {
                        entry.record_rejected();
                    }

                    let reply = Message::Response {
                        id,
                        result: Some(json!(outcome.accepted)),
                        error: outcome.error,
                    };

                    if out_tx.send(reply).await.is_err() {
                        debug!("Miner {} went away before the pool answered", entry.id);
                    }
                }
                // The socket died with the share in flight; the pending
                // entry is dropped silently and the miner gets no reply.
                Err(err) => debug!("Share for miner {} lost upstream: {err}", entry.id),
            }
        });

        Ok(())
    }

    async fn submit_solo(&mut self, id: Id, submit: Submit, chain: Arc<Chain>) -> Result {
        let Some(job) = chain.current_job() else {
            self.entry.record_rejected();
            self.send(Message::rejected(id, StratumError::NoJob)).await?;
            return self.apply_retarget().await;
        };

        // Stale shares are ACKed without validation: miners replaying their
        // buffer after a job switch would otherwise spiral into rejects.
        let stale = submit
            .job_id
            .parse::<JobId>()
            .map(|id| id != job.job_id)
            .unwrap_or(true);
        if stale {
            self.entry.record_stale_ack();
            self.send(Message::ok(id, json!(true))).await?;
            return self.apply_retarget().await;
        }

        let hash = pow::share_hash(&job.pow_hash, submit.nonce);

        if !self.vardiff.difficulty().to_target().is_met_by(&hash) {
            self.entry.record_rejected();
            self.send(Message::rejected(id, StratumError::LowDifficulty))
                .await?;
            return self.apply_retarget().await;
        }

        self.entry.record_accepted();
        self.vardiff.record_accepted();
        self.send(Message::ok(id, json!(true))).await?;

        if job.target.is_met_by(&hash) {
            info!(
                "Miner {} found a block candidate at height {}",
                self.entry.id, job.height
            );
            let nonce = submit.nonce;
            tokio::spawn(async move { chain.submit_found(job, nonce).await });
        } else {
            self.entry.record_local_only();
        }

        self.apply_retarget().await
    }

    /// Evaluated on every submission; pushes the new target pair when the
    /// controller moves.
    async fn apply_retarget(&mut self) -> Result {
        if let Some(difficulty) = self.vardiff.maybe_retarget(Instant::now()) {
            self.entry.set_difficulty(difficulty.as_f64());
            self.send(Message::notification(
                "mining.set_target",
                json!(SetTarget(difficulty.to_target())),
            ))
            .await?;
            self.send(Message::notification(
                "mining.set_difficulty",
                json!(SetDifficulty(difficulty)),
            ))
            .await?;
        }
        Ok(())
    }

    async fn relay_upstream_event(&mut self, event: UpstreamEvent) -> Result {
        if self.state != State::Working {
            return Ok(());
        }

        match event {
            UpstreamEvent::Notify(params) => {
                self.send(Message::notification("mining.notify", params)).await
            }
            UpstreamEvent::SetTarget(params) => {
                self.send(Message::notification("mining.set_target", params))
                    .await
            }
            UpstreamEvent::SetDifficulty(difficulty) => {
                self.entry.set_difficulty(difficulty.as_f64());
                self.send(Message::notification(
                    "mining.set_difficulty",
                    json!(SetDifficulty(difficulty)),
                ))
                .await
            }
            UpstreamEvent::Down => {
                debug!("Upstream down; miner {} keeps its last job", self.entry.id);
                Ok(())
            }
        }
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }
}

impl<R, W> Drop for Connection<R, W> {
    fn drop(&mut self) {
        self.ledger.unregister(self.entry.id);
        info!(
            "Miner {} session closed ({} still connected)",
            self.entry.id,
            self.ledger.live_miners()
        );
    }
}
