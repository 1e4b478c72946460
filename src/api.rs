use {
    super::*,
    axum::{Json, Router, extract::State, routing::get},
    axum_server::Handle,
};

/// Read-only projection of the core state. The handlers only touch atomics
/// and snapshots; nothing here can block or mutate the session layer.
#[derive(Clone)]
pub(crate) struct ApiState {
    pub(crate) settings: Arc<Settings>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) source: StatusSource,
}

#[derive(Clone)]
pub(crate) enum StatusSource {
    Pool(Arc<Upstream>),
    Solo(Arc<Chain>),
}

pub(crate) fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(snapshot))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) fn spawn(
    address: SocketAddr,
    state: ApiState,
    cancel: CancellationToken,
) -> JoinHandle<io::Result<()>> {
    let handle = Handle::new();

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        cancel.cancelled().await;
        shutdown_handle.shutdown();
    });

    info!("Stats API listening on http://{address}");

    tokio::spawn(async move {
        axum_server::Server::bind(address)
            .handle(handle)
            .serve(router(state).into_make_service())
            .await
    })
}

async fn health(State(state): State<ApiState>) -> Json<Value> {
    let miners = state.ledger.live_miners();

    Json(match &state.source {
        StatusSource::Pool(upstream) => json!({
            "ok": upstream.ready(),
            "miners": miners,
            "upstreamReady": upstream.ready(),
        }),
        StatusSource::Solo(chain) => json!({
            "ok": chain.node_healthy(),
            "miners": miners,
            "hasTemplate": chain.has_template(),
        }),
    })
}

async fn snapshot(State(state): State<ApiState>) -> Json<Value> {
    let ledger = &state.ledger;

    let totals = json!({
        "shares": ledger.total_shares(),
        "blocks": ledger.total_blocks(),
        "hashrate": ledger.total_hashrate().to_string(),
    });

    let mut snapshot = json!({
        "uptime": ledger.uptime().as_secs(),
        "totals": totals,
        "miners": ledger.miner_snapshots(),
    });

    match &state.source {
        StatusSource::Pool(upstream) => {
            snapshot["mode"] = json!("pool");
            snapshot["upstream"] = json!({
                "endpoint": upstream.endpoint(),
                "ready": upstream.ready(),
                "accepted": upstream.accepted(),
                "rejected": upstream.rejected(),
                "difficulty": upstream.pool_state().await.and_then(|s| s.difficulty),
            });
        }
        StatusSource::Solo(chain) => {
            let job = chain.current_job();
            snapshot["mode"] = json!("solo");
            snapshot["node"] = json!({
                "url": chain.node_url(),
                "healthy": chain.node_healthy(),
                "hasTemplate": job.is_some(),
                "height": job.as_ref().map(|job| job.height),
                "jobId": job.as_ref().map(|job| job.job_id.to_string()),
                "coinbase": state.settings.node_coinbase(),
            });
        }
    }

    Json(snapshot)
}
