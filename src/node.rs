use super::*;

/// Per-request deadline. A node that cannot answer within this is treated
/// as a failed poll, counted against its health.
const RPC_TIMEOUT: Duration = Duration::from_secs(8);

/// JSON-RPC 2.0 client for the CKB node. Stateless apart from the id
/// counter; health bookkeeping lives in the poll driver that owns it.
pub(crate) struct NodeClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<Value>,
}

impl NodeClient {
    pub(crate) fn new(host: &str, port: u16) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(RPC_TIMEOUT)
                .build()
                .context("failed to build node HTTP client")?,
            url: format!("http://{host}:{port}/"),
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });

        let envelope: RpcEnvelope = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .error_for_status()
            .with_context(|| format!("{method} returned an HTTP error"))?
            .json()
            .await
            .with_context(|| format!("{method} returned malformed JSON"))?;

        if let Some(error) = envelope.error {
            bail!("{method} RPC error: {error}");
        }

        envelope
            .result
            .with_context(|| format!("{method} returned no result"))
    }

    pub(crate) async fn get_block_template(&self) -> Result<BlockTemplate> {
        let result = self
            .call("get_block_template", json!([null, null, null]))
            .await?;

        serde_json::from_value(result).context("malformed block template")
    }

    /// Submits an assembled block; the node answers with the block hash.
    pub(crate) async fn submit_block(&self, work_id: HexU64, block: Value) -> Result<String> {
        let result = self
            .call("submit_block", json!([work_id.to_string(), block]))
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .context("submit_block returned a non-string result")
    }
}
