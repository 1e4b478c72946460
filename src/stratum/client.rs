use {
    super::*,
    error::{ChannelRecvSnafu, IoSnafu, SerializationSnafu, TimeoutSnafu},
    snafu::ResultExt,
    std::collections::BTreeMap,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
        net::TcpStream,
    },
};

pub type ClientResult<T = (), E = ClientError> = std::result::Result<T, E>;

/// Upstream request ids start here so they never collide with the small ids
/// miner firmware uses, which makes mixed-up logs much easier to read.
const FIRST_REQUEST_ID: u64 = 100;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Outcome of a forwarded share: the pool's boolean verdict plus its raw
/// error value, relayed verbatim to the miner that submitted it.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub error: Option<Value>,
}

/// Notifications surfaced from the upstream connection.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Notify(Value),
    SetTarget(Value),
    SetDifficulty(Difficulty),
    Disconnected,
}

// The handle owned by callers. All connection state lives in the actor task;
// requests travel over a channel and responses come back on oneshots, which
// doubles as the pending-share map the proxy needs for id correlation.
#[derive(Clone)]
pub struct Client {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<ClientEvent>,
}

type ResponseBody = (Option<Value>, Option<Value>);

enum Command {
    Connect {
        respond_to: oneshot::Sender<ClientResult>,
    },
    Request {
        method: &'static str,
        params: Value,
        respond_to: oneshot::Sender<ClientResult<ResponseBody>>,
    },
    Disconnect {
        respond_to: oneshot::Sender<()>,
    },
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let (events, _) = broadcast::channel(64);

        let actor = ClientActor {
            config,
            rx,
            events: events.clone(),
            next_id: FIRST_REQUEST_ID,
            pending: BTreeMap::new(),
            connection: None,
        };

        tokio::spawn(actor.run());

        Self { tx, events }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn connect(&self) -> ClientResult {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(Command::Connect { respond_to })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    pub async fn disconnect(&self) {
        let (respond_to, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Disconnect { respond_to }).await;
        let _ = rx.await;
    }

    async fn request(&self, method: &'static str, params: Value) -> ClientResult<ResponseBody> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(Command::Request {
                method,
                params,
                respond_to,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        ResultExt::context(rx.await, ChannelRecvSnafu)?
    }

    pub async fn subscribe(&self, user_agent: &str) -> ClientResult<SubscribeResult> {
        let (result, error) = self
            .request("mining.subscribe", json!([user_agent]))
            .await?;

        match (result, error) {
            (Some(result), None) => {
                serde_json::from_value(result).map_err(|e| ClientError::Protocol {
                    message: format!("malformed mining.subscribe result: {e}"),
                })
            }
            (_, error) => Err(ClientError::Protocol {
                message: format!("mining.subscribe failed: {error:?}"),
            }),
        }
    }

    pub async fn authorize(&self, username: &str, password: Option<&str>) -> ClientResult {
        let params = json!([username, password.unwrap_or("x")]);
        let (result, error) = self.request("mining.authorize", params).await?;

        match (result, error) {
            (Some(Value::Bool(true)), None) => Ok(()),
            (result, error) => Err(ClientError::Protocol {
                message: format!("mining.authorize rejected: result={result:?} error={error:?}"),
            }),
        }
    }

    /// Enqueues a submit and returns once it is queued for the wire, so
    /// shares reach the pool in submission order even though their verdicts
    /// are awaited concurrently.
    pub async fn submit(&self, submit: &Submit) -> ClientResult<PendingSubmit> {
        let params = ResultExt::context(serde_json::to_value(submit), SerializationSnafu)?;
        let (respond_to, rx) = oneshot::channel();

        self.tx
            .send(Command::Request {
                method: "mining.submit",
                params,
                respond_to,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;

        Ok(PendingSubmit(rx))
    }
}

/// An in-flight share. Resolves to the pool's verdict, or to
/// `NotConnected` when the socket died with the share outstanding.
pub struct PendingSubmit(oneshot::Receiver<ClientResult<ResponseBody>>);

impl PendingSubmit {
    pub async fn outcome(self) -> ClientResult<SubmitOutcome> {
        let (result, error) = ResultExt::context(self.0.await, ChannelRecvSnafu)??;

        Ok(SubmitOutcome {
            accepted: result.as_ref().and_then(Value::as_bool).unwrap_or(false),
            error,
        })
    }
}

struct ClientActor {
    config: ClientConfig,
    rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<ClientEvent>,
    next_id: u64,
    pending: BTreeMap<u64, oneshot::Sender<ClientResult<ResponseBody>>>,
    connection: Option<ConnectionState>,
}

struct ConnectionState {
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
    reader_handle: JoinHandle<()>,
}

enum Incoming {
    Response { id: u64, body: ResponseBody },
    UnmatchedResponse { id: Id },
    Notification { method: String, params: Value },
    Disconnected,
}

impl ClientActor {
    async fn run(mut self) {
        let (incoming_tx, mut incoming_rx) = mpsc::channel::<Incoming>(64);

        loop {
            tokio::select! {
                Some(command) = self.rx.recv() => match command {
                    Command::Connect { respond_to } => {
                        let result = self.handle_connect(incoming_tx.clone()).await;
                        let _ = respond_to.send(result);
                    }
                    Command::Request { method, params, respond_to } => {
                        let id = self.next_id;
                        self.next_id += 1;
                        self.pending.insert(id, respond_to);

                        if let Err(error) = self.write_request(id, method, params).await {
                            if let Some(respond_to) = self.pending.remove(&id) {
                                let _ = respond_to.send(Err(error));
                            }
                        }
                    }
                    Command::Disconnect { respond_to } => {
                        self.handle_disconnect();
                        let _ = respond_to.send(());
                    }
                },
                Some(incoming) = incoming_rx.recv() => self.handle_incoming(incoming),
                else => {
                    self.handle_disconnect();
                    break;
                }
            }
        }
    }

    async fn handle_connect(&mut self, incoming_tx: mpsc::Sender<Incoming>) -> ClientResult {
        if self.connection.is_some() {
            self.handle_disconnect();
        }

        let address = (self.config.host.as_str(), self.config.port);
        let stream = ResultExt::context(
            timeout(self.config.timeout, TcpStream::connect(address)).await,
            TimeoutSnafu,
        )?;
        let stream = ResultExt::context(stream, IoSnafu)?;

        let (reader, writer) = stream.into_split();

        let reader_handle = tokio::spawn(Self::reader_task(BufReader::new(reader), incoming_tx));

        self.connection = Some(ConnectionState {
            writer: BufWriter::new(writer),
            reader_handle,
        });

        debug!("Connected to {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    async fn write_request(
        &mut self,
        id: u64,
        method: &'static str,
        params: Value,
    ) -> ClientResult {
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;

        let message = Message::request(Id::Number(id), method, params);
        let mut frame = ResultExt::context(serde_json::to_string(&message), SerializationSnafu)?;
        frame.push('\n');

        ResultExt::context(
            connection.writer.write_all(frame.as_bytes()).await,
            IoSnafu,
        )?;
        ResultExt::context(connection.writer.flush().await, IoSnafu)?;

        Ok(())
    }

    fn handle_disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.reader_handle.abort();
        }

        // Outstanding shares die with the socket; their submitters are
        // answered with NotConnected and the proxy drops them silently.
        for (_, respond_to) in std::mem::take(&mut self.pending) {
            let _ = respond_to.send(Err(ClientError::NotConnected));
        }

        let _ = self.events.send(ClientEvent::Disconnected);
    }

    fn handle_incoming(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::Response { id, body } => {
                if let Some(respond_to) = self.pending.remove(&id) {
                    let _ = respond_to.send(Ok(body));
                } else {
                    warn!("Unmatched upstream response id {id}");
                }
            }
            Incoming::UnmatchedResponse { id } => {
                warn!("Upstream response with non-numeric id {id}");
            }
            Incoming::Notification { method, params } => match method.as_str() {
                "mining.notify" => {
                    let _ = self.events.send(ClientEvent::Notify(params));
                }
                "mining.set_target" => {
                    let _ = self.events.send(ClientEvent::SetTarget(params));
                }
                "mining.set_difficulty" => {
                    match serde_json::from_value::<SetDifficulty>(params) {
                        Ok(set_difficulty) => {
                            let _ = self
                                .events
                                .send(ClientEvent::SetDifficulty(set_difficulty.difficulty()));
                        }
                        Err(e) => warn!("Malformed mining.set_difficulty from upstream: {e}"),
                    }
                }
                method => debug!("Ignoring upstream notification {method}"),
            },
            Incoming::Disconnected => self.handle_disconnect(),
        }
    }

    async fn reader_task(
        mut reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
        incoming_tx: mpsc::Sender<Incoming>,
    ) {
        let mut line = String::new();

        loop {
            line.clear();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    let _ = incoming_tx.send(Incoming::Disconnected).await;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Upstream read error: {e}");
                    let _ = incoming_tx.send(Incoming::Disconnected).await;
                    break;
                }
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // A bad line from the pool is logged and skipped; the socket
            // stays up.
            let message: Message = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Discarding malformed upstream line: {e}; line={trimmed:?}");
                    continue;
                }
            };

            let incoming = match message {
                Message::Response { id, result, error } => match id {
                    Id::Number(id) => Incoming::Response {
                        id,
                        body: (result, error),
                    },
                    id => Incoming::UnmatchedResponse { id },
                },
                Message::Notification { method, params } => {
                    Incoming::Notification { method, params }
                }
                Message::Request { method, .. } => {
                    debug!("Ignoring upstream request {method}");
                    continue;
                }
            };

            if incoming_tx.send(incoming).await.is_err() {
                break;
            }
        }
    }
}
