use {
    anyhow::{Context, Error, anyhow, bail, ensure},
    api::{ApiState, StatusSource},
    arguments::Arguments,
    chain::Chain,
    clap::Parser,
    connection::{Connection, Link},
    futures::{sink::SinkExt, stream::StreamExt},
    hashrate::HashRate,
    header::RawHeader,
    job::Job,
    ledger::{Ledger, MinerEntry},
    node::NodeClient,
    options::Options,
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    settings::{Mode, Settings},
    std::{
        fmt, fs, io,
        net::SocketAddr,
        path::PathBuf,
        process,
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    },
    stratum::{
        Authorize, Client, ClientConfig, ClientError, ClientEvent, ClientResult, Extranonce, Id,
        JobId, Message, Nonce, Notify, PendingSubmit, SetDifficulty, SetTarget, StratumError,
        Submit, SubmitOutcome, Subscribe, SubscribeResult,
    },
    target::{Difficulty, Target},
    template::{BlockTemplate, HexU64},
    tokio::{
        io::{AsyncRead, AsyncWrite},
        net::TcpListener,
        runtime::Runtime,
        sync::{broadcast, mpsc, oneshot, watch},
        task::JoinHandle,
        time::{MissedTickBehavior, interval, sleep, timeout},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::EnvFilter,
    upstream::{Upstream, UpstreamEvent},
    vardiff::{Vardiff, VardiffConfig},
};

mod api;
mod arguments;
pub mod blake2b;
mod chain;
mod connection;
mod hashrate;
pub mod header;
mod job;
mod ledger;
mod node;
mod options;
pub mod pow;
mod settings;
mod signal;
pub mod stratum;
mod subcommand;
pub mod target;
mod template;
mod upstream;
pub mod vardiff;

pub const USER_AGENT: &str = "roost/0.1.0";
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// One extranonce suffix byte caps concurrent miners.
pub const MAX_MINERS: usize = 256;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub fn main() {
    let (writer, _guard) = non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(writer)
        .init();

    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::setup_signal_handler();

            match args.run(cancel_token).await {
                Err(err) => {
                    error!("error: {err:#}");
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
