use super::*;

use error::HexParseSnafu;

mod authorize;
mod client;
mod error;
mod extranonce;
mod job_id;
mod message;
mod nonce;
mod notify;
mod ntime;
mod set_difficulty;
mod set_target;
mod submit;
mod subscribe;

pub use {
    authorize::Authorize,
    client::{Client, ClientConfig, ClientEvent, ClientResult, PendingSubmit, SubmitOutcome},
    error::{ClientError, InternalError, StratumError},
    extranonce::Extranonce,
    job_id::JobId,
    message::{Id, Message},
    nonce::Nonce,
    notify::Notify,
    ntime::Ntime,
    set_difficulty::SetDifficulty,
    set_target::SetTarget,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
};
