use super::*;

use snafu::Snafu;

/// Stratum error codes as miners expect them: `[code, message, traceback]`.
/// The positive codes are the classic pool set; negative codes flag frames
/// that never made it to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StratumError {
    InvalidParams = -1,
    NoJob = 20,
    Stale = 21,
    LowDifficulty = 23,
    Unauthorized = 24,
    NotSubscribed = 25,
}

impl StratumError {
    pub fn to_value(self) -> Value {
        json!([self as i32, self.to_string(), null])
    }
}

impl fmt::Display for StratumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::InvalidParams => "Invalid params",
            Self::NoJob => "No job",
            Self::Stale => "Stale share",
            Self::LowDifficulty => "Low difficulty share",
            Self::Unauthorized => "Unauthorized worker",
            Self::NotSubscribed => "Not subscribed",
        };
        f.write_str(message)
    }
}

/// Faults inside the wire layer itself: bad hex, wrong widths, framing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InternalError {
    #[snafu(display("Failed to parse hex string: {source}"))]
    HexParse { source: hex::FromHexError },

    #[snafu(display("Invalid length: expected {expected}, got {actual}"))]
    InvalidLength { expected: usize, actual: usize },

    #[snafu(display("Parse error: {message}"))]
    Parse { message: String },
}

/// Upstream client faults. Transport-level problems get their own variants
/// so the reconnect loop can tell a dead socket from a pool that just said
/// no.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    #[snafu(display("Not connected"))]
    NotConnected,

    #[snafu(display("Connection timed out: {source}"))]
    Timeout { source: tokio::time::error::Elapsed },

    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("Failed to serialize JSON: {source}"))]
    Serialization {
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },

    #[snafu(display("Request dropped before a response arrived"))]
    ChannelRecv {
        source: tokio::sync::oneshot::error::RecvError,
    },

    #[snafu(display("{message}"))]
    Protocol { message: String },
}
