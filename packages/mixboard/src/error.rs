use crate::connection::Port;

/// Errors that can occur while talking to a MixBoard
#[derive(Debug, thiserror::Error)]
pub enum MixBoardError {
    /// Socket failure on one of the two channels
    #[error("{port} channel i/o error: {source}")]
    Io {
        port: Port,
        #[source]
        source: std::io::Error,
    },

    /// Response payload was not valid base64
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] data_encoding::DecodeError),

    /// Response payload decoded but was not the expected JSON document
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The command channel has no live connection
    #[error("command channel is not connected")]
    NotConnected,

    /// The session actor task has stopped
    #[error("session actor is gone")]
    ActorGone,

    /// The connection was torn down before the command's response arrived
    #[error("command abandoned before a response arrived")]
    Abandoned,

    #[error("keyer id out of range: {0}")]
    InvalidKeyer(u32),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("unknown take mode: {0}")]
    UnknownTakeMode(String),

    #[error("unknown play direction: {0}")]
    UnknownDirection(String),
}
