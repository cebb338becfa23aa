use std::net::SocketAddr;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("websocket error: {0}")]
    Websocket(Box<tungstenite::Error>),
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("invalid authorization header value")]
    InvalidAuthHeader(#[from] tungstenite::http::header::InvalidHeaderValue),
    #[error("malformed feed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("event channel closed; processor stopped")]
    EventChannelClosed,
    #[error(
        "unable to bind HTTP listener on {addr}: {source}; is another instance running? \
         choose a different port with --port"
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(std::io::Error),
    #[error("failed to write {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        Error::Websocket(Box::new(err))
    }
}

impl Error {
    /// Whether the feed client should back off and reconnect after this error.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Websocket(_) | Error::ConnectTimeout(_))
    }
}
