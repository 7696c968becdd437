use std::net::SocketAddr;

use thiserror::Error;

/// Failures that stop the server; request-level failures never get here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("base URL '{0}' must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
