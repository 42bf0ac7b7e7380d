use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("proxy server failed: {0}")]
    Serve(std::io::Error),

    #[error(transparent)]
    Client(#[from] macprov_api::Error),
}
