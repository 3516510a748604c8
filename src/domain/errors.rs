// Bridge-level errors surfaced to the embedding game.

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("transport runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("bridge is not initialized")]
    NotInitialized,
    #[error("bridge has been shut down")]
    ShutDown,
}
