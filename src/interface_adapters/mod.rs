pub mod framing;
pub mod net;
pub mod protocol;
pub mod state;
pub mod transport;

pub use transport::BridgeTransport;
