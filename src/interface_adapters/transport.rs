use crate::domain::{BridgeError, TelemetryFrame, Transport};
use crate::interface_adapters::net::{TransportClient, TransportServer};

/// The transport role chosen at startup. Exactly one is active per process.
pub enum BridgeTransport {
    Server(TransportServer),
    Client(TransportClient),
}

impl BridgeTransport {
    pub fn role(&self) -> &'static str {
        match self {
            BridgeTransport::Server(_) => "server",
            BridgeTransport::Client(_) => "client",
        }
    }
}

impl Transport for BridgeTransport {
    fn start(&self) -> Result<(), BridgeError> {
        match self {
            BridgeTransport::Server(server) => server.start(),
            BridgeTransport::Client(client) => client.start(),
        }
    }

    fn stop(&self) {
        match self {
            BridgeTransport::Server(server) => server.stop(),
            BridgeTransport::Client(client) => client.stop(),
        }
    }

    fn is_running(&self) -> bool {
        match self {
            BridgeTransport::Server(server) => server.is_running(),
            BridgeTransport::Client(client) => client.is_running(),
        }
    }

    fn publish(&self, frame: &TelemetryFrame) {
        match self {
            BridgeTransport::Server(server) => server.publish(frame),
            BridgeTransport::Client(client) => client.publish(frame),
        }
    }

    fn session_ended(&self) {
        match self {
            BridgeTransport::Server(server) => server.session_ended(),
            BridgeTransport::Client(client) => client.session_ended(),
        }
    }

    fn quiesce(&self) {
        match self {
            BridgeTransport::Server(server) => server.quiesce(),
            BridgeTransport::Client(client) => client.quiesce(),
        }
    }
}
