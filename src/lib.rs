pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::{BridgeError, GameHost, GameplayHandle, InputClock, Transport};
pub use frameworks::server::{build_bridge, run, run_with_config};
pub use interface_adapters::BridgeTransport;
pub use use_cases::{SessionCoordinator, SessionSettings};
