pub mod client;
pub mod protocol;
pub mod server;

pub use client::RelayClient;
pub use protocol::FileRequest;
pub use server::{RelayHandle, RelayLimits, RelayServer};

/// Environment variable carrying the relay's `host:port` into the transform process.
pub const RELAY_ADDR_ENV: &str = "DOCKERFILE_RELAY_ADDR";
