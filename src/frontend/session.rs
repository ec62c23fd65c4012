use crate::config::{Config, TransformConfig};
use crate::context::RootContext;
use crate::error::Result;
use crate::frontend::BuildClient;
use crate::relay::server::{self, RelayHandle, RelayLimits};
use crate::transform::TransformInvoker;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// State bound to one build: serialized options, the build client and the relay listener.
///
/// The owning build handler keeps the session alive for the whole build and closes
/// it when the build finishes, whatever the outcome.
pub struct TransformSession {
    options: Arc<str>,
    client: Arc<dyn BuildClient>,
    relay: RelayHandle,
}

impl TransformSession {
    /// Bind the relay for this build. Bind failures abort the build.
    pub async fn start(
        ctx: &RootContext,
        config: &Config,
        options: Arc<str>,
        client: Arc<dyn BuildClient>,
    ) -> Result<Self> {
        let relay = server::start(
            &config.relay.bind_addr,
            Arc::clone(&client),
            ctx,
            RelayLimits::from(&config.relay),
        )
        .await?;

        Ok(Self {
            options,
            client,
            relay,
        })
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn client(&self) -> &Arc<dyn BuildClient> {
        &self.client
    }

    pub fn relay_addr(&self) -> SocketAddr {
        self.relay.local_addr()
    }

    /// Invoker bound to this session's options and relay address.
    pub fn invoker(&self, config: &TransformConfig) -> TransformInvoker {
        TransformInvoker::new(config, Arc::clone(&self.options)).with_relay_addr(self.relay_addr())
    }

    /// Close the relay listener and every connection still open on it.
    pub async fn close(self) {
        let addr = self.relay.local_addr();
        self.relay.shutdown().await;
        debug!(%addr, "transform session closed");
    }
}
