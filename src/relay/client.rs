use crate::error::{FrontendError, Result};
use crate::relay::protocol::{self, FileRequest};
use crate::relay::RELAY_ADDR_ENV;
use tokio::net::TcpStream;

/// Relay client (transform process 쪽에서 파일 요청 보내기)
///
/// One connection serves any number of sequential fetches.
pub struct RelayClient {
    stream: TcpStream,
}

impl RelayClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            FrontendError::RelayProtocolError(format!("Failed to connect to relay at {}: {}", addr, e))
        })?;
        let _ = stream.set_nodelay(true);

        Ok(Self { stream })
    }

    /// Connect to the relay address the frontend exported to this process.
    pub async fn from_env() -> Result<Self> {
        let addr = std::env::var(RELAY_ADDR_ENV).map_err(|_| {
            FrontendError::ConfigError(format!("{} is not set", RELAY_ADDR_ENV))
        })?;
        Self::connect(&addr).await
    }

    /// Fetch one file from a build context.
    ///
    /// A connection closed before a full response means the file could not be
    /// resolved or the relay failed; the two are indistinguishable.
    pub async fn fetch(&mut self, context: &str, filename: &str) -> Result<Vec<u8>> {
        let request = FileRequest::new(context, filename);
        protocol::write_request(&mut self.stream, &request).await?;

        match protocol::read_response(&mut self.stream).await {
            Ok(Some(content)) => Ok(content),
            Ok(None) | Err(FrontendError::RelayProtocolError(_)) | Err(FrontendError::IoError(_)) => {
                Err(FrontendError::resolution(
                    context,
                    filename,
                    "relay closed the connection without a response (file not found or relay error)",
                ))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BuildContext, RootContext};
    use crate::frontend::ContextResolver;
    use crate::relay::server::{self, RelayLimits};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoResolver;

    #[async_trait]
    impl ContextResolver for EchoResolver {
        async fn read_file(&self, _ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>> {
            if filename == "missing" {
                return Err(FrontendError::resolution(context, filename, "not found"));
            }
            Ok(format!("{}:{}", context, filename).into_bytes())
        }
    }

    #[tokio::test]
    async fn test_fetch_reuses_connection() {
        let ctx = RootContext::new();
        let handle = server::start("127.0.0.1:0", Arc::new(EchoResolver), &ctx, RelayLimits::default())
            .await
            .unwrap();

        let mut client = RelayClient::connect(&handle.local_addr().to_string()).await.unwrap();
        assert_eq!(client.fetch("main", "a.inc").await.unwrap(), b"main:a.inc");
        assert_eq!(client.fetch("assets", "b.inc").await.unwrap(), b"assets:b.inc");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_fetch_missing_is_resolution_error() {
        let ctx = RootContext::new();
        let handle = server::start("127.0.0.1:0", Arc::new(EchoResolver), &ctx, RelayLimits::default())
            .await
            .unwrap();

        let mut client = RelayClient::connect(&handle.local_addr().to_string()).await.unwrap();
        let err = client.fetch("main", "missing").await.unwrap_err();
        assert!(matches!(err, FrontendError::ResolutionError { .. }));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(RelayClient::connect(&addr).await.is_err());
    }
}
