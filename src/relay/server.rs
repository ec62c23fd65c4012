use crate::config::RelayConfig;
use crate::context::{self, RelayReadContext, RootContext};
use crate::error::{FrontendError, Result};
use crate::frontend::ContextResolver;
use crate::relay::protocol::{self, DEFAULT_MAX_REQUEST_BYTES};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Backoff after running out of file descriptors, before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct RelayLimits {
    pub max_request_bytes: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl From<&RelayConfig> for RelayLimits {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_request_bytes: config.max_request_bytes,
        }
    }
}

/// File relay server
///
/// Transform process가 실행 중에 빌드 컨텍스트의 파일을 요청할 수 있도록
/// 빌드마다 하나씩 열리는 TCP listener입니다.
pub struct RelayServer<R: ?Sized> {
    listener: TcpListener,
    resolver: Arc<R>,
    limits: RelayLimits,
}

impl<R> RelayServer<R>
where
    R: ContextResolver + ?Sized + 'static,
{
    /// Bind the relay listener. Bind failures are setup errors and are not retried.
    pub async fn bind(addr: &str, resolver: Arc<R>, limits: RelayLimits) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            FrontendError::SetupError(format!("Failed to bind relay on {}: {}", addr, e))
        })?;

        Ok(Self {
            listener,
            resolver,
            limits,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start accepting in the background.
    ///
    /// The accept loop runs on a child of `ctx`: it stops when the build context is
    /// done or the returned handle is shut down or dropped.
    pub fn start(self, ctx: &RootContext) -> Result<RelayHandle> {
        let addr = self.local_addr()?;
        let ctx = ctx.child();
        let shutdown = ctx.clone();

        let task = tokio::spawn(accept_loop(self.listener, self.resolver, ctx, self.limits));

        info!(%addr, "relay listening");

        Ok(RelayHandle {
            addr,
            shutdown,
            task: Some(task),
        })
    }
}

/// Bind and start a relay in one step.
pub async fn start<R>(
    addr: &str,
    resolver: Arc<R>,
    ctx: &RootContext,
    limits: RelayLimits,
) -> Result<RelayHandle>
where
    R: ContextResolver + ?Sized + 'static,
{
    RelayServer::bind(addr, resolver, limits).await?.start(ctx)
}

/// Running relay. Dropping the handle stops the accept loop.
#[derive(Debug)]
pub struct RelayHandle {
    addr: SocketAddr,
    shutdown: RootContext,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop accepting, close every open relay connection and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "relay accept loop ended abnormally");
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept_loop<R>(listener: TcpListener, resolver: Arc<R>, ctx: RootContext, limits: RelayLimits)
where
    R: ContextResolver + ?Sized + 'static,
{
    let mut connections = JoinSet::new();

    loop {
        // 끝난 연결 핸들러 정리
        while connections.try_join_next().is_some() {}

        let accepted = tokio::select! {
            _ = context::done(&ctx) => {
                debug!("build context done, relay stops accepting");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let resolver = Arc::clone(&resolver);
                let ctx = ctx.clone();

                // 각 연결을 별도 태스크로 처리
                connections.spawn(handle_connection(stream, peer, resolver, ctx, limits));
            }
            Err(e) if is_transient_accept_error(&e) => {
                warn!(error = %e, "transient relay accept error");
                if is_fd_exhaustion(&e) {
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
            Err(e) => {
                error!(error = %e, "relay listener failed, no further requests will be served");
                break;
            }
        }
    }

    // Aborting the handlers drops their streams, closing every open connection.
    connections.shutdown().await;
    debug!("relay accept loop stopped");
}

/// Serve requests on one connection, strictly in order, until the peer leaves or something fails.
async fn handle_connection<R>(
    mut stream: TcpStream,
    peer: SocketAddr,
    resolver: Arc<R>,
    ctx: RootContext,
    limits: RelayLimits,
) where
    R: ContextResolver + ?Sized,
{
    let _ = stream.set_nodelay(true);
    debug!(%peer, "relay connection accepted");

    let mut served = 0usize;
    loop {
        let request = match protocol::read_request(&mut stream, limits.max_request_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "closing relay connection");
                break;
            }
        };

        let read_ctx = RelayReadContext::new(&ctx);
        let resolved = context::run_bounded(
            &read_ctx,
            resolver.read_file(&read_ctx, &request.context, &request.filename),
        )
        .await;

        let content = match resolved {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    %peer,
                    context = %request.context,
                    filename = %request.filename,
                    error = %e,
                    "relay resolution failed, closing connection"
                );
                break;
            }
        };

        if let Err(e) = protocol::write_response(&mut stream, &content).await {
            warn!(%peer, error = %e, "failed to write relay response");
            break;
        }

        served += 1;
        debug!(
            %peer,
            context = %request.context,
            filename = %request.filename,
            bytes = content.len(),
            "relay request served"
        );
    }

    debug!(%peer, served, "relay connection closed");
}

fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory
    ) || is_fd_exhaustion(e)
}

/// ENFILE / EMFILE
fn is_fd_exhaustion(e: &io::Error) -> bool {
    cfg!(unix) && matches!(e.raw_os_error(), Some(23) | Some(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildContext;
    use crate::relay::protocol::{write_request, FileRequest};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    struct MapResolver(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ContextResolver for MapResolver {
        async fn read_file(&self, _ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>> {
            self.0
                .get(&format!("{}/{}", context, filename))
                .cloned()
                .ok_or_else(|| FrontendError::resolution(context, filename, "not found"))
        }
    }

    fn resolver() -> Arc<MapResolver> {
        let mut files = HashMap::new();
        files.insert("main/base.inc".to_string(), b"ARG X=1".to_vec());
        Arc::new(MapResolver(files))
    }

    #[test]
    fn test_transient_accept_errors() {
        assert!(is_transient_accept_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_transient_accept_error(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient_accept_error(&io::Error::from(io::ErrorKind::InvalidInput)));
        #[cfg(unix)]
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(24)));
    }

    #[tokio::test]
    async fn test_bind_failure_is_setup_error() {
        let result = RelayServer::bind("not-an-address", resolver(), RelayLimits::default()).await;
        assert!(matches!(result, Err(FrontendError::SetupError(_))));
    }

    #[tokio::test]
    async fn test_serves_file() {
        let ctx = RootContext::new();
        let handle = start("127.0.0.1:0", resolver(), &ctx, RelayLimits::default())
            .await
            .unwrap();

        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        write_request(&mut stream, &FileRequest::new("main", "base.inc")).await.unwrap();

        let mut len = [0u8; 4];
        stream.read_exact(&mut len).await.unwrap();
        assert_eq!(u32::from_be_bytes(len), 7);

        let mut body = [0u8; 7];
        stream.read_exact(&mut body).await.unwrap();
        assert_eq!(&body, b"ARG X=1");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_file_closes_without_response() {
        let ctx = RootContext::new();
        let handle = start("127.0.0.1:0", resolver(), &ctx, RelayLimits::default())
            .await
            .unwrap();

        let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
        write_request(&mut stream, &FileRequest::new("main", "missing.inc")).await.unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_context_cancel_stops_accept_loop() {
        let ctx = RootContext::new();
        let handle = start("127.0.0.1:0", resolver(), &ctx, RelayLimits::default())
            .await
            .unwrap();

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("accept loop should stop after cancellation");
    }
}
