use crate::config::Config;
use crate::context::RootContext;
use crate::error::{FrontendError, Result};
use crate::frontend::session::TransformSession;
use crate::frontend::{BuildClient, BuildEngine, DockerfileHook};
use crate::transform::TransformInvoker;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Build frontend: relay + transform hook in front of a Dockerfile build engine.
pub struct Frontend<E> {
    engine: E,
    config: Config,
}

impl<E: BuildEngine> Frontend<E> {
    pub fn new(engine: E, config: Config) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one build.
    ///
    /// 1. serialize the build options
    /// 2. start the transform session (binds the relay)
    /// 3. install the transform as the Dockerfile hook
    /// 4. delegate to the engine; its result or error is returned unchanged
    pub async fn run_build(&self, ctx: &RootContext, client: Arc<dyn BuildClient>) -> Result<E::Output> {
        let options: Arc<str> = client
            .build_options()
            .to_json()
            .map_err(|e| FrontendError::SetupError(format!("Failed to serialize build options: {}", e)))?
            .into();

        let session = TransformSession::start(ctx, &self.config, options, Arc::clone(&client)).await?;
        info!(relay = %session.relay_addr(), program = %self.config.transform.program, "transform session started");

        let invoker = Arc::new(session.invoker(&self.config.transform));
        if let Err(e) = client.install_dockerfile_hook(transform_hook(invoker, ctx.clone())).await {
            session.close().await;
            return Err(FrontendError::SetupError(format!("Failed to install Dockerfile hook: {}", e)));
        }

        let result = self.engine.build(ctx, client).await;

        session.close().await;
        debug!(success = result.is_ok(), "build finished");

        result
    }
}

/// Wrap the invoker as the engine-facing Dockerfile hook, bound to the build context.
pub fn transform_hook(invoker: Arc<TransformInvoker>, ctx: RootContext) -> DockerfileHook {
    Arc::new(move |dockerfile: Vec<u8>| {
        let invoker = Arc::clone(&invoker);
        let ctx = ctx.clone();
        async move { invoker.transform(&ctx, dockerfile).await }.boxed()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::BuildContext;
    use crate::frontend::{BuildOptions, ContextResolver};
    use crate::relay::RelayClient;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use tokio::sync::RwLock;

    /// In-memory build client
    struct MemoryClient {
        options: BuildOptions,
        files: HashMap<(String, String), Vec<u8>>,
        hook: RwLock<Option<DockerfileHook>>,
        reject_hook: bool,
    }

    impl MemoryClient {
        fn new(options: BuildOptions) -> Self {
            Self {
                options,
                files: HashMap::new(),
                hook: RwLock::new(None),
                reject_hook: false,
            }
        }

        fn with_file(mut self, context: &str, filename: &str, content: &[u8]) -> Self {
            self.files
                .insert((context.to_string(), filename.to_string()), content.to_vec());
            self
        }
    }

    #[async_trait]
    impl ContextResolver for MemoryClient {
        async fn read_file(&self, _ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>> {
            self.files
                .get(&(context.to_string(), filename.to_string()))
                .cloned()
                .ok_or_else(|| FrontendError::resolution(context, filename, "not found"))
        }
    }

    #[async_trait]
    impl BuildClient for MemoryClient {
        fn build_options(&self) -> &BuildOptions {
            &self.options
        }

        async fn install_dockerfile_hook(&self, hook: DockerfileHook) -> Result<()> {
            if self.reject_hook {
                return Err(FrontendError::DownstreamError("hooks unsupported".to_string()));
            }
            *self.hook.write().await = Some(hook);
            Ok(())
        }

        async fn dockerfile_hook(&self) -> Option<DockerfileHook> {
            self.hook.read().await.clone()
        }
    }

    /// Engine that reads `Dockerfile` from `main` and runs it through the hook.
    #[derive(Default)]
    struct HookEngine {
        invoked: AtomicBool,
    }

    #[async_trait]
    impl BuildEngine for HookEngine {
        type Output = Vec<u8>;

        async fn build(&self, ctx: &RootContext, client: Arc<dyn BuildClient>) -> Result<Vec<u8>> {
            self.invoked.store(true, Ordering::SeqCst);
            let dockerfile = client.read_file(ctx, "main", "Dockerfile").await?;
            match client.dockerfile_hook().await {
                Some(hook) => hook(dockerfile).await,
                None => Ok(dockerfile),
            }
        }
    }

    fn frontend_with_script(body: &str) -> (TempDir, Frontend<HookEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("transform.sh");
        std::fs::write(&script, body).unwrap();

        let mut config = Config::default();
        config.transform.program = "sh".to_string();
        config.transform.subcommand = script.display().to_string();

        (dir, Frontend::new(HookEngine::default(), config))
    }

    #[tokio::test]
    async fn test_echo_transform_reaches_engine() {
        let (_dir, frontend) = frontend_with_script("test \"$1\" = '{\"target\":\"final\"}' || exit 9\ncat\n");
        let client = Arc::new(
            MemoryClient::new(BuildOptions::from_pairs([("target", "final")]))
                .with_file("main", "Dockerfile", b"FROM scratch"),
        );

        let output = frontend.run_build(&RootContext::new(), client).await.unwrap();
        assert_eq!(output, b"FROM scratch");
    }

    #[tokio::test]
    async fn test_transform_failure_message() {
        let (_dir, frontend) = frontend_with_script("printf 'syntax error at line 3' >&2\nexit 1\n");
        let client = Arc::new(
            MemoryClient::new(BuildOptions::default()).with_file("main", "Dockerfile", b"FROM scratch"),
        );

        let err = frontend.run_build(&RootContext::new(), client).await.unwrap_err();
        assert_eq!(err.to_string(), "syntax error at line 3");
    }

    #[tokio::test]
    async fn test_hook_install_failure_skips_engine() {
        let (_dir, frontend) = frontend_with_script("cat\n");
        let mut client = MemoryClient::new(BuildOptions::default());
        client.reject_hook = true;

        let err = frontend.run_build(&RootContext::new(), Arc::new(client)).await.unwrap_err();
        assert!(matches!(err, FrontendError::SetupError(_)));
        assert!(!frontend.engine.invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_bind_failure_skips_engine() {
        let (_dir, mut frontend) = frontend_with_script("cat\n");
        frontend.config.relay.bind_addr = "not-an-address".to_string();
        let client = Arc::new(MemoryClient::new(BuildOptions::default()));

        let err = frontend.run_build(&RootContext::new(), client).await.unwrap_err();
        assert!(matches!(err, FrontendError::SetupError(_)));
        assert!(!frontend.engine.invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_relay_closed_after_build() {
        let (_dir, frontend) = frontend_with_script("printf '%s' \"$DOCKERFILE_RELAY_ADDR\"\n");
        let client = Arc::new(
            MemoryClient::new(BuildOptions::default()).with_file("main", "Dockerfile", b"FROM scratch"),
        );

        let addr = frontend.run_build(&RootContext::new(), client).await.unwrap();
        let addr = String::from_utf8(addr).unwrap();
        assert!(addr.starts_with("127.0.0.1:"));

        // 빌드가 끝나면 relay listener도 닫혀야 함
        assert!(RelayClient::connect(&addr).await.is_err());
    }
}
