use crate::context::BuildContext;
use crate::error::Result;
use crate::frontend::{BuildClient, BuildOptions, ContextResolver, DockerfileHook};
use crate::local::resolver::LocalContextResolver;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Build client over local directories.
pub struct LocalClient {
    options: BuildOptions,
    resolver: LocalContextResolver,
    hook: RwLock<Option<DockerfileHook>>,
}

impl LocalClient {
    pub fn new(options: BuildOptions, resolver: LocalContextResolver) -> Self {
        Self {
            options,
            resolver,
            hook: RwLock::new(None),
        }
    }

    pub fn resolver(&self) -> &LocalContextResolver {
        &self.resolver
    }
}

#[async_trait]
impl ContextResolver for LocalClient {
    async fn read_file(&self, ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>> {
        self.resolver.read_file(ctx, context, filename).await
    }
}

#[async_trait]
impl BuildClient for LocalClient {
    fn build_options(&self) -> &BuildOptions {
        &self.options
    }

    async fn install_dockerfile_hook(&self, hook: DockerfileHook) -> Result<()> {
        *self.hook.write().await = Some(hook);
        Ok(())
    }

    async fn dockerfile_hook(&self) -> Option<DockerfileHook> {
        self.hook.read().await.clone()
    }
}
