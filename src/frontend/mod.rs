pub mod options;
pub mod orchestrator;
pub mod session;

use crate::context::{BuildContext, RootContext};
use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

pub use options::BuildOptions;
pub use orchestrator::Frontend;
pub use session::TransformSession;

/// Replacement for reading the Dockerfile text unmodified: original bytes in, rewritten bytes out.
pub type DockerfileHook = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<Vec<u8>>> + Send + Sync>;

/// Reads files out of a build's source contexts.
///
/// Implementations are shared by every relay connection of a build and must be
/// safe to call concurrently.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    /// Produce the bytes of `filename` as it exists in the source context `context`.
    async fn read_file(&self, ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>>;
}

/// Handle on the build engine for one build.
#[async_trait]
pub trait BuildClient: ContextResolver {
    /// Frontend options for this build
    fn build_options(&self) -> &BuildOptions;

    /// Install the hook the engine calls in place of reading the Dockerfile as-is.
    async fn install_dockerfile_hook(&self, hook: DockerfileHook) -> Result<()>;

    /// The installed hook, if any.
    async fn dockerfile_hook(&self) -> Option<DockerfileHook>;
}

/// The downstream Dockerfile build engine.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    type Output: Send;

    async fn build(&self, ctx: &RootContext, client: Arc<dyn BuildClient>) -> Result<Self::Output>;
}
