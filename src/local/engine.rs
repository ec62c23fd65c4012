use crate::context::RootContext;
use crate::error::{FrontendError, Result};
use crate::frontend::{BuildClient, BuildEngine};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Effective Dockerfile produced by [`RenderEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub dockerfile: Vec<u8>,
    /// Whether a Dockerfile hook rewrote the original text
    pub transformed: bool,
}

/// Engine stand-in that stops where a real engine would start parsing:
/// it loads the Dockerfile, applies the installed hook and returns the result.
#[derive(Debug, Clone)]
pub struct RenderEngine {
    context: String,
    dockerfile: String,
}

impl RenderEngine {
    pub fn new(context: impl Into<String>, dockerfile: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            dockerfile: dockerfile.into(),
        }
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new("main", "Dockerfile")
    }
}

#[async_trait]
impl BuildEngine for RenderEngine {
    type Output = RenderOutput;

    async fn build(&self, ctx: &RootContext, client: Arc<dyn BuildClient>) -> Result<RenderOutput> {
        let original = client
            .read_file(ctx, &self.context, &self.dockerfile)
            .await
            .map_err(|e| {
                if matches!(e, FrontendError::ResolutionError { .. }) {
                    FrontendError::DownstreamError(format!("Failed to read Dockerfile: {}", e))
                } else {
                    e
                }
            })?;

        let Some(hook) = client.dockerfile_hook().await else {
            return Ok(RenderOutput {
                dockerfile: original,
                transformed: false,
            });
        };

        let dockerfile = hook(original).await?;
        info!(bytes = dockerfile.len(), "Dockerfile rewritten");

        Ok(RenderOutput {
            dockerfile,
            transformed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::BuildOptions;
    use crate::local::{LocalClient, LocalContextResolver};

    #[tokio::test]
    async fn test_render_without_hook() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.Dockerfile"), "FROM alpine").unwrap();

        let client = Arc::new(LocalClient::new(
            BuildOptions::default(),
            LocalContextResolver::new().with_context("src", dir.path()),
        ));
        let engine = RenderEngine::new("src", "app.Dockerfile");

        let output = engine.build(&RootContext::new(), client).await.unwrap();
        assert_eq!(output.dockerfile, b"FROM alpine");
        assert!(!output.transformed);
    }

    #[tokio::test]
    async fn test_missing_dockerfile_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(LocalClient::new(
            BuildOptions::default(),
            LocalContextResolver::new().with_context("main", dir.path()),
        ));

        let err = RenderEngine::default()
            .build(&RootContext::new(), client)
            .await
            .unwrap_err();
        assert!(matches!(err, FrontendError::DownstreamError(_)));
    }
}
