//! Build-scoped cancellation, deadline and value lookup.
//!
//! Every build runs under a [`RootContext`]. Reads made by the file relay on behalf
//! of a transform process go through a [`RelayReadContext`], which reports
//! [`ReadOrigin::Relay`] and forwards everything else to its parent.

use crate::error::{FrontendError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Who issued a context read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// Ordinary build-graph read (e.g. the engine loading the Dockerfile)
    Build,
    /// Read issued by the relay for a running transform process
    Relay,
}

/// Capabilities shared by every build context.
pub trait BuildContext: Send + Sync {
    fn deadline(&self) -> Option<Instant>;

    fn cancellation(&self) -> &CancellationToken;

    fn value(&self, key: &str) -> Option<&str>;

    fn origin(&self) -> ReadOrigin {
        ReadOrigin::Build
    }

    /// `Some` once the context is done: cancelled, or past its deadline.
    fn err(&self) -> Option<FrontendError> {
        if self.cancellation().is_cancelled() {
            return Some(FrontendError::Cancelled);
        }
        match self.deadline() {
            Some(deadline) if Instant::now() >= deadline => Some(FrontendError::DeadlineExceeded),
            _ => None,
        }
    }
}

/// 빌드 하나의 최상위 컨텍스트
#[derive(Debug, Clone, Default)]
pub struct RootContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<HashMap<String, String>>,
}

impl RootContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a deadline relative to now. An earlier existing deadline wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    /// Derived context: cancelled with its parent, but can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl BuildContext for RootContext {
    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Wraps the build context for reads the relay performs on behalf of a transform.
pub struct RelayReadContext<'a> {
    parent: &'a dyn BuildContext,
}

impl<'a> RelayReadContext<'a> {
    pub fn new(parent: &'a dyn BuildContext) -> Self {
        Self { parent }
    }
}

impl BuildContext for RelayReadContext<'_> {
    fn deadline(&self) -> Option<Instant> {
        self.parent.deadline()
    }

    fn cancellation(&self) -> &CancellationToken {
        self.parent.cancellation()
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.parent.value(key)
    }

    fn origin(&self) -> ReadOrigin {
        ReadOrigin::Relay
    }

    fn err(&self) -> Option<FrontendError> {
        self.parent.err()
    }
}

/// Resolves once the context is cancelled or its deadline passes.
pub async fn done(ctx: &dyn BuildContext) -> FrontendError {
    let deadline = async {
        match ctx.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctx.cancellation().cancelled() => FrontendError::Cancelled,
        _ = deadline => FrontendError::DeadlineExceeded,
    }
}

/// Runs `fut` unless the context finishes first.
pub async fn run_bounded<T, F>(ctx: &dyn BuildContext, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    tokio::select! {
        result = fut => result,
        err = done(ctx) => Err(err),
    }
}
