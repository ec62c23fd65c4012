//! Runs the external transform process that rewrites the Dockerfile.
//!
//! Contract with the process: `<program> <subcommand> <options-json>`, the original
//! Dockerfile on stdin, the rewritten Dockerfile on stdout, diagnostics on stderr,
//! exit status 0 on success.

use crate::config::TransformConfig;
use crate::context::{self, BuildContext};
use crate::error::{FrontendError, Result};
use crate::relay::RELAY_ADDR_ENV;
use std::io;
use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct TransformInvoker {
    program: String,
    subcommand: String,
    /// Serialized build options, passed verbatim as the last argument
    options: Arc<str>,
    relay_addr: Option<SocketAddr>,
}

impl TransformInvoker {
    pub fn new(config: &TransformConfig, options: Arc<str>) -> Self {
        Self {
            program: config.program.clone(),
            subcommand: config.subcommand.clone(),
            options,
            relay_addr: None,
        }
    }

    /// Export the relay address to the process environment.
    pub fn with_relay_addr(mut self, addr: SocketAddr) -> Self {
        self.relay_addr = Some(addr);
        self
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn relay_addr(&self) -> Option<SocketAddr> {
        self.relay_addr
    }

    /// Rewrite `original` through the transform process.
    ///
    /// Success is decided by the exit status alone: stdout is returned verbatim,
    /// even when empty. On failure the error is the process's stderr text exactly,
    /// or the raw exit status when stderr is empty. If `ctx` finishes first the
    /// process is killed.
    pub async fn transform(&self, ctx: &dyn BuildContext, original: Vec<u8>) -> Result<Vec<u8>> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let mut command = Command::new(&self.program);
        command
            .arg(&self.subcommand)
            .arg(&*self.options)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(addr) = self.relay_addr {
            command.env(RELAY_ADDR_ENV, addr.to_string());
        }

        debug!(program = %self.program, subcommand = %self.subcommand, input_bytes = original.len(), "spawning transform");

        let mut child = command.spawn().map_err(FrontendError::TransformIo)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FrontendError::TransformIo(io::Error::other("transform stdin was not captured")))?;

        // stdin은 별도 태스크에서 쓰기 (stdout 버퍼가 가득 차서 멈추는 것 방지)
        let feeder = tokio::spawn(async move {
            let result = stdin.write_all(&original).await;
            drop(stdin);
            result
        });

        // Dropping the wait future on cancellation drops the child, which kills it.
        let waited = context::run_bounded(ctx, async move {
            child.wait_with_output().await.map_err(FrontendError::TransformIo)
        })
        .await;

        let output = match waited {
            Ok(output) => output,
            Err(e) => {
                feeder.abort();
                if e.is_cancellation() {
                    warn!(program = %self.program, "transform aborted: {}", e);
                }
                return Err(e);
            }
        };

        let stdin_result = match feeder.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        };

        debug!(status = %output.status, output_bytes = output.stdout.len(), "transform exited");

        if !output.status.success() {
            if !output.stderr.is_empty() {
                return Err(FrontendError::TransformError(
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                ));
            }
            return Err(FrontendError::TransformExit(output.status));
        }

        match stdin_result {
            // The process is free to exit without reading all of its input.
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(FrontendError::TransformIo(e)),
            _ => Ok(output.stdout),
        }
    }
}
