use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontendError {
    /// 빌드 시작 전 단계의 실패 (옵션 직렬화, relay bind, hook 설치)
    #[error("Build setup failed: {0}")]
    SetupError(String),

    /// Transform process exited non-zero and wrote diagnostics; the message is its stderr verbatim.
    #[error("{0}")]
    TransformError(String),

    /// Transform process exited non-zero without any stderr output.
    #[error("{0}")]
    TransformExit(ExitStatus),

    /// Transform process could not be spawned, fed or waited on.
    #[error(transparent)]
    TransformIo(std::io::Error),

    #[error("Relay protocol error: {0}")]
    RelayProtocolError(String),

    #[error("Failed to resolve '{filename}' in context '{context}': {reason}")]
    ResolutionError {
        context: String,
        filename: String,
        reason: String,
    },

    #[error("Build engine error: {0}")]
    DownstreamError(String),

    #[error("Build cancelled")]
    Cancelled,

    #[error("Build deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FrontendError {
    pub fn resolution(context: &str, filename: &str, reason: impl Into<String>) -> Self {
        Self::ResolutionError {
            context: context.to_string(),
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }

    /// 빌드 컨텍스트 종료(취소 또는 deadline)로 인한 에러인지 여부
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, FrontendError>;
