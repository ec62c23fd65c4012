//! Relay wire format.
//!
//! ```text
//! Request:  [u32 big-endian length N][N bytes: JSON {"context": string, "filename": string}]
//! Response: [u32 big-endian length M][M bytes: raw file content]
//! ```
//!
//! There is no error frame. A peer that sees the connection close before a full
//! response must treat it as "file not found or relay error".

use crate::error::{FrontendError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix preceding every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest request body the relay accepts by default.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Transform process가 relay에 보내는 파일 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequest {
    /// 읽을 빌드 컨텍스트 이름 (예: "main")
    pub context: String,
    /// 컨텍스트 안의 파일 경로 패턴
    pub filename: String,
}

impl FileRequest {
    pub fn new(context: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            filename: filename.into(),
        }
    }

    /// JSON으로 직렬화
    pub fn to_json(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// JSON에서 역직렬화
    pub fn from_json(json: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

/// Reads one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closes the stream cleanly before sending any byte
/// of the next length prefix. A prefix larger than `max_len` is rejected before the
/// body is read.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;

    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrontendError::RelayProtocolError(format!(
                "truncated length prefix ({} of {} bytes)",
                filled, LENGTH_PREFIX_LEN
            )));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(FrontendError::RelayProtocolError(format!(
            "frame of {} bytes exceeds limit of {} bytes",
            len, max_len
        )));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        FrontendError::RelayProtocolError(format!("truncated frame body ({} bytes declared): {}", len, e))
    })?;

    Ok(Some(buf))
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| {
        FrontendError::RelayProtocolError(format!(
            "payload of {} bytes does not fit a 4-byte length prefix",
            payload.len()
        ))
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;

    Ok(())
}

/// Reads the next request; `Ok(None)` when the peer is done.
pub async fn read_request<R>(reader: &mut R, max_len: usize) -> Result<Option<FileRequest>>
where
    R: AsyncRead + Unpin,
{
    let Some(body) = read_frame(reader, max_len).await? else {
        return Ok(None);
    };

    let request = FileRequest::from_json(&body)
        .map_err(|e| FrontendError::RelayProtocolError(format!("invalid request payload: {}", e)))?;

    Ok(Some(request))
}

pub async fn write_request<W>(writer: &mut W, request: &FileRequest) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = request.to_json()?;
    write_frame(writer, &body).await
}

/// Writes the raw file content as a response frame.
pub async fn write_response<W>(writer: &mut W, content: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, content).await
}

/// Reads a response frame of any size; `Ok(None)` if the relay closed the connection first.
pub async fn read_response<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader, u32::MAX as usize).await
}
