//! Resumable video upload: start, budgeted transfer loop, finish.
//!
//! The server's offsets are authoritative. Every transfer re-reads the file
//! at the offset the server last asked for, so a rewind is as legal as an
//! advance; an offset outside the file is a protocol violation.

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::app::GraphApp;
use crate::client::GraphClient;
use crate::errors::{SDKError, SDKResult, value_as_u64};
use crate::request::{GraphFile, GraphRequest, ParamValue, Params, display_file_name};
use crate::token::AccessToken;

/// Server-negotiated position of an upload session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferChunk {
    pub upload_session_id: String,
    pub video_id: String,
    pub start_offset: u64,
    pub end_offset: u64,
}

impl TransferChunk {
    /// The server wants no more bytes.
    pub fn is_last_chunk(&self) -> bool {
        self.start_offset == self.end_offset
    }

    fn with_offsets(&self, start_offset: u64, end_offset: u64) -> Self {
        Self {
            start_offset,
            end_offset,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoUploadResult {
    pub video_id: String,
    pub success: bool,
    pub transfer_attempts: u32,
}

/// The file behind one upload call. Not shared.
#[derive(Debug)]
pub struct VideoFile {
    file: File,
    file_name: String,
    size: u64,
}

impl VideoFile {
    pub async fn open(path: impl AsRef<Path>) -> SDKResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self {
            file,
            file_name: display_file_name(path),
            size,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Bytes `[start, end)`.
    pub async fn read_chunk(&mut self, start: u64, end: u64) -> SDKResult<Bytes> {
        check_offsets(start, end, self.size)?;
        let len = usize::try_from(end - start)
            .map_err(|_| SDKError::UploadProtocol(format!("chunk of {} bytes is too large", end - start)))?;
        self.file.seek(SeekFrom::Start(start)).await?;
        let mut buffer = vec![0; len];
        self.file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}

fn check_offsets(start: u64, end: u64, file_size: u64) -> SDKResult<()> {
    if end < start {
        return Err(SDKError::UploadProtocol(format!(
            "server asked for a chunk ending at {end} before its start at {start}"
        )));
    }
    if end > file_size {
        return Err(SDKError::UploadProtocol(format!(
            "server asked for bytes up to offset {end} of a {file_size} byte file"
        )));
    }
    Ok(())
}

/// Drives the three upload phases against `/{target}/videos`.
pub struct ResumableUploader<'a> {
    client: &'a GraphClient,
    app: GraphApp,
    access_token: Option<AccessToken>,
    graph_version: String,
}

impl<'a> ResumableUploader<'a> {
    pub fn new(
        client: &'a GraphClient,
        app: GraphApp,
        access_token: Option<AccessToken>,
        graph_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            app,
            access_token,
            graph_version: graph_version.into(),
        }
    }

    pub async fn start(&self, target: &str, file_size: u64) -> SDKResult<TransferChunk> {
        let params = Params::from([
            ("upload_phase".to_string(), ParamValue::from("start")),
            ("file_size".to_string(), ParamValue::from(file_size)),
        ]);
        let body = self.post(target, params).await?;

        let upload_session_id = required_id(&body, "upload_session_id")?;
        let video_id = required_id(&body, "video_id").or_else(|_| required_id(&body, "file_id"))?;
        let (start_offset, end_offset) = required_offsets(&body)?;
        info!(
            target_id = target,
            video_id = %video_id,
            upload_session_id = %upload_session_id,
            file_size,
            "video upload session started"
        );
        Ok(TransferChunk {
            upload_session_id,
            video_id,
            start_offset,
            end_offset,
        })
    }

    /// One transfer attempt of `[chunk.start_offset, chunk.end_offset)`.
    pub async fn transfer(
        &self,
        target: &str,
        chunk: &TransferChunk,
        file: &mut VideoFile,
    ) -> SDKResult<TransferChunk> {
        let bytes = file.read_chunk(chunk.start_offset, chunk.end_offset).await?;
        debug!(
            target_id = target,
            start_offset = chunk.start_offset,
            end_offset = chunk.end_offset,
            "transferring video chunk"
        );
        let params = Params::from([
            ("upload_phase".to_string(), ParamValue::from("transfer")),
            (
                "upload_session_id".to_string(),
                ParamValue::from(chunk.upload_session_id.clone()),
            ),
            ("start_offset".to_string(), ParamValue::from(chunk.start_offset)),
            (
                "video_file_chunk".to_string(),
                ParamValue::File(GraphFile::video(file.file_name(), bytes)),
            ),
        ]);
        let body = self.post(target, params).await?;
        let (start_offset, end_offset) = required_offsets(&body)?;
        Ok(chunk.with_offsets(start_offset, end_offset))
    }

    /// Finish the session. Never retried.
    pub async fn finish(
        &self,
        target: &str,
        upload_session_id: &str,
        metadata: Params,
    ) -> SDKResult<bool> {
        let mut params = metadata;
        params.insert("upload_phase".to_string(), ParamValue::from("finish"));
        params.insert(
            "upload_session_id".to_string(),
            ParamValue::from(upload_session_id),
        );
        let body = self.post(target, params).await?;
        Ok(body.get("success").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Upload a whole file with at most `max_transfer_tries` transfer
    /// attempts. Every attempt counts, successful or not.
    ///
    /// When the budget runs out the last transfer error is returned as is;
    /// [`SDKError::RetryBudgetExhausted`] only when the last attempt
    /// succeeded but the server still wanted more.
    pub async fn upload(
        &self,
        target: &str,
        path: impl AsRef<Path>,
        metadata: Params,
        max_transfer_tries: u32,
    ) -> SDKResult<VideoUploadResult> {
        if max_transfer_tries == 0 {
            return Err(SDKError::validation(
                "max_transfer_tries must allow at least one transfer attempt",
            ));
        }
        let mut file = VideoFile::open(path).await?;
        let mut chunk = self.start(target, file.size()).await?;
        check_offsets(chunk.start_offset, chunk.end_offset, file.size())?;

        let mut attempts = 0u32;
        let mut last_error: Option<SDKError> = None;
        while !chunk.is_last_chunk() {
            if attempts == max_transfer_tries {
                warn!(
                    target_id = target,
                    attempts,
                    offset = chunk.start_offset,
                    "video transfer budget exhausted"
                );
                return Err(last_error.unwrap_or(SDKError::RetryBudgetExhausted {
                    budget: max_transfer_tries,
                    offset: chunk.start_offset,
                }));
            }
            attempts += 1;

            match self.transfer(target, &chunk, &mut file).await {
                Ok(next) => {
                    check_offsets(next.start_offset, next.end_offset, file.size())?;
                    chunk = next;
                    last_error = None;
                }
                Err(err) if err.is_transient_transfer_failure() => {
                    warn!(
                        target_id = target,
                        attempt = attempts,
                        max_transfer_tries,
                        offset = chunk.start_offset,
                        error = %err,
                        "video chunk transfer failed"
                    );
                    if let Some((start, end)) = err.resume_offsets() {
                        check_offsets(start, end, file.size())?;
                        chunk = chunk.with_offsets(start, end);
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let success = self
            .finish(target, &chunk.upload_session_id, metadata)
            .await?;
        info!(
            target_id = target,
            video_id = %chunk.video_id,
            transfer_attempts = attempts,
            success,
            "video upload finished"
        );
        Ok(VideoUploadResult {
            video_id: chunk.video_id,
            success,
            transfer_attempts: attempts,
        })
    }

    async fn post(&self, target: &str, params: Params) -> SDKResult<Value> {
        let request = GraphRequest::new(
            self.app.clone(),
            self.access_token.clone(),
            "POST",
            &format!("/{}/videos", target.trim_matches('/')),
            params,
            Some(&self.graph_version),
        )?;
        let response = self.client.send_request(&request).await?;
        Ok(response.decoded_body().clone())
    }
}

fn required_id(body: &Value, key: &str) -> SDKResult<String> {
    match body.get(key) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SDKError::UploadProtocol(format!(
            "upload reply is missing \"{key}\""
        ))),
    }
}

fn required_offsets(body: &Value) -> SDKResult<(u64, u64)> {
    let offset = |key: &str| {
        body.get(key).and_then(value_as_u64).ok_or_else(|| {
            SDKError::UploadProtocol(format!("upload reply is missing a numeric \"{key}\""))
        })
    };
    Ok((offset("start_offset")?, offset("end_offset")?))
}
