//! Multipart file upload with progress reporting
//!
//! The file is held in memory and re-streamed on every attempt, so a retried
//! upload sends the full body again. Progress is derived from the bytes the
//! transport has pulled from the body stream.
//!
//! Reported percentages never decrease, stay below 100 while bytes are in
//! flight, and reach 100 only once the server has accepted the upload.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Body;

use crate::api::errors::ApiError;

const CHUNK_SIZE: usize = 64 * 1024;

/// A file to upload under the multipart field `file`
#[derive(Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    bytes: Arc<Vec<u8>>,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), mime_type: None, bytes: Arc::new(bytes) }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Build a fresh multipart form for one attempt.
    pub(crate) fn form(
        &self,
        extra_fields: &[(String, String)],
        progress: Option<&UploadProgress>,
    ) -> Result<Form, ApiError> {
        let total = self.bytes.len();
        let chunks: Vec<Vec<u8>> = self.bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let tracker = progress.cloned();
        let mut sent = 0_usize;

        let body_stream = stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            if let Some(tracker) = &tracker {
                tracker.report_in_flight(sent, total);
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        });

        let mut part = Part::stream_with_length(Body::wrap_stream(body_stream), total as u64)
            .file_name(self.file_name.clone());
        if let Some(mime) = &self.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|err| ApiError::Config(format!("invalid mime type '{mime}': {err}")))?;
        }

        let form = extra_fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));
        Ok(form.part("file", part))
    }
}

type ProgressFn = dyn Fn(u8) + Send + Sync;

struct ProgressInner {
    callback: Box<ProgressFn>,
    reported: AtomicU8,
}

/// Monotone percentage reporter shared across upload attempts
#[derive(Clone)]
pub struct UploadProgress {
    inner: Arc<ProgressInner>,
}

impl fmt::Debug for UploadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadProgress").field("reported", &self.last_reported()).finish()
    }
}

impl UploadProgress {
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ProgressInner { callback: Box::new(callback), reported: AtomicU8::new(0) }),
        }
    }

    /// Highest percentage reported so far
    pub fn last_reported(&self) -> u8 {
        self.inner.reported.load(Ordering::SeqCst)
    }

    fn report_in_flight(&self, sent: usize, total: usize) {
        let percent = if total == 0 { 0 } else { (sent.saturating_mul(100) / total).min(99) };
        self.report(u8::try_from(percent).unwrap_or(99));
    }

    pub(crate) fn complete(&self) {
        self.report(100);
    }

    // Emit only strictly higher values.
    fn report(&self, percent: u8) {
        let previous = self.inner.reported.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            (self.inner.callback)(percent);
        }
    }
}
