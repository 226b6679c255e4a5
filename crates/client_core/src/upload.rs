use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream;
use reqwest::{Body, Client};
use shared::protocol::UploadResponse;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::{collection::ensure_success, config::Settings, form::ImageFile};

/// Remote and local urls for the image selected in the current attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadState {
    pub remote_url: Option<String>,
    pub preview_url: Option<String>,
}

impl UploadState {
    pub fn clear(&mut self) {
        self.remote_url = None;
        self.preview_url = None;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        ((self.bytes_sent.min(self.bytes_total) * 100) / self.bytes_total) as u8
    }
}

/// Publishing side of the progress channel handed to adapters.
///
/// Only the reporter handed out by the latest [`ProgressReporter::next_upload`]
/// publishes; updates from reporters of earlier uploads are dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<UploadProgress>>,
    current: Arc<AtomicU64>,
    ticket: u64,
}

impl ProgressReporter {
    pub fn channel() -> (Self, watch::Receiver<UploadProgress>) {
        let (tx, rx) = watch::channel(UploadProgress::default());
        let reporter = Self {
            tx: Arc::new(tx),
            current: Arc::new(AtomicU64::new(0)),
            ticket: 0,
        };
        (reporter, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.tx.subscribe()
    }

    /// Silences every earlier reporter on this channel and clears the
    /// published progress.
    pub fn next_upload(&self) -> Self {
        let ticket = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.tx.send_replace(UploadProgress::default());
        Self {
            tx: Arc::clone(&self.tx),
            current: Arc::clone(&self.current),
            ticket,
        }
    }

    pub fn start(&self, bytes_total: u64) {
        self.publish(|progress| {
            *progress = UploadProgress {
                bytes_sent: 0,
                bytes_total,
            };
        });
    }

    pub fn advance(&self, bytes: u64) {
        self.publish(|progress| {
            progress.bytes_sent = (progress.bytes_sent + bytes).min(progress.bytes_total);
        });
    }

    pub fn finish(&self) {
        self.publish(|progress| progress.bytes_sent = progress.bytes_total);
    }

    pub fn reset(&self) {
        self.publish(|progress| *progress = UploadProgress::default());
    }

    fn publish(&self, update: impl FnOnce(&mut UploadProgress)) {
        // Checked under the channel's write lock so a concurrent
        // `next_upload` cannot interleave with a stale update.
        self.tx.send_if_modified(|progress| {
            if self.current.load(Ordering::Acquire) != self.ticket {
                return false;
            }
            update(progress);
            true
        });
    }
}

/// Turns a selected file into a durable url. One attempt, no retry.
#[async_trait]
pub trait UploadAdapter: Send + Sync {
    async fn upload(&self, file: &ImageFile, progress: &ProgressReporter) -> Result<String>;

    /// Whether re-sending the same bytes yields the same stored image. When
    /// false a failed upload discards the draft instead of keeping the file.
    fn is_idempotent(&self) -> bool {
        false
    }
}

pub struct HttpUploadAdapter {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
    chunk_bytes: usize,
}

impl HttpUploadAdapter {
    pub fn new(http: Client, endpoint: Url, api_key: Option<String>, chunk_bytes: usize) -> Self {
        Self {
            http,
            endpoint,
            api_key,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    pub fn from_settings(http: Client, settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            http,
            settings.upload_endpoint()?,
            settings.upload_api_key.clone(),
            settings.upload_chunk_bytes,
        ))
    }

    fn chunked_body(&self, file: &ImageFile, progress: &ProgressReporter) -> Body {
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(self.chunk_bytes)
            .map(<[u8]>::to_vec)
            .collect();
        let progress = progress.clone();
        let stream = stream::iter(chunks.into_iter().map(move |chunk| {
            progress.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        }));
        Body::wrap_stream(stream)
    }
}

#[async_trait]
impl UploadAdapter for HttpUploadAdapter {
    async fn upload(&self, file: &ImageFile, progress: &ProgressReporter) -> Result<String> {
        progress.start(file.size());
        info!(
            filename = %file.filename,
            mime_type = %file.mime_type,
            size_bytes = file.size(),
            "upload: sending image"
        );

        let mut query = vec![
            ("filename", file.filename.clone()),
            ("mime_type", file.mime_type.clone()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&query)
            .header(reqwest::header::CONTENT_TYPE, file.mime_type.as_str())
            .body(self.chunked_body(file, progress))
            .send()
            .await
            .context("upload request failed")?;
        let response = ensure_success(response).await.context("upload rejected")?;
        let body: UploadResponse = response
            .json()
            .await
            .context("upload response was not understood")?;

        let url = body.into_url();
        if url.trim().is_empty() {
            warn!(filename = %file.filename, "upload: service returned an empty url");
            return Err(anyhow!("upload service returned an empty url"));
        }

        progress.finish();
        debug!(filename = %file.filename, url = %url, "upload: stored");
        Ok(url)
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
