use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{Cursor, ImageId},
    protocol::{CreateImageRequest, ImagePage, ImageRecord},
};
use tokio::sync::{Mutex, Notify};

use crate::{
    cache::FeedCache,
    collection::CollectionApi,
    form::ImageFile,
    notify::{Notification, Notifier},
    upload::{ProgressReporter, UploadAdapter},
};

pub(crate) fn record(id: &str) -> ImageRecord {
    ImageRecord {
        id: ImageId::new(id),
        title: format!("title {id}"),
        description: format!("description {id}"),
        url: format!("https://img.example/{id}.png"),
        created_at: Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(crate) fn page(ids: &[&str], after: Option<&str>) -> ImagePage {
    ImagePage {
        data: ids.iter().map(|id| record(id)).collect(),
        after: after.map(Cursor::new),
    }
}

pub(crate) fn png_file() -> ImageFile {
    ImageFile::new("pier.png", "image/png", vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4])
}

/// In-memory collection service answering list calls from a script.
#[derive(Default)]
pub(crate) struct ScriptedCollection {
    pages: Mutex<VecDeque<Result<ImagePage, String>>>,
    pub(crate) list_calls: Mutex<Vec<Option<Cursor>>>,
    pub(crate) created: Mutex<Vec<CreateImageRequest>>,
    create_error: Option<String>,
    invalidate_on_list_call: Option<(usize, FeedCache)>,
}

impl ScriptedCollection {
    pub(crate) fn with_pages(pages: Vec<Result<ImagePage, String>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_create(err: impl Into<String>) -> Self {
        Self {
            create_error: Some(err.into()),
            ..Self::default()
        }
    }

    /// Invalidates `cache` while serving the `call`-th (zero based) list request.
    pub(crate) fn invalidating_during_list_call(mut self, call: usize, cache: FeedCache) -> Self {
        self.invalidate_on_list_call = Some((call, cache));
        self
    }

    pub(crate) async fn push_page(&self, page: Result<ImagePage, String>) {
        self.pages.lock().await.push_back(page);
    }

    pub(crate) async fn create_count(&self) -> usize {
        self.created.lock().await.len()
    }
}

#[async_trait]
impl CollectionApi for ScriptedCollection {
    async fn list_images(&self, after: Option<&Cursor>) -> Result<ImagePage> {
        let call = {
            let mut calls = self.list_calls.lock().await;
            calls.push(after.cloned());
            calls.len() - 1
        };
        if let Some((target, cache)) = &self.invalidate_on_list_call {
            if *target == call {
                cache.invalidate();
            }
        }
        match self.pages.lock().await.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(err)) => Err(anyhow!(err)),
            None => Err(anyhow!("no scripted page left")),
        }
    }

    async fn create_image(&self, request: &CreateImageRequest) -> Result<ImageRecord> {
        if let Some(err) = &self.create_error {
            return Err(anyhow!(err.clone()));
        }
        let mut created = self.created.lock().await;
        created.push(request.clone());
        let mut stored = record(&format!("new-{}", created.len()));
        stored.url = request.url.clone();
        stored.title = request.title.clone();
        stored.description = request.description.clone();
        Ok(stored)
    }
}

pub(crate) struct TestUploader {
    result: Result<String, String>,
    idempotent: bool,
    gate: Option<Arc<Notify>>,
    pub(crate) calls: AtomicUsize,
}

impl TestUploader {
    pub(crate) fn ok(url: impl Into<String>) -> Self {
        Self {
            result: Ok(url.into()),
            idempotent: false,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(err: impl Into<String>) -> Self {
        Self {
            result: Err(err.into()),
            ..Self::ok("")
        }
    }

    pub(crate) fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Holds every upload until the gate is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadAdapter for TestUploader {
    async fn upload(&self, file: &ImageFile, progress: &ProgressReporter) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.start(file.size());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.result {
            Ok(url) => {
                progress.finish();
                Ok(url.clone())
            }
            Err(err) => Err(anyhow!(err.clone())),
        }
    }

    fn is_idempotent(&self) -> bool {
        self.idempotent
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) seen: std::sync::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .expect("notifier lock")
            .push(notification);
    }
}
