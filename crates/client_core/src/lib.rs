use std::sync::Arc;

use anyhow::Result;

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod feed;
pub mod form;
pub mod mutation;
pub mod notify;
pub mod submission;
pub mod upload;
pub mod validation;

pub use cache::FeedCache;
pub use collection::{CollectionApi, HttpCollectionClient};
pub use config::{load_settings, Settings};
pub use error::{OperationError, ValidationError, ValidationErrors};
pub use feed::{FeedFetcher, FeedState, LoadMore};
pub use form::{FormDraft, ImageFile};
pub use mutation::CreateRecordMutation;
pub use notify::{ChannelNotifier, LogNotifier, Notification, NotificationKind, Notifier};
pub use submission::{Settlement, SubmissionForm, SubmissionState, SubmitOutcome, UploadOutcome};
pub use upload::{HttpUploadAdapter, ProgressReporter, UploadAdapter, UploadProgress, UploadState};

/// Wires the collection service, upload adapter and shared feed cache
/// together for one browsing session.
#[derive(Clone)]
pub struct GalleryClient {
    api: Arc<dyn CollectionApi>,
    uploader: Arc<dyn UploadAdapter>,
    cache: FeedCache,
}

impl GalleryClient {
    pub fn new(api: Arc<dyn CollectionApi>, uploader: Arc<dyn UploadAdapter>) -> Self {
        Self {
            api,
            uploader,
            cache: FeedCache::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = settings.http_client()?;
        let api = HttpCollectionClient::from_settings(http.clone(), settings)?;
        let uploader = HttpUploadAdapter::from_settings(http, settings)?;
        Ok(Self::new(Arc::new(api), Arc::new(uploader)))
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    pub fn feed(&self) -> FeedFetcher {
        FeedFetcher::new(Arc::clone(&self.api), self.cache.clone())
    }

    pub fn create_record(&self) -> CreateRecordMutation {
        CreateRecordMutation::new(Arc::clone(&self.api), self.cache.clone())
    }

    pub fn submission_form(&self, notifier: Arc<dyn Notifier>) -> SubmissionForm {
        SubmissionForm::new(Arc::clone(&self.uploader), self.create_record(), notifier)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
