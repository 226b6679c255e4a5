use std::sync::Arc;

use shared::protocol::{CreateImageRequest, ImageRecord};
use tracing::{info, warn};

use crate::{cache::FeedCache, collection::CollectionApi, error::OperationError};

/// `POST /collection`, invalidating the cached feed on success only.
#[derive(Clone)]
pub struct CreateRecordMutation {
    api: Arc<dyn CollectionApi>,
    cache: FeedCache,
}

impl CreateRecordMutation {
    pub fn new(api: Arc<dyn CollectionApi>, cache: FeedCache) -> Self {
        Self { api, cache }
    }

    pub async fn execute(
        &self,
        url: &str,
        title: &str,
        description: &str,
    ) -> Result<ImageRecord, OperationError> {
        if url.trim().is_empty() {
            return Err(OperationError::MissingUpload);
        }

        let request = CreateImageRequest {
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        };
        match self.api.create_image(&request).await {
            Ok(record) => {
                info!(id = %record.id, "collection: image record created");
                self.cache.invalidate();
                Ok(record)
            }
            Err(err) => {
                warn!("collection: create image failed: {err:#}");
                Err(OperationError::submission_failed(&err))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
