use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::Cursor,
    error::ApiError,
    protocol::{CreateImageRequest, ImagePage, ImageRecord, ListImagesQuery},
};
use tracing::debug;
use url::Url;

use crate::config::Settings;

/// HTTP contract of the remote collection service.
#[async_trait]
pub trait CollectionApi: Send + Sync {
    async fn list_images(&self, after: Option<&Cursor>) -> Result<ImagePage>;
    async fn create_image(&self, request: &CreateImageRequest) -> Result<ImageRecord>;
}

pub struct HttpCollectionClient {
    http: Client,
    collection_url: Url,
}

impl HttpCollectionClient {
    pub fn new(http: Client, collection_url: Url) -> Self {
        Self {
            http,
            collection_url,
        }
    }

    pub fn from_settings(http: Client, settings: &Settings) -> Result<Self> {
        Ok(Self::new(http, settings.collection_url()?))
    }
}

#[async_trait]
impl CollectionApi for HttpCollectionClient {
    async fn list_images(&self, after: Option<&Cursor>) -> Result<ImagePage> {
        debug!(after = after.map(Cursor::as_str), "collection: listing images");
        let response = self
            .http
            .get(self.collection_url.clone())
            .query(&ListImagesQuery {
                after: after.cloned(),
            })
            .send()
            .await
            .context("collection listing request failed")?;
        ensure_success(response)
            .await?
            .json()
            .await
            .context("collection page was not understood")
    }

    async fn create_image(&self, request: &CreateImageRequest) -> Result<ImageRecord> {
        debug!(title = %request.title, "collection: creating image record");
        let response = self
            .http
            .post(self.collection_url.clone())
            .json(request)
            .send()
            .await
            .context("create image request failed")?;
        ensure_success(response)
            .await?
            .json()
            .await
            .context("created image record was not understood")
    }
}

/// Maps a non-2xx response to an error carrying the service's own message
/// when the body is a recognizable `ApiError`.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!(%status, "collection: failed to read error body: {err}");
            String::new()
        }
    };
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => Err(anyhow!(api_error).context(format!("service responded {status}"))),
        Err(_) => Err(anyhow!("service responded {status}")),
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
