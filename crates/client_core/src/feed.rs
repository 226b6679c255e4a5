//! Cursor-driven infinite feed over `GET /collection`.

use std::sync::Arc;

use shared::{
    domain::Cursor,
    protocol::{ImagePage, ImageRecord},
};
use tracing::{debug, info, warn};

use crate::{cache::FeedCache, collection::CollectionApi, error::OperationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    FetchingFirstPage,
    Idle {
        pages: Vec<ImagePage>,
    },
    FetchingNextPage {
        pages: Vec<ImagePage>,
    },
    /// Pages fetched before the failure are kept.
    Error {
        pages: Vec<ImagePage>,
        error: OperationError,
    },
}

impl FeedState {
    pub fn pages(&self) -> &[ImagePage] {
        match self {
            Self::FetchingFirstPage => &[],
            Self::Idle { pages } | Self::FetchingNextPage { pages } | Self::Error { pages, .. } => {
                pages
            }
        }
    }

    fn next_cursor(&self) -> Option<&Cursor> {
        self.pages().last().and_then(|page| page.after.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    Appended { items: usize },
    /// No continuation cursor, or the fetcher was not idle.
    Ignored,
    /// The cache was invalidated; pagination restarted from the first page.
    Restarted,
    Failed,
}

pub struct FeedFetcher {
    api: Arc<dyn CollectionApi>,
    cache: FeedCache,
    state: FeedState,
    view: Vec<ImageRecord>,
    seen_epoch: u64,
}

impl FeedFetcher {
    /// Starts in `FetchingFirstPage`; call [`FeedFetcher::mount`] to resolve it.
    pub fn new(api: Arc<dyn CollectionApi>, cache: FeedCache) -> Self {
        let seen_epoch = cache.epoch();
        Self {
            api,
            cache,
            state: FeedState::FetchingFirstPage,
            view: Vec::new(),
            seen_epoch,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Items of every fetched page in fetch order, as of the last `Idle`.
    pub fn view(&self) -> &[ImageRecord] {
        &self.view
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FeedState::FetchingFirstPage)
    }

    pub fn is_fetching_next_page(&self) -> bool {
        matches!(self.state, FeedState::FetchingNextPage { .. })
    }

    /// Drives the "load more" control: only idle feeds with a cursor qualify.
    pub fn has_next_page(&self) -> bool {
        matches!(self.state, FeedState::Idle { .. }) && self.state.next_cursor().is_some()
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(self.seen_epoch)
    }

    /// Discards every page and fetches the first one again.
    pub async fn mount(&mut self) -> &FeedState {
        self.seen_epoch = self.cache.epoch();
        self.state = FeedState::FetchingFirstPage;
        self.view.clear();
        info!(epoch = self.seen_epoch, "feed: fetching first page");

        let epoch = self.seen_epoch;
        let result = self.api.list_images(None).await;
        if self.cache.is_stale(epoch) {
            // Invalidated mid-flight; the next read remounts.
            debug!(epoch, "feed: discarding first page from a stale session");
            return &self.state;
        }

        self.state = match result {
            Ok(page) => {
                debug!(items = page.data.len(), last = page.is_last(), "feed: first page loaded");
                FeedState::Idle { pages: vec![page] }
            }
            Err(err) => {
                warn!("feed: first page failed: {err:#}");
                FeedState::Error {
                    pages: Vec::new(),
                    error: OperationError::feed_fetch_failed(&err),
                }
            }
        };
        self.rebuild_view();
        &self.state
    }

    pub async fn refresh(&mut self) -> &FeedState {
        self.mount().await
    }

    /// Current items, remounting first if the cache was invalidated or the
    /// first page never resolved.
    pub async fn read(&mut self) -> &[ImageRecord] {
        self.recover_abandoned_fetch();
        if self.is_stale() || matches!(self.state, FeedState::FetchingFirstPage) {
            self.mount().await;
        }
        &self.view
    }

    pub async fn load_more(&mut self) -> LoadMore {
        self.recover_abandoned_fetch();
        if self.is_stale() {
            self.mount().await;
            return LoadMore::Restarted;
        }

        let cursor = match &self.state {
            FeedState::Idle { pages } => match self.state.next_cursor() {
                Some(cursor) => cursor.clone(),
                None => {
                    debug!(pages = pages.len(), "feed: load more ignored, no cursor remains");
                    return LoadMore::Ignored;
                }
            },
            _ => {
                debug!("feed: load more ignored, fetcher not idle");
                return LoadMore::Ignored;
            }
        };

        let pages = self.take_pages();
        self.state = FeedState::FetchingNextPage { pages };
        info!(after = %cursor, "feed: fetching next page");

        let epoch = self.seen_epoch;
        let result = self.api.list_images(Some(&cursor)).await;
        let mut pages = self.take_pages();

        if self.cache.is_stale(epoch) {
            debug!(epoch, "feed: discarding next page from a stale session");
            self.state = FeedState::Idle { pages };
            return LoadMore::Ignored;
        }

        match result {
            Ok(page) => {
                let items = page.data.len();
                pages.push(page);
                debug!(items, pages = pages.len(), "feed: next page appended");
                self.state = FeedState::Idle { pages };
                self.rebuild_view();
                LoadMore::Appended { items }
            }
            Err(err) => {
                warn!("feed: next page failed, keeping {} pages: {err:#}", pages.len());
                self.state = FeedState::Error {
                    pages,
                    error: OperationError::feed_fetch_failed(&err),
                };
                LoadMore::Failed
            }
        }
    }

    fn take_pages(&mut self) -> Vec<ImagePage> {
        match std::mem::replace(&mut self.state, FeedState::FetchingFirstPage) {
            FeedState::FetchingFirstPage => Vec::new(),
            FeedState::Idle { pages }
            | FeedState::FetchingNextPage { pages }
            | FeedState::Error { pages, .. } => pages,
        }
    }

    fn rebuild_view(&mut self) {
        if let FeedState::Idle { pages } = &self.state {
            self.view = pages
                .iter()
                .flat_map(|page| page.data.iter().cloned())
                .collect();
        }
    }

    // A dropped `load_more` future leaves the state mid-fetch; fall back to the
    // pages that had settled.
    fn recover_abandoned_fetch(&mut self) {
        if let FeedState::FetchingNextPage { pages } = &mut self.state {
            let pages = std::mem::take(pages);
            self.state = FeedState::Idle { pages };
        }
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
