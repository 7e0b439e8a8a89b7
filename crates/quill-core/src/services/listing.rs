//! Paged listing of posts, newest first.

use std::sync::Arc;

use crate::domain::{Page, PageRequest, PostView};
use crate::error::DomainError;
use crate::ports::PostRepository;

use super::views::PostViewResolver;

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Read-only listing service.
#[derive(Clone)]
pub struct PostListing {
    posts: Arc<dyn PostRepository>,
    views: PostViewResolver,
    config: ListingConfig,
}

impl PostListing {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        views: PostViewResolver,
        config: ListingConfig,
    ) -> Self {
        Self {
            posts,
            views,
            config,
        }
    }

    /// List one page of posts.
    ///
    /// A page size of zero selects the default; larger sizes are capped.
    /// Out-of-range pages never fail: they yield no items, and the reported
    /// page number is clamped to `[1, total_pages]`.
    pub async fn list_posts(&self, page: u64, page_size: u64) -> Result<Page<PostView>, DomainError> {
        let page_size = match page_size {
            0 => self.config.default_page_size,
            n => n.min(self.config.max_page_size),
        }
        .max(1);

        let mut result = if page == 0 {
            let total = self.posts.count().await?;
            Page::new(Vec::new(), PageRequest::new(1, page_size), total)
        } else {
            self.posts.list(PageRequest::new(page, page_size)).await?
        };

        result.page = result.page.clamp(1, result.total_pages.max(1));
        tracing::debug!(
            page = result.page,
            page_size,
            total = result.total,
            returned = result.items.len(),
            "Listed posts"
        );

        let items = self.views.resolve_all(std::mem::take(&mut result.items)).await?;
        Ok(Page {
            items,
            page: result.page,
            page_size: result.page_size,
            total: result.total,
            total_pages: result.total_pages,
        })
    }
}
