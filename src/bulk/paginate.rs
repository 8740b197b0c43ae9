//! Paginated bulk enumeration.
//!
//! Drains a cursor-paged listing into one ordered `Vec`, following page
//! tokens until the backend stops returning one.

use async_trait::async_trait;
use tracing::debug;

use super::error::{BulkError, BulkResult};
use crate::backend::BackendResult;

/// Page size used by bulk operations.
pub const BULK_PAGE_SIZE: u32 = 1000;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation cursor. `None` or empty ends the listing.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// The cursor for the following page, if there is one.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// A listing that can be fetched one page at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Fetch the page following `page_token` (`None` for the first page).
    async fn fetch_page(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<Self::Item>>;
}

/// Fetch every item of `source`, preserving server order.
///
/// An empty first page yields an empty result.
pub async fn enumerate_all<S>(source: &S, page_size: u32) -> BulkResult<Vec<S::Item>>
where
    S: PageSource + ?Sized,
{
    if page_size == 0 {
        return Err(BulkError::invalid("page size must be at least 1"));
    }

    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(page_size, token.as_deref()).await?;
        pages += 1;
        debug!(page = pages, items = page.items.len(), "Fetched page");

        let next = page.continuation().map(str::to_string);
        items.extend(page.items);

        match next {
            Some(t) => token = Some(t),
            None => break,
        }
    }

    Ok(items)
}
