//! Page-by-page listing as a lazy stream
//!
//! Providers describe how to fetch one page and where the next one is; the
//! stream keeps asking until a page reports no successor. Creating a new
//! stream restarts from the first page.

use anyhow::Result;
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// One fetched page and the cursor of the page after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<u32>) -> Self {
        Self { items, next }
    }

    /// Page whose successor is known only by being full
    pub fn sized(items: Vec<T>, page: u32, per_page: usize) -> Self {
        let next = (items.len() >= per_page && per_page > 0).then_some(page + 1);
        Self { items, next }
    }
}

/// Lazy stream of pages, starting at `first`
pub fn pages<T, F, Fut>(first: u32, fetch: F) -> impl Stream<Item = Result<Vec<T>>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    stream::try_unfold(Some(first), move |cursor| {
        let next_page = cursor.map(&fetch);
        async move {
            let Some(fut) = next_page else {
                return Ok::<_, anyhow::Error>(None);
            };
            let page = fut.await?;
            Ok(Some((page.items, page.next)))
        }
    })
}

/// Drain every page into one list; any page error fails the whole listing
pub async fn collect_all<T, F, Fut>(first: u32, fetch: F) -> Result<Vec<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let pages: Vec<Vec<T>> = pages(first, fetch).try_collect().await?;
    Ok(pages.into_iter().flatten().collect())
}
