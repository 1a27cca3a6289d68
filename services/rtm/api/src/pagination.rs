//! Cursor pagination.
//!
//! Each response carries an opaque continuation cursor. The first request is
//! sent without a cursor; an empty (or missing) cursor marks the last page.

use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// A paginated response
pub trait Page {
    /// Element type of the page
    type Item;

    /// Split into the page's items and the continuation cursor
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turn a page fetcher into a flat stream of items.
///
/// `fetch` receives `None` for the first page and the previous page's cursor
/// afterwards. Items are yielded in page order. The stream ends after the
/// page with an empty cursor, or with the first fetch error.
pub fn paginate<P, E, F, Fut>(fetch: F) -> impl Stream<Item = Result<P::Item, E>>
where
    P: Page,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<P, E>>,
{
    stream::try_unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let request = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(c) => Some(c),
        };

        let (items, next) = fetch(request).await?.into_parts();
        let next = match next {
            Some(c) if !c.is_empty() => Cursor::Next(c),
            _ => Cursor::Done,
        };
        Ok(Some((items, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
}
