//! Lazy, restartable streams over paged listings.

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::future::Future;

use crate::error::ProviderError;
use crate::types::{Page, PageToken};

/// Turns a page-fetching function into a lazy stream of items.
///
/// Pages are requested only as the stream is polled, so a consumer never
/// holds more than one page at a time. Calling `paginate` again restarts the
/// listing from the first page. An error ends the stream after being yielded
/// once.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> BoxStream<'a, Result<T, ProviderError>>
where
    T: Send + 'a,
    F: FnMut(Option<PageToken>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, ProviderError>> + Send + 'a,
{
    // `None` cursor means the listing is exhausted.
    let pages = stream::try_unfold(
        (fetch, Some(None::<PageToken>)),
        |(mut fetch, cursor)| async move {
            let Some(token) = cursor else {
                return Ok(None);
            };
            let page = fetch(token).await?;
            let next = page.next.map(Some);
            Ok(Some((page.items, (fetch, next))))
        },
    );

    pages
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, ProviderError>)))
        .try_flatten()
        .boxed()
}
