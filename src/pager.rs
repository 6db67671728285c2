//! Generic cursor-pagination driver
//!
//! [`fetch_all`] drives any "list one page" operation until the remote
//! cursor runs out, accumulating items in page order. It never retries on
//! its own; the caller wraps each page fetch with
//! [`run_with_backoff`](crate::retry::run_with_backoff) so retry policy can
//! differ between children, block, and space listings.
//!
//! A mid-sequence failure does not discard what was already fetched: the
//! accumulated items come back tagged with the terminal error, and the
//! caller decides whether the partial result is usable.

use crate::error::{Error, Result};
use crate::types::Page;
use std::future::Future;

/// Result of draining a paginated listing
#[derive(Debug)]
pub struct Fetched<T> {
    /// Items accumulated so far, in page order
    pub items: Vec<T>,
    /// Terminal error if the listing could not be drained completely
    pub error: Option<Error>,
}

impl<T> Fetched<T> {
    /// A fully drained listing
    pub fn complete(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    /// A listing cut short by an unrecoverable page failure
    pub fn partial(items: Vec<T>, error: Error) -> Self {
        Self {
            items,
            error: Some(error),
        }
    }

    /// True when the accumulation is known to be incomplete
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into a hard result, dropping nothing on success
    ///
    /// Partial accumulations with at least one item stay `Ok` only through
    /// the struct itself; this helper is for callers that need all-or-error.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            None => Ok(self.items),
            Some(e) => Err(e),
        }
    }
}

/// Drain every page of a cursor-paginated listing
///
/// Invokes `list_page(None)` first, then follows `next_cursor` until it is
/// absent or empty. Exactly one call is made per page. Item order is the
/// concatenation of the pages' item sequences in page order.
pub async fn fetch_all<T, F, Fut>(mut list_page: F) -> Fetched<T>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        match list_page(cursor.take()).await {
            Ok(page) => {
                items.extend(page.items);
                match page.next_cursor {
                    Some(next) if !next.is_empty() => cursor = Some(next),
                    _ => return Fetched::complete(items),
                }
            }
            Err(e) => {
                if !items.is_empty() {
                    tracing::warn!(
                        accumulated = items.len(),
                        error = %e,
                        "pagination failed mid-sequence, returning partial accumulation"
                    );
                }
                return Fetched::partial(items, e);
            }
        }
    }
}
