//! Page-by-page retrieval of `dados` collections.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::fetch::{FetchClient, FetchError, QueryParams};

/// Query parameter carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "itens";
/// Query parameter carrying the 1-based page number.
pub const PAGE_PARAM: &str = "pagina";

/// A JSON object as returned inside a page's `dados` array.
pub type RawRecord = Map<String, Value>;

/// Records accumulated by one paginated sequence.
///
/// A sequence that hit a fatal error still carries everything fetched before
/// it; `stopped_by` holds the error that ended it.
#[derive(Debug)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    /// Number of non-empty pages fetched.
    pub pages: u32,
    pub stopped_by: Option<FetchError>,
}

impl<T> Paginated<T> {
    /// A sequence that ran until an empty page.
    #[must_use]
    pub const fn complete(records: Vec<T>, pages: u32) -> Self {
        Self {
            records,
            pages,
            stopped_by: None,
        }
    }

    /// A sequence abandoned after `error`.
    #[must_use]
    pub const fn partial(records: Vec<T>, pages: u32, error: FetchError) -> Self {
        Self {
            records,
            pages,
            stopped_by: Some(error),
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.stopped_by.is_none()
    }

    /// Convert every record. Page count and stop reason are kept.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            records: self.records.into_iter().map(f).collect(),
            pages: self.pages,
            stopped_by: self.stopped_by,
        }
    }

    /// Convert records, dropping the ones `f` rejects. Page count and stop
    /// reason are kept.
    #[must_use]
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> Paginated<U> {
        Paginated {
            records: self.records.into_iter().filter_map(f).collect(),
            pages: self.pages,
            stopped_by: self.stopped_by,
        }
    }
}

/// Drives repeated fetches of one resource until it is exhausted.
#[derive(Debug, Clone)]
pub struct Paginator {
    fetcher: FetchClient,
    page_size: u32,
    timeout_retries: u32,
}

impl Paginator {
    #[must_use]
    pub const fn new(fetcher: FetchClient, page_size: u32, timeout_retries: u32) -> Self {
        Self {
            fetcher,
            page_size,
            timeout_retries,
        }
    }

    #[must_use]
    pub const fn fetcher(&self) -> &FetchClient {
        &self.fetcher
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub const fn timeout_retries(&self) -> u32 {
        self.timeout_retries
    }

    /// Fetch `url` page by page, starting at page 1, until a page comes back
    /// with an empty `dados` array.
    ///
    /// Every request carries `params` plus `itens` and `pagina`; `params`
    /// itself is never modified. Records keep the server's order. A fatal
    /// error ends the sequence and the records gathered so far are returned.
    pub async fn paginate(&self, url: &str, params: &QueryParams) -> Paginated<RawRecord> {
        let base = params.set(PAGE_SIZE_PARAM, self.page_size);
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = base.set(PAGE_PARAM, page);
            let items = match self.fetch_page(url, &request).await {
                Ok(items) => items,
                Err(error) => {
                    error!(
                        url,
                        page,
                        kept = records.len(),
                        error = %error,
                        "abandoning paginated fetch, keeping partial results"
                    );
                    return Paginated::partial(records, page - 1, error);
                }
            };

            if items.is_empty() {
                debug!(url, pages = page - 1, records = records.len(), "pagination exhausted");
                return Paginated::complete(records, page - 1);
            }

            records.extend(items);
            page += 1;
        }
    }

    async fn fetch_page(&self, url: &str, params: &QueryParams) -> Result<Vec<RawRecord>, FetchError> {
        let body = self
            .fetcher
            .fetch_with_timeout_retries(url, params, self.timeout_retries)
            .await?;
        page_items(url, body)
    }
}

/// Extract the `dados` array of a page body.
///
/// # Errors
/// Returns [`FetchError::Body`] if the body is not an object with a `dados`
/// array of objects.
pub fn page_items(url: &str, body: Value) -> Result<Vec<RawRecord>, FetchError> {
    let body_error = |detail: &str| FetchError::Body {
        url: url.to_string(),
        detail: detail.to_string(),
    };

    let Value::Object(mut body) = body else {
        return Err(body_error("expected a JSON object"));
    };
    let Some(Value::Array(items)) = body.remove("dados") else {
        return Err(body_error("missing `dados` array"));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            _ => Err(body_error("`dados` item is not an object")),
        })
        .collect()
}
