//! Câmara open-data API client.
//!
//! [`CamaraApiClient`] is the seam the export pipeline talks to. Use
//! [`HttpCamaraClient`] for real HTTP calls, or [`mock::MockCamaraClient`]
//! (behind `test-utils`) to drive the pipeline from canned data.
//!
//! # Example
//!
//! ```ignore
//! use camara_despesas::camara::{CamaraApiClient, HttpCamaraClient};
//!
//! let client = HttpCamaraClient::from_config(&config.api, &config.expenses)?;
//! let roster = client.list_legislators().await;
//! println!("{} legislators", roster.records.len());
//! ```

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::types::{ExpenseRecord, LegislatorProfile, LegislatorSummary, ProfileResponse};
use crate::config::{ApiConfig, ExpensesConfig};
use crate::fetch::{FetchClient, FetchError, QueryParams, RetryPolicy};
use crate::pagination::{Paginated, Paginator};

/// Errors that can occur when fetching a single legislator.
#[derive(Debug, Error)]
pub enum CamaraApiError {
    /// Request failed after retries, or returned a non-200 status
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Legislator not found
    #[error("Legislator not found: {0}")]
    NotFound(i64),

    /// The body did not have the expected shape
    #[error("Unexpected response for legislator {id}: {detail}")]
    Decode { id: i64, detail: String },
}

/// Fixed filters sent with every expense listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseQuery {
    /// One `ano` pair is sent per year.
    pub years: Vec<i32>,
    pub order: String,
    pub order_by: String,
}

impl Default for ExpenseQuery {
    fn default() -> Self {
        Self {
            years: vec![2024],
            order: "desc".to_string(),
            order_by: "dataDocumento".to_string(),
        }
    }
}

impl ExpenseQuery {
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let params = self
            .years
            .iter()
            .fold(QueryParams::new(), |params, year| params.with("ano", year));
        params
            .with("ordem", &self.order)
            .with("ordenarPor", &self.order_by)
    }
}

impl From<&ExpensesConfig> for ExpenseQuery {
    fn from(config: &ExpensesConfig) -> Self {
        Self {
            years: config.years.clone(),
            order: config.order.to_lowercase(),
            order_by: config.order_by.clone(),
        }
    }
}

/// Operations the export pipeline needs from the API.
///
/// Listings never fail as a whole: they return whatever was gathered before a
/// fatal error, with the error recorded in [`Paginated::stopped_by`].
#[async_trait]
pub trait CamaraApiClient: Send + Sync {
    /// Full legislator roster.
    async fn list_legislators(&self) -> Paginated<LegislatorSummary>;

    /// Every expense of one legislator, each tagged with `legislator_id`.
    async fn list_expenses(&self, legislator_id: i64) -> Paginated<ExpenseRecord>;

    /// Metadata of one legislator.
    async fn get_profile(&self, legislator_id: i64) -> Result<LegislatorProfile, CamaraApiError>;
}

/// HTTP-based implementation of [`CamaraApiClient`].
pub struct HttpCamaraClient {
    paginator: Paginator,
    base_url: String,
    expenses: ExpenseQuery,
}

impl HttpCamaraClient {
    /// Create a client for `base_url` (e.g. `https://dadosabertos.camara.leg.br/api/v2`).
    pub fn new(base_url: impl Into<String>, paginator: Paginator, expenses: ExpenseQuery) -> Self {
        let base_url: String = base_url.into();
        Self {
            paginator,
            base_url: base_url.trim_end_matches('/').to_string(),
            expenses,
        }
    }

    /// Build the HTTP stack (timeout, retry policy, page size) from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(api: &ApiConfig, expenses: &ExpensesConfig) -> Result<Self, FetchError> {
        let policy = RetryPolicy {
            max_attempts: api.max_attempts,
            backoff_factor: Duration::from_millis(api.backoff_factor_ms),
            backoff_max: Duration::from_secs(api.backoff_max_secs),
        };
        let fetcher = FetchClient::new(Duration::from_secs(api.request_timeout_secs), policy)?;
        let paginator = Paginator::new(fetcher, api.page_size, api.timeout_retries);
        Ok(Self::new(&api.base_url, paginator, expenses.into()))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CamaraApiClient for HttpCamaraClient {
    async fn list_legislators(&self) -> Paginated<LegislatorSummary> {
        let url = format!("{}/deputados", self.base_url);

        self.paginator
            .paginate(&url, &QueryParams::new())
            .await
            .filter_map(|record| {
                match serde_json::from_value::<LegislatorSummary>(record.into()) {
                    Ok(summary) => Some(summary),
                    Err(error) => {
                        warn!(error = %error, "skipping roster entry without id/nome");
                        None
                    }
                }
            })
    }

    async fn list_expenses(&self, legislator_id: i64) -> Paginated<ExpenseRecord> {
        let url = format!("{}/deputados/{}/despesas", self.base_url, legislator_id);

        self.paginator
            .paginate(&url, &self.expenses.to_params())
            .await
            .map(|fields| ExpenseRecord::new(legislator_id, fields))
    }

    async fn get_profile(&self, legislator_id: i64) -> Result<LegislatorProfile, CamaraApiError> {
        let url = format!("{}/deputados/{}", self.base_url, legislator_id);

        let body = self
            .paginator
            .fetcher()
            .fetch_with_timeout_retries(&url, &QueryParams::new(), self.paginator.timeout_retries())
            .await
            .map_err(|error| match error.status() {
                Some(404) => CamaraApiError::NotFound(legislator_id),
                _ => CamaraApiError::Fetch(error),
            })?;

        let response: ProfileResponse =
            serde_json::from_value(body).map_err(|e| CamaraApiError::Decode {
                id: legislator_id,
                detail: e.to_string(),
            })?;
        Ok(response.dados.into())
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::missing_const_for_fn,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Mock implementation for unit testing.

    use super::{
        CamaraApiClient, CamaraApiError, ExpenseRecord, LegislatorProfile, LegislatorSummary,
        Paginated,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A call received by [`MockCamaraClient`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        ListLegislators,
        ListExpenses(i64),
        GetProfile(i64),
    }

    /// Mock implementation of `CamaraApiClient` for unit tests.
    ///
    /// Configure responses with the `set_*` methods and inspect the call
    /// order with `calls()`. Unconfigured listings are empty and complete;
    /// unconfigured profiles are `NotFound`.
    pub struct MockCamaraClient {
        roster: Mutex<Option<Paginated<LegislatorSummary>>>,
        expenses: Mutex<HashMap<i64, Paginated<ExpenseRecord>>>,
        profiles: Mutex<HashMap<i64, Result<LegislatorProfile, CamaraApiError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MockCamaraClient {
        pub fn new() -> Self {
            Self {
                roster: Mutex::new(None),
                expenses: Mutex::new(HashMap::new()),
                profiles: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Set the result for `list_legislators`.
        pub fn set_roster(&self, roster: Paginated<LegislatorSummary>) {
            *self.roster.lock().unwrap() = Some(roster);
        }

        /// Set the result for `list_expenses(legislator_id)`.
        pub fn set_expenses(&self, legislator_id: i64, expenses: Paginated<ExpenseRecord>) {
            self.expenses.lock().unwrap().insert(legislator_id, expenses);
        }

        /// Set the result for `get_profile(legislator_id)`.
        pub fn set_profile(
            &self,
            legislator_id: i64,
            profile: Result<LegislatorProfile, CamaraApiError>,
        ) {
            self.profiles.lock().unwrap().insert(legislator_id, profile);
        }

        /// Every call received, in order.
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Default for MockCamaraClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CamaraApiClient for MockCamaraClient {
        async fn list_legislators(&self) -> Paginated<LegislatorSummary> {
            self.calls.lock().unwrap().push(Call::ListLegislators);

            self.roster
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Paginated::complete(Vec::new(), 0))
        }

        async fn list_expenses(&self, legislator_id: i64) -> Paginated<ExpenseRecord> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::ListExpenses(legislator_id));

            self.expenses
                .lock()
                .unwrap()
                .remove(&legislator_id)
                .unwrap_or_else(|| Paginated::complete(Vec::new(), 0))
        }

        async fn get_profile(
            &self,
            legislator_id: i64,
        ) -> Result<LegislatorProfile, CamaraApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::GetProfile(legislator_id));

            self.profiles
                .lock()
                .unwrap()
                .remove(&legislator_id)
                .unwrap_or(Err(CamaraApiError::NotFound(legislator_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expense_query_params_match_api_names() {
        let query = ExpenseQuery {
            years: vec![2023, 2024],
            ..ExpenseQuery::default()
        };
        let params = query.to_params();

        assert_eq!(params.get_all("ano").collect::<Vec<_>>(), ["2023", "2024"]);
        assert_eq!(params.get("ordem"), Some("desc"));
        assert_eq!(params.get("ordenarPor"), Some("dataDocumento"));
        assert_eq!(params.get("pagina"), None);
    }

    #[test]
    fn configured_order_is_sent_lowercase() {
        let config = ExpensesConfig {
            order: "ASC".to_string(),
            ..ExpensesConfig::default()
        };
        let params = ExpenseQuery::from(&config).to_params();
        assert_eq!(params.get("ordem"), Some("asc"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let fetcher = FetchClient::with_client(reqwest::Client::new(), RetryPolicy::default());
        let client = HttpCamaraClient::new(
            "https://example.test/api/v2/",
            Paginator::new(fetcher, 100, 3),
            ExpenseQuery::default(),
        );
        assert_eq!(client.base_url(), "https://example.test/api/v2");
    }
}
