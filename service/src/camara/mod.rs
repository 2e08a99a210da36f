//! Câmara dos Deputados open-data API client module.
//!
//! Provides typed access to the three read-only endpoints the export needs:
//! the legislator roster, per-legislator expenses, and per-legislator detail.
//!
//! # Architecture
//!
//! The module uses a trait-based design for testability:
//!
//! - [`CamaraApiClient`] - Trait defining API operations
//! - [`HttpCamaraClient`] - Real HTTP implementation on top of [`crate::pagination::Paginator`]
//! - [`mock::MockCamaraClient`] - Mock for unit tests (behind `test-utils` feature)
//!
//! # Testing Patterns
//!
//! ## Unit Tests (Mock Implementation)
//!
//! ```ignore
//! use camara_despesas::camara::mock::MockCamaraClient;
//! use camara_despesas::pagination::Paginated;
//!
//! let mock = MockCamaraClient::new();
//! mock.set_roster(Paginated::complete(vec![summary], 1));
//!
//! let summary = pipeline::run(&mock, &exporter, as_of).await?;
//! ```
//!
//! ## Integration Tests (HTTP Stubbing)
//!
//! Use `MockHttpServer` (in `tests/common`) to stub the API and point
//! [`HttpCamaraClient`] at `server.url()`.

mod client;
mod types;

pub use client::{CamaraApiClient, CamaraApiError, ExpenseQuery, HttpCamaraClient};
pub use types::{
    ExpenseRecord, LatestStatus, LegislatorProfile, LegislatorSummary, ProfileData,
    ProfileResponse, LEGISLATOR_ID_COLUMN,
};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock;
