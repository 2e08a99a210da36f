//! Common test utilities for integration tests.
//!
//! This module provides:
//!
//! - [`http_mock::MockHttpServer`] - wiremock wrapper for stubbing the API
//! - [`fast_client`] - an [`HttpCamaraClient`] with millisecond backoff
//! - JSON fixtures shaped like the open-data API responses
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//!
//! use common::{fast_client, http_mock::MockHttpServer, page};
//!
//! #[tokio::test]
//! async fn test_roster() {
//!     let server = MockHttpServer::start().await;
//!     server.expect_get("/deputados").with_query("pagina", "1")
//!         .respond_with_json(page(vec![])).mount().await;
//!     let client = fast_client(&server.url());
//! }
//! ```

#![allow(dead_code)]

pub mod http_mock;

use std::time::Duration;

use camara_despesas::camara::{ExpenseQuery, HttpCamaraClient};
use camara_despesas::fetch::{FetchClient, RetryPolicy};
use camara_despesas::pagination::Paginator;
use serde_json::{json, Value};

use http_mock::MockHttpServer;

/// Retry policy with the production attempt count but millisecond sleeps.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        backoff_factor: Duration::from_millis(1),
        backoff_max: Duration::from_millis(20),
    }
}

/// Client against `base_url` with default page size and fast retries.
pub fn fast_client(base_url: &str) -> HttpCamaraClient {
    client_with(base_url, fast_policy(), Duration::from_secs(5), 3)
}

#[allow(clippy::expect_used)]
pub fn client_with(
    base_url: &str,
    policy: RetryPolicy,
    timeout: Duration,
    timeout_retries: u32,
) -> HttpCamaraClient {
    let fetcher = FetchClient::new(timeout, policy).expect("client build");
    HttpCamaraClient::new(
        base_url,
        Paginator::new(fetcher, 100, timeout_retries),
        ExpenseQuery::default(),
    )
}

/// A page body: `{"dados": [...], "links": []}`.
pub fn page(items: Vec<Value>) -> Value {
    json!({ "dados": items, "links": [] })
}

pub fn roster_item(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "uri": format!("https://dadosabertos.camara.leg.br/api/v2/deputados/{id}"),
        "nome": name,
        "siglaPartido": "PT",
        "siglaUf": "SP",
        "idLegislatura": 57
    })
}

pub fn expense_item(cod_documento: i64, valor: f64) -> Value {
    json!({
        "ano": 2024,
        "mes": 3,
        "tipoDespesa": "COMBUSTÍVEIS E LUBRIFICANTES.",
        "codDocumento": cod_documento,
        "tipoDocumento": "Nota Fiscal Eletrônica",
        "dataDocumento": "2024-03-12T00:00:00",
        "valorDocumento": valor,
        "nomeFornecedor": "AUTO POSTO BRASILIA LTDA",
        "cnpjCpfFornecedor": "00000000000191"
    })
}

pub fn profile_body(id: i64, name: &str, party: &str, state: &str) -> Value {
    json!({
        "dados": {
            "id": id,
            "nomeCivil": name.to_uppercase(),
            "ultimoStatus": {
                "id": id,
                "nome": name,
                "siglaPartido": party,
                "siglaUf": state,
                "situacao": "Exercício"
            }
        }
    })
}

/// Stub page `number` of `route` with `items`.
pub async fn mount_page(server: &MockHttpServer, route: &str, number: u32, items: Vec<Value>) {
    server
        .expect_get(route)
        .with_query("pagina", &number.to_string())
        .respond_with_json(page(items))
        .mount()
        .await;
}

/// Stub the detail endpoint of legislator `id`.
pub async fn mount_profile(server: &MockHttpServer, id: i64, name: &str) {
    server
        .expect_get(&format!("/deputados/{id}"))
        .respond_with_json(profile_body(id, name, "PT", "SP"))
        .mount()
        .await;
}
