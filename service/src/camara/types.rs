//! Data types for Câmara open-data API responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column carrying the legislator id on every exported expense row.
pub const LEGISLATOR_ID_COLUMN: &str = "idDeputado";

/// One entry of the legislator roster (`GET /deputados`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegislatorSummary {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
}

/// Legislator metadata used to enrich expense rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegislatorProfile {
    pub id: i64,
    /// Parliamentary name
    pub name: String,
    /// Party acronym (e.g. "PT", "PL")
    pub party: String,
    /// State abbreviation (e.g. "SP")
    pub state: String,
}

/// One expense row, tagged with the legislator it was fetched for.
///
/// `fields` is passed through as the API returned it, key order included.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub legislator_id: i64,
    pub fields: Map<String, Value>,
}

impl ExpenseRecord {
    #[must_use]
    pub const fn new(legislator_id: i64, fields: Map<String, Value>) -> Self {
        Self {
            legislator_id,
            fields,
        }
    }
}

/// Response from the legislator detail endpoint (`GET /deputados/{id}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub dados: ProfileData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileData {
    pub id: i64,
    #[serde(rename = "ultimoStatus")]
    pub latest_status: LatestStatus,
}

/// The `ultimoStatus` block of a legislator detail.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestStatus {
    pub nome: String,
    #[serde(rename = "siglaPartido", default)]
    pub party: Option<String>,
    #[serde(rename = "siglaUf", default)]
    pub state: Option<String>,
}

impl From<ProfileData> for LegislatorProfile {
    fn from(data: ProfileData) -> Self {
        Self {
            id: data.id,
            name: data.latest_status.nome,
            party: data.latest_status.party.unwrap_or_default(),
            state: data.latest_status.state.unwrap_or_default(),
        }
    }
}
