//! One export run: roster, per-legislator expenses and profile, join, export.
//!
//! Legislators are processed strictly one after another, expenses before
//! profile. Fetch failures only shrink the dataset (they are logged and
//! counted); the run fails only when the snapshot cannot be exported.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::camara::{CamaraApiClient, CamaraApiError};
use crate::enrich::join;
use crate::export::{ArtifactHandle, ExportError, SnapshotExporter};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Legislators in the roster.
    pub legislators: usize,
    /// Expense rows fetched across all legislators.
    pub expenses: usize,
    /// Profiles fetched successfully.
    pub profiles: usize,
    /// Paginated sequences (roster included) abandoned on a fatal error.
    pub incomplete_sequences: usize,
    /// Rows written to the snapshot.
    pub rows: usize,
    pub artifact: ArtifactHandle,
}

/// Run the whole export for snapshot date `as_of`.
///
/// # Errors
/// Returns an error only if serializing or uploading the snapshot fails.
pub async fn run<C>(
    client: &C,
    exporter: &SnapshotExporter,
    as_of: NaiveDate,
) -> Result<RunSummary, ExportError>
where
    C: CamaraApiClient + ?Sized,
{
    let roster = client.list_legislators().await;
    let mut incomplete_sequences = usize::from(!roster.is_complete());
    info!(
        legislators = roster.records.len(),
        complete = roster.is_complete(),
        "roster fetched"
    );

    let mut expenses = Vec::new();
    let mut profiles = Vec::new();

    for legislator in &roster.records {
        info!(
            legislator_id = legislator.id,
            name = %legislator.name,
            "capturing expenses"
        );

        let fetched = client.list_expenses(legislator.id).await;
        if !fetched.is_complete() {
            incomplete_sequences += 1;
        }
        expenses.extend(fetched.records);

        match client.get_profile(legislator.id).await {
            Ok(profile) => profiles.push(profile),
            Err(CamaraApiError::NotFound(id)) => {
                warn!(legislator_id = id, "profile not found, rows stay unenriched");
            }
            Err(error) => {
                warn!(
                    legislator_id = legislator.id,
                    error = %error,
                    "profile unavailable, rows stay unenriched"
                );
            }
        }
    }

    let expense_count = expenses.len();
    let enriched = join(expenses, &profiles);
    info!(
        expenses = expense_count,
        profiles = profiles.len(),
        rows = enriched.len(),
        "dataset joined"
    );

    let artifact = exporter.export(&enriched, as_of).await?;

    Ok(RunSummary {
        legislators: roster.records.len(),
        expenses: expense_count,
        profiles: profiles.len(),
        incomplete_sequences,
        rows: enriched.len(),
        artifact,
    })
}
