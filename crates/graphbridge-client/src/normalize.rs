//! Flattening of graph results into the flat records a relational caller expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::graph::{PropertyMap, RawExecutionResult, ResultSet};

/// Flattening rule applied to each row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extraction {
    /// One record per node or relationship slot; scalar slots are skipped.
    #[default]
    Properties,
    /// One record per row, keyed by column name.
    Rows,
}

/// Turn a non-2xx result into [`ClientError::ExecutionFailed`].
pub fn check_status(raw: &RawExecutionResult) -> Result<(), ClientError> {
    if raw.is_success() {
        return Ok(());
    }
    Err(ClientError::ExecutionFailed {
        status: raw.status,
        headers: raw.headers.clone(),
        payload: raw.payload.clone(),
    })
}

/// Status check, payload decode and properties-only flattening.
///
/// Decoding rejects rows whose width differs from the column list, so row
/// extraction never silently drops or invents cells.
pub fn normalize(raw: &RawExecutionResult) -> Result<Vec<PropertyMap>, ClientError> {
    normalize_with(raw, Extraction::Properties)
}

pub fn normalize_with(
    raw: &RawExecutionResult,
    extraction: Extraction,
) -> Result<Vec<PropertyMap>, ClientError> {
    check_status(raw)?;
    let set = ResultSet::from_rest_json(&raw.payload)?;
    Ok(normalize_rows(&set, extraction))
}

pub fn normalize_rows(set: &ResultSet, extraction: Extraction) -> Vec<PropertyMap> {
    let records: Vec<PropertyMap> = match extraction {
        Extraction::Properties => set
            .rows
            .iter()
            .flat_map(|row| row.iter().filter_map(|slot| slot.properties().cloned()))
            .collect(),
        Extraction::Rows => set
            .rows
            .iter()
            .map(|row| {
                if row.len() != set.columns.len() {
                    warn!(
                        cells = row.len(),
                        columns = set.columns.len(),
                        "row width differs from column count"
                    );
                }
                set.columns
                    .iter()
                    .zip(row)
                    .map(|(column, slot)| (column.clone(), slot.to_json()))
                    .collect()
            })
            .collect(),
    };
    debug!(
        rows = set.rows.len(),
        records = records.len(),
        ?extraction,
        "normalized result"
    );
    records
}

/// First column of the first row, whatever its kind.
pub fn first_scalar(set: &ResultSet) -> Option<Value> {
    set.rows.first()?.first().map(|slot| slot.to_json())
}
