use semtable_common::{Result, SemtableError};
use semtable_tabular::RecordSet;
use std::collections::HashSet;
use tracing::info;

/// Result of merging newly loaded rows into an existing record set
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Deduplicated result is row-for-row identical to the existing set;
    /// callers must treat this as a no-op, not an empty merge
    Unchanged,

    /// The merged record set. Row positions may differ from the existing
    /// set, so every embedding column is invalidated and must be regenerated
    /// from this set before the store is saved again.
    Merged(RecordSet),
}

/// Concatenate `existing` then `incoming` and drop exact-duplicate rows,
/// keeping the first occurrence and preserving survivor order.
///
/// The incoming set must cover the same columns as the existing one
/// (order-insensitive); its columns are rearranged to the existing schema
/// before rows are compared.
pub fn merge(existing: &RecordSet, incoming: &RecordSet) -> Result<MergeOutcome> {
    if !existing.same_column_set(incoming) {
        return Err(SemtableError::schema_mismatch(format!(
            "incoming columns [{}] do not match store columns [{}]",
            incoming.columns().join(", "),
            existing.columns().join(", ")
        )));
    }
    let incoming = incoming.reordered(existing.columns())?;

    let mut seen: HashSet<&[String]> = HashSet::new();
    let mut merged = RecordSet::new(existing.columns().to_vec())?;
    for row in existing.rows().iter().chain(incoming.rows().iter()) {
        if seen.insert(row.as_slice()) {
            merged.push_row(row.clone())?;
        }
    }

    if merged.rows() == existing.rows() {
        info!("Merge produced no new rows ({} existing)", existing.len());
        return Ok(MergeOutcome::Unchanged);
    }

    info!(
        "Merge: {} existing + {} incoming -> {} rows",
        existing.len(),
        incoming.len(),
        merged.len()
    );
    Ok(MergeOutcome::Merged(merged))
}
