//! Id allocation, id lists and batched writes shared by the repositories

use crate::error::AppError;
use crate::metrics::WRITES_TOTAL;
use crate::pagination::page_window;
use crate::store::{Batch, KeyValueStore, WriteMode};

pub(crate) fn parse_id(key: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| AppError::decode(key, "element", e))
}

/// Allocate the next id from a store-native counter. Ids start at 1.
pub(crate) async fn next_id(store: &dyn KeyValueStore, counter: &str) -> Result<u64, AppError> {
    let value = store.increment(counter).await?;
    u64::try_from(value).map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "counter `{counter}` returned non-positive value {value}"
        ))
    })
}

/// Submit the writes of one logical action.
pub(crate) async fn submit(
    store: &dyn KeyValueStore,
    mode: WriteMode,
    action: &'static str,
    batch: Batch,
) -> Result<(), AppError> {
    WRITES_TOTAL
        .with_label_values(&[action, mode.as_str()])
        .inc();
    batch.submit(store, mode).await?;
    Ok(())
}

/// One page of a most-recent-first id list.
///
/// An out-of-range page is not an error: it yields no ids and a warning.
pub(crate) async fn page_of_ids(
    store: &dyn KeyValueStore,
    key: &str,
    page: u64,
    per_page: u64,
) -> Result<Vec<u64>, AppError> {
    let len = store.list_length(key).await?;
    let window = match page_window(page, per_page, len) {
        Ok(window) => window,
        Err(AppError::InvalidRange { page, pages }) => {
            tracing::warn!(
                key,
                page,
                per_page,
                valid = %format!("1..={pages}"),
                "Invalid page requested"
            );
            return Ok(Vec::new());
        }
        Err(other) => return Err(other),
    };

    store
        .list_range(key, window.start as i64, window.stop as i64)
        .await?
        .iter()
        .map(|raw| parse_id(key, raw))
        .collect()
}

/// Linear scan; fine while lists stay small.
pub(crate) async fn contains_id(
    store: &dyn KeyValueStore,
    key: &str,
    id: u64,
) -> Result<bool, AppError> {
    let needle = id.to_string();
    Ok(store
        .list_range(key, 0, -1)
        .await?
        .iter()
        .any(|value| *value == needle))
}
