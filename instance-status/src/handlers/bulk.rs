use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use futures::{stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::error;

use crate::api::{InstanceRecord, StatusError};
use crate::guid::ProcessGuid;
use crate::instances;
use crate::router;

// Comma-separated, non-empty tokens of [a-zA-Z0-9_-]. Anything else is
// refused before any upstream work starts.
static PROCESS_GUIDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z0-9_-]+,)*[a-zA-Z0-9_-]+$").expect("process guids pattern is valid")
});

#[derive(Debug, Deserialize)]
pub struct BulkQuery {
    #[serde(default)]
    pub guids: String,
}

pub async fn bulk_status(
    State(state): State<router::State>,
    Query(query): Query<BulkQuery>,
) -> Result<Json<HashMap<String, Vec<InstanceRecord>>>, StatusError> {
    if !PROCESS_GUIDS_PATTERN.is_match(&query.guids) {
        error!(guids = %query.guids, "rejecting malformed guids parameter");
        return Err(StatusError::InvalidBulkQuery);
    }
    if state.bulk_workers == 0 {
        error!("bulk worker pool has zero width");
        return Err(StatusError::InvalidWorkerPool);
    }

    // Each id is fetched independently; the stream yields per-id entries
    // and the only merge point is this collect, so no lock is held
    // anywhere near the network calls.
    let now = state.timesource.current_time();
    let statuses: HashMap<String, Vec<InstanceRecord>> = stream::iter(
        query
            .guids
            .split(',')
            .map(str::to_string)
            .map(|requested| group_status(&state, requested, now)),
    )
    .buffer_unordered(state.bulk_workers)
    .filter_map(|entry| async move { entry })
    .collect()
    .await;

    Ok(Json(statuses))
}

// One bulk unit. Any failure is logged and swallowed so it cannot affect
// the other ids in the batch; ids with nothing to report yield no entry.
async fn group_status(
    state: &router::State,
    requested: String,
    now: OffsetDateTime,
) -> Option<(String, Vec<InstanceRecord>)> {
    let process_guid = match ProcessGuid::parse(&requested) {
        Ok(process_guid) => process_guid,
        Err(_) => {
            error!(process_guid = %requested, "skipping undecodable process guid");
            return None;
        }
    };

    let observations = match state
        .orchestrator
        .list_observations(&process_guid.shortened())
        .await
    {
        Ok(observations) => observations,
        Err(err) => {
            error!(
                process_guid = %requested,
                error = %err,
                "skipping process guid after a failed listing"
            );
            return None;
        }
    };

    let records = instances::instance_records(&process_guid, observations, now);
    if records.is_empty() {
        return None;
    }
    Some((requested, records))
}
