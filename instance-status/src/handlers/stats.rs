use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use tracing::{debug, error};

use crate::api::{InstanceRecord, InstanceStats, StatusError};
use crate::guid::ProcessGuid;
use crate::instances;
use crate::orchestrator::OrchestratorError;
use crate::router;
use crate::usage::ResourceSample;

pub async fn instance_stats(
    State(state): State<router::State>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<InstanceRecord>>, StatusError> {
    // Validation order is contract: credential, then id, then decode.
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(StatusError::MissingCredential)?;
    if guid.is_empty() {
        return Err(StatusError::MissingProcessGuid);
    }
    let process_guid = match ProcessGuid::parse(&guid) {
        Ok(process_guid) => process_guid,
        Err(err) => {
            error!(process_guid = %guid, "malformed process guid in path");
            return Err(err.into());
        }
    };

    let observations = match state
        .orchestrator
        .list_observations(&process_guid.shortened())
        .await
    {
        Ok(observations) => observations,
        Err(OrchestratorError::NotFound) => {
            debug!(process_guid = %guid, "no such process group");
            return Err(StatusError::GroupNotFound);
        }
        Err(err) => {
            error!(process_guid = %guid, error = %err, "failed to list instance observations");
            return Err(StatusError::Upstream);
        }
    };
    if observations.is_empty() {
        error!(process_guid = %guid, "orchestrator listed no observations to read stats from");
        return Err(StatusError::Upstream);
    }

    let log_guid = observations[0].log_guid.clone();
    let now = state.timesource.current_time();
    let mut records = instances::instance_records(&process_guid, observations, now);

    // Metrics failures degrade to absent stats, never to a request failure.
    let samples = match &log_guid {
        Some(log_guid) => match state.usage.fetch(log_guid, authorization).await {
            Ok(samples) => samples,
            Err(err) => {
                error!(log_guid = %log_guid, error = %err, "failed to fetch container usage");
                Vec::new()
            }
        },
        None => {
            error!(process_guid = %guid, "observation carries no log guid, skipping usage fetch");
            Vec::new()
        }
    };

    attach_usage(&mut records, samples);
    instances::normalize_crashed(&mut records);
    Ok(Json(records))
}

/// Merges samples onto records by instance index. Samples without a
/// matching record are dropped; records without a sample keep no stats.
fn attach_usage(records: &mut [InstanceRecord], samples: Vec<ResourceSample>) {
    let mut by_index: HashMap<u32, ResourceSample> = samples
        .into_iter()
        .map(|sample| (sample.instance_index, sample))
        .collect();
    for record in records {
        if let Some(sample) = by_index.remove(&record.index) {
            record.stats = Some(InstanceStats {
                time: sample.sampled_at,
                cpu: sample.cpu_fraction,
                mem: sample.memory_bytes,
                disk: sample.disk_bytes,
            });
        }
    }
}
