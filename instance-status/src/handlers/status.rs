use axum::extract::{Path, State};
use axum::Json;
use tracing::{debug, error};

use crate::api::{InstanceRecord, StatusError};
use crate::guid::ProcessGuid;
use crate::instances;
use crate::orchestrator::OrchestratorError;
use crate::router;

pub async fn instance_status(
    State(state): State<router::State>,
    Path(guid): Path<String>,
) -> Result<Json<Vec<InstanceRecord>>, StatusError> {
    let process_guid = match ProcessGuid::parse(&guid) {
        Ok(process_guid) => process_guid,
        Err(err) => {
            error!(process_guid = %guid, "malformed process guid in path");
            return Err(err.into());
        }
    };

    let selector = process_guid.shortened();
    debug!(process_guid = %guid, selector = %selector, "listing instance observations");
    let observations = match state.orchestrator.list_observations(&selector).await {
        Ok(observations) => observations,
        // An unknown group has no instances; only the stats variant turns
        // this into a client-visible 404.
        Err(OrchestratorError::NotFound) => Vec::new(),
        Err(err) => {
            error!(process_guid = %guid, error = %err, "failed to list instance observations");
            return Err(StatusError::Upstream);
        }
    };

    let now = state.timesource.current_time();
    Ok(Json(instances::instance_records(
        &process_guid,
        observations,
        now,
    )))
}
