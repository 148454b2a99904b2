use time::OffsetDateTime;

use crate::api::{InstanceRecord, InstanceState};
use crate::guid::ProcessGuid;
use crate::orchestrator::{ContainerState, RawObservation};

/// Sub-component carrying the group's lifecycle. Observations without a
/// container of this name are not application instances and are excluded.
pub const APPLICATION_CONTAINER: &str = "application";

/// Classifies raw observations into the records callers see.
///
/// Orchestrator order is arbitrary, so emitted observations are sorted by
/// uid before indexing; indices are the 0-based rank within that sorted,
/// already-filtered sequence. Excluded observations never consume an index.
pub fn instance_records(
    guid: &ProcessGuid,
    observations: Vec<RawObservation>,
    now: OffsetDateTime,
) -> Vec<InstanceRecord> {
    let mut emitted: Vec<_> = observations
        .into_iter()
        .filter_map(|observation| application_state(&observation).map(|state| (observation, state)))
        .collect();
    emitted.sort_by(|(a, _), (b, _)| a.uid.cmp(&b.uid));

    let process_guid = guid.to_string();
    emitted
        .into_iter()
        .enumerate()
        .map(|(rank, (observation, state))| {
            // An observation with no start time has not started yet.
            let since = observation
                .started_at
                .map_or_else(|| now.unix_timestamp(), OffsetDateTime::unix_timestamp);
            InstanceRecord {
                process_guid: process_guid.clone(),
                instance_guid: observation.uid,
                index: rank as u32,
                since,
                uptime: (now.unix_timestamp() - since).max(0),
                state,
                stats: None,
            }
        })
        .collect()
}

fn application_state(observation: &RawObservation) -> Option<InstanceState> {
    let container = observation
        .containers
        .iter()
        .find(|container| container.name == APPLICATION_CONTAINER)?;
    Some(match container.state {
        ContainerState::Waiting => InstanceState::Starting,
        ContainerState::Running => InstanceState::Running,
        ContainerState::Terminated => InstanceState::Down,
        ContainerState::Unset => InstanceState::Unknown,
    })
}

/// Crashed instances report no useful runtime numbers: uptime is forced to
/// zero and any merged stats are zeroed, keeping only the sample time.
pub fn normalize_crashed(records: &mut [InstanceRecord]) {
    for record in records {
        if record.state == InstanceState::Crashed {
            record.uptime = 0;
            if let Some(stats) = &mut record.stats {
                stats.cpu = 0.0;
                stats.mem = 0;
                stats.disk = 0;
            }
        }
    }
}
