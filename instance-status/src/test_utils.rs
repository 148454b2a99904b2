use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use reqwest::StatusCode;
use time::macros::datetime;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::admission::AdmissionGate;
use crate::guid::ProcessGuid;
use crate::instances::APPLICATION_CONTAINER;
use crate::orchestrator::{
    ContainerObservation, ContainerState, OrchestratorApi, OrchestratorError, RawObservation,
};
use crate::router::{self, State};
use crate::time::TimeSource;
use crate::usage::{MetricsSource, ResourceSample, UsageError};

pub const TEST_START: OffsetDateTime = datetime!(2008-08-08 08:08:08 UTC);
pub const TEST_NOW: OffsetDateTime = datetime!(2008-08-08 08:15:00 UTC);

#[derive(Clone)]
pub struct FixedTime {
    pub time: OffsetDateTime,
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> OffsetDateTime {
        self.time
    }
}

pub fn fresh_process_guid() -> ProcessGuid {
    ProcessGuid::new(Uuid::new_v4(), Uuid::new_v4())
}

pub fn running_observation(uid: &str, log_guid: Option<&str>) -> RawObservation {
    observation_in(uid, log_guid, ContainerState::Running)
}

pub fn observation_in(uid: &str, log_guid: Option<&str>, state: ContainerState) -> RawObservation {
    RawObservation {
        uid: uid.to_string(),
        started_at: Some(TEST_START),
        log_guid: log_guid.map(str::to_string),
        containers: vec![ContainerObservation {
            name: APPLICATION_CONTAINER.to_string(),
            state,
        }],
    }
}

#[derive(Clone)]
pub enum MockListing {
    Observations(Vec<RawObservation>),
    NotFound,
    Unavailable,
}

/// Selector-keyed in-memory orchestrator. Unstubbed selectors list empty,
/// like an orchestrator that knows nothing about the group.
#[derive(Clone, Default)]
pub struct MockOrchestrator {
    inner: Arc<Mutex<MockOrchestratorInner>>,
}

#[derive(Default)]
struct MockOrchestratorInner {
    listings: HashMap<String, MockListing>,
    calls: usize,
}

impl MockOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, selector: &str, listing: MockListing) {
        self.inner
            .lock()
            .unwrap()
            .listings
            .insert(selector.to_string(), listing);
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

#[async_trait]
impl OrchestratorApi for MockOrchestrator {
    async fn list_observations(
        &self,
        selector: &str,
    ) -> Result<Vec<RawObservation>, OrchestratorError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls += 1;
        match inner.listings.get(selector) {
            Some(MockListing::Observations(observations)) => Ok(observations.clone()),
            Some(MockListing::NotFound) => Err(OrchestratorError::NotFound),
            Some(MockListing::Unavailable) => {
                Err(OrchestratorError::Api(StatusCode::INTERNAL_SERVER_ERROR))
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Log-guid-keyed in-memory metrics gateway that records every fetch.
#[derive(Clone, Default)]
pub struct MockMetricsSource {
    inner: Arc<Mutex<MockMetricsInner>>,
}

#[derive(Default)]
struct MockMetricsInner {
    samples: HashMap<String, Vec<ResourceSample>>,
    unavailable: bool,
    requests: Vec<(String, String)>,
}

impl MockMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, log_guid: &str, samples: Vec<ResourceSample>) {
        self.inner
            .lock()
            .unwrap()
            .samples
            .insert(log_guid.to_string(), samples);
    }

    pub fn make_unavailable(&self) {
        self.inner.lock().unwrap().unavailable = true;
    }

    /// Every `(log_guid, token)` pair fetched so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl MetricsSource for MockMetricsSource {
    async fn fetch(&self, log_guid: &str, token: &str) -> Result<Vec<ResourceSample>, UsageError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push((log_guid.to_string(), token.to_string()));
        if inner.unavailable {
            return Err(UsageError::Api(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(inner.samples.get(log_guid).cloned().unwrap_or_default())
    }
}

pub fn test_state<O>(orchestrator: O) -> State
where
    O: OrchestratorApi + Send + Sync + 'static,
{
    test_state_with(orchestrator, MockMetricsSource::new())
}

pub fn test_state_with<O, M>(orchestrator: O, usage: M) -> State
where
    O: OrchestratorApi + Send + Sync + 'static,
    M: MetricsSource + Send + Sync + 'static,
{
    State {
        orchestrator: Arc::new(orchestrator),
        usage: Arc::new(usage),
        timesource: Arc::new(FixedTime { time: TEST_NOW }),
        bulk_workers: 4,
    }
}

pub fn test_router<O>(orchestrator: O, gate: AdmissionGate) -> Router
where
    O: OrchestratorApi + Send + Sync + 'static,
{
    test_router_with(orchestrator, MockMetricsSource::new(), gate)
}

pub fn test_router_with<O, M>(orchestrator: O, usage: M, gate: AdmissionGate) -> Router
where
    O: OrchestratorApi + Send + Sync + 'static,
    M: MetricsSource + Send + Sync + 'static,
{
    router::router(orchestrator, usage, FixedTime { time: TEST_NOW }, gate, 4)
}
