use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::admission::{self, AdmissionGate};
use crate::handlers;
use crate::orchestrator::OrchestratorApi;
use crate::time::TimeSource;
use crate::usage::MetricsSource;

#[derive(Clone)]
pub struct State {
    pub orchestrator: Arc<dyn OrchestratorApi + Send + Sync>,
    pub usage: Arc<dyn MetricsSource + Send + Sync>,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
    pub bulk_workers: usize,
}

pub fn router<O, M, T>(
    orchestrator: O,
    usage: M,
    timesource: T,
    gate: AdmissionGate,
    bulk_workers: usize,
) -> Router
where
    O: OrchestratorApi + Send + Sync + 'static,
    M: MetricsSource + Send + Sync + 'static,
    T: TimeSource + Send + Sync + 'static,
{
    let state = State {
        orchestrator: Arc::new(orchestrator),
        usage: Arc::new(usage),
        timesource: Arc::new(timesource),
        bulk_workers,
    };

    let instance_routes = Router::new()
        .route("/instances/:guid", get(handlers::status::instance_status))
        .route(
            "/instances/:guid/stats",
            get(handlers::stats::instance_stats),
        )
        .route("/bulk_status", get(handlers::bulk::bulk_status))
        .route_layer(middleware::from_fn_with_state(gate, admission::admit))
        .with_state(state);

    // Probe routes stay outside the admission gate so a saturated process
    // can still answer its platform.
    Router::new()
        .route("/", get(handlers::index))
        .route("/_readiness", get(handlers::index))
        .merge(instance_routes)
        .layer(TraceLayer::new_for_http())
}
