use std::future::Future;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::orchestrator::KubeOrchestrator;
use crate::router;
use crate::time::SystemTime;
use crate::usage::HttpMetricsSource;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let timeout = Duration::from_secs(config.upstream_timeout_seconds);

    let orchestrator = match KubeOrchestrator::new(
        &config.orchestrator_url,
        config.orchestrator_token.clone(),
        timeout,
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build the orchestrator client: {}", e);
            return;
        }
    };
    let usage = match HttpMetricsSource::new(&config.usage_api_url, timeout, SystemTime {}) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build the metrics client: {}", e);
            return;
        }
    };

    let gate = AdmissionGate::new(config.max_in_flight_requests);
    let app = router::router(
        orchestrator,
        usage,
        SystemTime {},
        gate,
        config.bulk_status_workers,
    );

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
