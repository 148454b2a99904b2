use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Label carrying the shortened process guid on every instance the
/// orchestrator runs for a group. Label values cap out below the full
/// 73-char form, hence the shortened encoding.
pub const PROCESS_GUID_LABEL: &str = "process-guid";

/// Annotation carrying the log routing key the metrics gateway is keyed by.
pub const LOG_GUID_ANNOTATION: &str = "log-guid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Waiting,
    Running,
    Terminated,
    /// The orchestrator reported none of the three states.
    Unset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerObservation {
    pub name: String,
    pub state: ContainerState,
}

/// One instance as the orchestrator reports it, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub uid: String,
    pub started_at: Option<OffsetDateTime>,
    pub log_guid: Option<String>,
    pub containers: Vec<ContainerObservation>,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("no instances exist for the selector")]
    NotFound,

    #[error("orchestrator answered {0}")]
    Api(StatusCode),

    #[error("orchestrator request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait OrchestratorApi {
    /// Lists every instance whose process-guid label equals `selector`
    /// (the shortened guid), across all namespaces.
    async fn list_observations(
        &self,
        selector: &str,
    ) -> Result<Vec<RawObservation>, OrchestratorError>;
}

pub struct KubeOrchestrator {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KubeOrchestrator {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl OrchestratorApi for KubeOrchestrator {
    async fn list_observations(
        &self,
        selector: &str,
    ) -> Result<Vec<RawObservation>, OrchestratorError> {
        let mut request = self
            .client
            .get(format!("{}/api/v1/pods", self.base_url))
            .query(&[("labelSelector", format!("{PROCESS_GUID_LABEL}={selector}"))]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(OrchestratorError::NotFound),
            status if !status.is_success() => Err(OrchestratorError::Api(status)),
            _ => {
                let list: PodList = response.json().await?;
                Ok(list.items.into_iter().map(RawObservation::from).collect())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    uid: String,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default, with = "time::serde::rfc3339::option")]
    start_time: Option<OffsetDateTime>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    name: String,
    #[serde(default)]
    state: ContainerStateWire,
}

// The orchestrator models state as a struct with at most one member set.
#[derive(Debug, Default, Deserialize)]
struct ContainerStateWire {
    waiting: Option<serde_json::Value>,
    running: Option<serde_json::Value>,
    terminated: Option<serde_json::Value>,
}

impl From<Pod> for RawObservation {
    fn from(pod: Pod) -> Self {
        Self {
            log_guid: pod.metadata.annotations.get(LOG_GUID_ANNOTATION).cloned(),
            uid: pod.metadata.uid,
            started_at: pod.status.start_time,
            containers: pod
                .status
                .container_statuses
                .into_iter()
                .map(|container| ContainerObservation {
                    name: container.name,
                    state: container.state.into(),
                })
                .collect(),
        }
    }
}

impl From<ContainerStateWire> for ContainerState {
    fn from(wire: ContainerStateWire) -> Self {
        if wire.waiting.is_some() {
            ContainerState::Waiting
        } else if wire.running.is_some() {
            ContainerState::Running
        } else if wire.terminated.is_some() {
            ContainerState::Terminated
        } else {
            ContainerState::Unset
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    fn orchestrator(server: &mockito::Server, token: Option<&str>) -> KubeOrchestrator {
        KubeOrchestrator::new(
            &server.url(),
            token.map(str::to_string),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lists_and_lowers_pods_for_a_selector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/pods")
            .match_query(Matcher::UrlEncoded(
                "labelSelector".into(),
                "process-guid=abc123-def456".into(),
            ))
            .match_header("authorization", "Bearer orc-token")
            .with_status(200)
            .with_body(
                json!({
                    "items": [
                        {
                            "metadata": {
                                "uid": "pod-b",
                                "annotations": { "log-guid": "log-1" },
                            },
                            "status": {
                                "startTime": "2008-08-08T08:08:08Z",
                                "containerStatuses": [
                                    { "name": "application", "state": { "running": {} } },
                                    { "name": "sidecar", "state": { "waiting": {} } },
                                ],
                            },
                        },
                        {
                            "metadata": { "uid": "pod-a" },
                            "status": {},
                        },
                    ],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let observations = orchestrator(&server, Some("orc-token"))
            .list_observations("abc123-def456")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            observations,
            vec![
                RawObservation {
                    uid: "pod-b".to_string(),
                    started_at: Some(datetime!(2008-08-08 08:08:08 UTC)),
                    log_guid: Some("log-1".to_string()),
                    containers: vec![
                        ContainerObservation {
                            name: "application".to_string(),
                            state: ContainerState::Running,
                        },
                        ContainerObservation {
                            name: "sidecar".to_string(),
                            state: ContainerState::Waiting,
                        },
                    ],
                },
                RawObservation {
                    uid: "pod-a".to_string(),
                    started_at: None,
                    log_guid: None,
                    containers: vec![],
                },
            ]
        );
    }

    #[tokio::test]
    async fn sends_no_credential_when_unconfigured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/pods")
            .match_query(Matcher::Any)
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(json!({ "items": [] }).to_string())
            .create_async()
            .await;

        let observations = orchestrator(&server, None)
            .list_observations("abc")
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(observations.is_empty());
    }

    #[tokio::test]
    async fn maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/pods")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = orchestrator(&server, None)
            .list_observations("abc")
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, OrchestratorError::NotFound));
    }

    #[tokio::test]
    async fn maps_other_failures_to_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/pods")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let err = orchestrator(&server, None)
            .list_observations("abc")
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(matches!(
            err,
            OrchestratorError::Api(StatusCode::BAD_GATEWAY)
        ));
    }

    #[tokio::test]
    async fn surfaces_undecodable_bodies() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/pods")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = orchestrator(&server, None)
            .list_observations("abc")
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, OrchestratorError::Transport(_)));
    }

    #[test]
    fn waiting_takes_precedence_in_state_lowering() {
        let wire = ContainerStateWire {
            waiting: Some(json!({})),
            running: None,
            terminated: Some(json!({})),
        };
        assert_eq!(ContainerState::from(wire), ContainerState::Waiting);

        assert_eq!(
            ContainerState::from(ContainerStateWire::default()),
            ContainerState::Unset
        );
    }
}
