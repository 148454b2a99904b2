use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::guid::GuidError;

/// Lifecycle of one application instance, as reported to callers.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
    Starting,
    Running,
    Down,
    Crashed,
    Unknown,
}

/// Resource usage attached to a record by the stats operation.
///
/// `cpu` is a fraction of one core, `mem` and `disk` are bytes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InstanceStats {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub cpu: f64,
    pub mem: u64,
    pub disk: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InstanceRecord {
    pub process_guid: String,
    pub instance_guid: String,
    pub index: u32,
    /// Unix seconds of the instance start, truncated.
    pub since: i64,
    /// Whole seconds since `since`, never negative.
    pub uptime: i64,
    pub state: InstanceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<InstanceStats>,
}

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("guids must be a comma separated list of process guids")]
    InvalidBulkQuery,

    #[error("process guid is missing")]
    MissingProcessGuid,

    #[error("authorization is missing")]
    MissingCredential,

    #[error("process group not found")]
    GroupNotFound,

    #[error(transparent)]
    InvalidProcessGuid(#[from] GuidError),

    #[error("orchestrator query failed")]
    Upstream,

    #[error("bulk worker pool is misconfigured")]
    InvalidWorkerPool,

    #[error("too many requests in flight")]
    Overloaded,
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        match self {
            StatusError::InvalidBulkQuery | StatusError::MissingProcessGuid => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            StatusError::MissingCredential => (StatusCode::UNAUTHORIZED, self.to_string()),
            StatusError::GroupNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            StatusError::InvalidProcessGuid(_)
            | StatusError::Upstream
            | StatusError::InvalidWorkerPool => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            StatusError::Overloaded => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        }
        .into_response()
    }
}
