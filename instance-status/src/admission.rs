use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::api::StatusError;

/// Fixed-capacity gate shared by every instance endpoint. A full gate
/// refuses immediately; there is no wait queue.
#[derive(Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
}

/// Held for the lifetime of one admitted request; dropping it frees the
/// slot on every exit path, panics and disconnects included.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }
}

pub async fn admit(State(gate): State<AdmissionGate>, request: Request, next: Next) -> Response {
    match gate.try_admit() {
        Some(_permit) => next.run(request).await,
        None => StatusError::Overloaded.into_response(),
    }
}
