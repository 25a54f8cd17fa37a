//! Create-post saga state
//!
//! ```text
//! Init -> EntityCreated -> EventPublishing -> Done
//!                       -> RemoteStepPending -> RemoteStepDone -> EventPublishing -> Done
//!                                            -> RemoteStepFailed -> Compensating -> Compensated
//!                                                                                -> CompensationFailed
//! ```
//!
//! Runs live on the request's stack and are never persisted.

use serde::Serialize;
use std::fmt;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    Init,
    EntityCreated,
    RemoteStepPending,
    RemoteStepDone,
    RemoteStepFailed,
    Compensating,
    Compensated,
    CompensationFailed,
    EventPublishing,
    Done,
}

impl SagaState {
    pub fn can_advance_to(self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (Init, EntityCreated)
                | (EntityCreated, RemoteStepPending)
                | (EntityCreated, EventPublishing)
                | (RemoteStepPending, RemoteStepDone)
                | (RemoteStepPending, RemoteStepFailed)
                // Publishing the media step's result can still fail
                | (RemoteStepDone, EventPublishing)
                | (RemoteStepDone, RemoteStepFailed)
                | (RemoteStepFailed, Compensating)
                | (Compensating, Compensated)
                | (Compensating, CompensationFailed)
                | (EventPublishing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SagaState::Done | SagaState::Compensated | SagaState::CompensationFailed
        )
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaState::Init => "INIT",
            SagaState::EntityCreated => "ENTITY_CREATED",
            SagaState::RemoteStepPending => "REMOTE_STEP_PENDING",
            SagaState::RemoteStepDone => "REMOTE_STEP_DONE",
            SagaState::RemoteStepFailed => "REMOTE_STEP_FAILED",
            SagaState::Compensating => "COMPENSATING",
            SagaState::Compensated => "COMPENSATED",
            SagaState::CompensationFailed => "COMPENSATION_FAILED",
            SagaState::EventPublishing => "EVENT_PUBLISHING",
            SagaState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// One in-flight create-post saga
#[derive(Debug, Clone)]
pub struct SagaRun {
    pub post_id: Uuid,
    state: SagaState,
    history: Vec<SagaState>,
}

impl SagaRun {
    pub fn start(post_id: Uuid) -> Self {
        Self {
            post_id,
            state: SagaState::Init,
            history: vec![SagaState::Init],
        }
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[SagaState] {
        &self.history
    }

    pub fn advance(&mut self, next: SagaState) {
        if !self.state.can_advance_to(next) {
            warn!(
                post_id = %self.post_id,
                from = %self.state,
                to = %next,
                "Unexpected saga transition"
            );
        }

        match next {
            SagaState::CompensationFailed => error!(
                post_id = %self.post_id,
                from = %self.state,
                to = %next,
                "Saga transition"
            ),
            _ => debug!(
                post_id = %self.post_id,
                from = %self.state,
                to = %next,
                "Saga transition"
            ),
        }

        self.state = next;
        self.history.push(next);
    }
}
