use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Per-call context for the booking engine: the clock used for "not in the
/// past" checks and week windows, an optional deadline, and a correlation id
/// for logs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub now: DateTime<Utc>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            now: Utc::now().trunc_subsecs(0),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Fixed clock, no deadline.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            now,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn check_deadline(&self) -> AppResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::warn!(request_id = %self.request_id, "deadline exceeded, aborting");
                Err(AppError::DeadlineExceeded)
            }
            _ => Ok(()),
        }
    }
}
