//! Deadline budgets threaded through query-time reads.

use std::time::{Duration, Instant};

use crate::error::{Result, TesseraError};

/// A wall-clock deadline for one query evaluation.
///
/// Span and postings reads call [`QueryBudget::check`] before touching the
/// mapped files; once the deadline passes they fail with
/// [`TesseraError::Timeout`] instead of continuing to block on I/O.
#[derive(Debug, Clone, Copy)]
pub struct QueryBudget {
    deadline: Instant,
}

impl QueryBudget {
    /// A budget expiring `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        QueryBudget {
            deadline: Instant::now() + timeout,
        }
    }

    /// A budget expiring at `deadline`.
    pub fn until(deadline: Instant) -> Self {
        QueryBudget { deadline }
    }

    /// A budget that is already spent.
    pub fn expired() -> Self {
        QueryBudget {
            deadline: Instant::now(),
        }
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Fail with a timeout naming `what` if the deadline has passed.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_expired() {
            Err(TesseraError::timeout(format!("budget exhausted while reading {what}")))
        } else {
            Ok(())
        }
    }
}
