//! The total-timeout checkpoint: checked before each step dispatch and
//! before each per-source dispatch within a traverse/expand (§4.7, §5).

use broker_types::BrokerError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// Raises "Query execution timed out" if the deadline has already
    /// passed. Called at every checkpoint named in §4.7/§5.
    pub fn check(&self) -> Result<(), BrokerError> {
        if let Some(limit) = self.limit {
            if self.start.elapsed() >= limit {
                return Err(BrokerError::timeout("Query execution timed out"));
            }
        }
        Ok(())
    }

    /// Time left before the deadline, for bounding a concurrent join.
    pub fn remaining(&self) -> Result<Duration, BrokerError> {
        match self.limit {
            None => Ok(Duration::from_secs(u64::MAX / 2)),
            Some(limit) => {
                let elapsed = self.start.elapsed();
                if elapsed >= limit {
                    Err(BrokerError::timeout("Query execution timed out"))
                } else {
                    Ok(limit - elapsed)
                }
            }
        }
    }
}
