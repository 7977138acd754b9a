//! Scheduler-level failure reporting.
//!
//! System failures do not cancel their stage; they are collected and
//! surfaced once the whole run has drained, each with stage and system
//! identity attached.

use std::fmt;

use crate::ecs::error::ExecutionError;

/// One system's failure, with identity attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFailure {
    /// Name of the stage the system ran in.
    pub stage: &'static str,

    /// Name of the failing system.
    pub system: &'static str,

    /// The failure value the body returned.
    pub error: ExecutionError,
}

impl fmt::Display for SystemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} / {}] {}", self.stage, self.system, self.error)
    }
}

impl std::error::Error for SystemFailure {}

/// Aggregate of every system failure observed across a scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFailures {
    /// Failures in stage order, then system registration order.
    pub failures: Vec<SystemFailure>,
}

impl fmt::Display for ScheduleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} system(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ScheduleFailures {}
