//! Saga status set.

use serde::{Deserialize, Serialize};

/// The status of a purchase saga.
///
/// Forward flow:
/// ```text
/// STARTED ──► IN_PROGRESS ──► COMPLETED
///                  │
///                  ├──► FAILED                         (first step refused)
///                  ├──► COMPENSATING ──► FAILED_COMPENSATED
///                  └──► CANCELLATION_REQUESTED ──► CANCELLING ──► CANCELLED
/// ```
/// `FAILED_REQUIRES_MANUAL_INTERVENTION` is reached when an irreversible
/// step (mark-as-sold, refund) fails; `FAILED_INITIAL_COMMAND` when the very
/// first command could not be enqueued; `CANCELLATION_FAILED` when a cancel
/// request arrived after the purchase was too far along to unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Started,
    InProgress,
    Compensating,
    CancellationRequested,
    Cancelling,
    Completed,
    Failed,
    FailedCompensated,
    Cancelled,
    CancellationFailed,
    FailedRequiresManualIntervention,
    FailedInitialCommand,
}

impl SagaStatus {
    /// Returns true if no further status transition will occur.
    ///
    /// `CANCELLATION_FAILED` is not terminal: the forward path that defeated
    /// the cancellation is still running and will finish the saga.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed
                | SagaStatus::Failed
                | SagaStatus::FailedCompensated
                | SagaStatus::Cancelled
                | SagaStatus::FailedRequiresManualIntervention
                | SagaStatus::FailedInitialCommand
        )
    }

    /// Returns true if a cancellation is already being driven.
    pub fn is_cancelling(&self) -> bool {
        matches!(
            self,
            SagaStatus::CancellationRequested | SagaStatus::Cancelling
        )
    }

    /// Returns the status name as it appears on the wire and in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::InProgress => "IN_PROGRESS",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::CancellationRequested => "CANCELLATION_REQUESTED",
            SagaStatus::Cancelling => "CANCELLING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::FailedCompensated => "FAILED_COMPENSATED",
            SagaStatus::Cancelled => "CANCELLED",
            SagaStatus::CancellationFailed => "CANCELLATION_FAILED",
            SagaStatus::FailedRequiresManualIntervention => {
                "FAILED_REQUIRES_MANUAL_INTERVENTION"
            }
            SagaStatus::FailedInitialCommand => "FAILED_INITIAL_COMMAND",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "STARTED" => SagaStatus::Started,
            "IN_PROGRESS" => SagaStatus::InProgress,
            "COMPENSATING" => SagaStatus::Compensating,
            "CANCELLATION_REQUESTED" => SagaStatus::CancellationRequested,
            "CANCELLING" => SagaStatus::Cancelling,
            "COMPLETED" => SagaStatus::Completed,
            "FAILED" => SagaStatus::Failed,
            "FAILED_COMPENSATED" => SagaStatus::FailedCompensated,
            "CANCELLED" => SagaStatus::Cancelled,
            "CANCELLATION_FAILED" => SagaStatus::CancellationFailed,
            "FAILED_REQUIRES_MANUAL_INTERVENTION" => {
                SagaStatus::FailedRequiresManualIntervention
            }
            "FAILED_INITIAL_COMMAND" => SagaStatus::FailedInitialCommand,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
