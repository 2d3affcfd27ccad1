use thiserror::Error;

/// Errors surfaced by collaborator ports. Transient failures are caught at
/// the call site and degrade to empty data for the cycle.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Service not configured: {service}")]
    NotConfigured { service: String },

    #[error("{service} timed out after {duration_ms}ms")]
    Timeout { service: String, duration_ms: u64 },

    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },
}

/// Errors raised while dispatching a decision.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No collaborator wired for decision type {decision_type}")]
    NoCollaborator { decision_type: String },

    #[error("Execution failed for {decision_type}: {reason}")]
    Failed { decision_type: String, reason: String },

    #[error("Rollback after failed deploy also failed: {reason}")]
    RollbackFailed { reason: String },
}

/// Errors raised by the approval queue.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("No pending approval with id {id}")]
    NotFound { id: String },

    #[error("Approval {id} expired at {expired_at}")]
    Expired { id: String, expired_at: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_formatting() {
        let err = CollaboratorError::Timeout {
            service: "pool-discovery".to_string(),
            duration_ms: 15000,
        };
        let msg = err.to_string();
        assert!(msg.contains("pool-discovery"));
        assert!(msg.contains("15000"));
    }

    #[test]
    fn test_execution_error_formatting() {
        let err = ExecutionError::NoCollaborator {
            decision_type: "OPEN_HEDGE".to_string(),
        };
        assert!(err.to_string().contains("OPEN_HEDGE"));
    }
}
