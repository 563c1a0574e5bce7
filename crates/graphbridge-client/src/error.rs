use graphbridge_cypher::QueryError;
use std::collections::BTreeMap;

/// Failure reported by the execution collaborator before any response exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("Graph database unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The database answered with a non-2xx status.
    #[error("Cypher execution failed with status {status}: {payload}")]
    ExecutionFailed {
        status: u16,
        headers: BTreeMap<String, String>,
        payload: String,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Invalid result payload: {0}")]
    Decode(String),
    #[error("Graph database does not expose a Cypher endpoint")]
    CypherUnsupported,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ExecutionFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
