use async_trait::async_trait;
use graphbridge_cypher::Params;

use crate::error::TransportError;
use crate::graph::RawExecutionResult;

// ============================================================================
// Execution Collaborator Interface
// ============================================================================

/// Runs compiled Cypher against a graph database.
///
/// Implementations own the transport (HTTP, bolt, an in-memory fake). Parameters
/// arrive keyed without any sigil, matching the `{name}` tokens in the text.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: &Params,
    ) -> Result<RawExecutionResult, TransportError>;

    /// Endpoint path of the Cypher service, `None` when the server has none.
    fn supports_cypher(&self) -> Option<String>;
}

#[async_trait]
impl<E: CypherExecutor + ?Sized> CypherExecutor for std::sync::Arc<E> {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: &Params,
    ) -> Result<RawExecutionResult, TransportError> {
        (**self).execute_cypher(cypher, params).await
    }

    fn supports_cypher(&self) -> Option<String> {
        (**self).supports_cypher()
    }
}
