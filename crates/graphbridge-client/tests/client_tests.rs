//! GraphClient tests against a canned in-memory executor.

use async_trait::async_trait;
use graphbridge_client::*;
use graphbridge_cypher::{Condition, Params, QueryDescription, QueryValue};
use serde_json::json;
use std::sync::Mutex;

/// Replays one canned response and records what it was asked to run.
struct CannedExecutor {
    endpoint: Option<String>,
    response: Result<RawExecutionResult, TransportError>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl CannedExecutor {
    fn answering(response: RawExecutionResult) -> Self {
        Self {
            endpoint: Some("/db/data/cypher".to_string()),
            response: Ok(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: TransportError) -> Self {
        Self {
            endpoint: Some("/db/data/cypher".to_string()),
            response: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn without_cypher() -> Self {
        Self {
            endpoint: None,
            response: Ok(RawExecutionResult::new(200, r#"{"columns":[],"data":[]}"#)),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CypherExecutor for CannedExecutor {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: &Params,
    ) -> Result<RawExecutionResult, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((cypher.to_string(), params.clone()));
        self.response.clone()
    }

    fn supports_cypher(&self) -> Option<String> {
        self.endpoint.clone()
    }
}

fn person_payload() -> String {
    json!({
        "columns": ["n", "score"],
        "data": [
            [{"self": "http://localhost:7474/db/data/node/1",
              "metadata": {"id": 1, "labels": ["Person"]},
              "data": {"name": "Sam", "status": 1}}, 0.5],
            [{"self": "http://localhost:7474/db/data/node/2",
              "metadata": {"id": 2, "labels": ["Person"]},
              "data": {"name": "Jane", "status": 1}}, 0.7]
        ]
    })
    .to_string()
}

fn active_people() -> QueryDescription {
    QueryDescription::new()
        .label("Person")
        .filter(Condition::hash([("status", QueryValue::from(1))]))
}

// ============================================================================
// Query Tests
// ============================================================================

#[tokio::test]
async fn test_query_all_sends_compiled_text_and_flattens_nodes() -> anyhow::Result<()> {
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        person_payload(),
    )));

    let records = client.query_all(&active_people(), &Params::new()).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(&json!("Sam")));
    assert_eq!(records[1].get("name"), Some(&json!("Jane")));

    let calls = client.executor().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "MATCH (n:Person)\nWHERE n.status={p0}\nRETURN n");
    assert_eq!(calls[0].1.get("p0"), Some(&json!(1)));
    Ok(())
}

#[tokio::test]
async fn test_query_one_limits_to_a_single_row() -> anyhow::Result<()> {
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        person_payload(),
    )));

    let record = client.query_one(&active_people(), &Params::new()).await?;
    assert_eq!(record.and_then(|r| r.get("name").cloned()), Some(json!("Sam")));
    assert!(client.executor().calls()[0].0.ends_with("LIMIT 1"));
    Ok(())
}

#[tokio::test]
async fn test_query_scalar_reads_first_cell() -> anyhow::Result<()> {
    let payload = json!({"columns": ["count(n)"], "data": [[7]]}).to_string();
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200, payload,
    )));

    let query = active_people().select(["count(n)"]);
    let count = client.query_scalar(&query, &Params::new()).await?;
    assert_eq!(count, Some(json!(7)));
    Ok(())
}

#[tokio::test]
async fn test_node_and_relationship_lookup_by_id() -> anyhow::Result<()> {
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        person_payload(),
    )));
    let node = client.node(1).await?.expect("node");
    assert_eq!(node.id, 1);
    assert_eq!(node.labels, vec!["Person".to_string()]);

    let calls = client.executor().calls();
    assert_eq!(calls[0].0, "MATCH (n)\nWHERE id(n)={id}\nRETURN n");
    assert_eq!(calls[0].1, Params::from([("id".to_string(), json!(1))]));

    let rel_payload = json!({
        "columns": ["r"],
        "data": [[{"self": "http://localhost:7474/db/data/relationship/4",
                   "start": "http://localhost:7474/db/data/node/1",
                   "end": "http://localhost:7474/db/data/node/2",
                   "type": "KNOWS", "data": {}}]]
    })
    .to_string();
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        rel_payload,
    )));
    let rel = client.relationship(4).await?.expect("relationship");
    assert_eq!(rel.rel_type, "KNOWS");
    assert_eq!((rel.start, rel.end), (Some(1), Some(2)));
    Ok(())
}

#[tokio::test]
async fn test_add_labels_escapes_label_names() -> anyhow::Result<()> {
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        person_payload(),
    )));
    client.add_labels(1, &["Admin", "Odd`Name"]).await?;
    let calls = client.executor().calls();
    assert_eq!(
        calls[0].0,
        "MATCH (n)\nWHERE id(n)={id}\nSET n:`Admin`:`Odd``Name`\nRETURN n"
    );
    Ok(())
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_non_success_status_surfaces_execution_failed() {
    let client = GraphClient::new(CannedExecutor::answering(
        RawExecutionResult::new(500, r#"{"exception":"SyntaxException"}"#)
            .with_header("content-type", "application/json"),
    ));

    let err = client
        .query_all(&active_people(), &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    match err {
        ClientError::ExecutionFailed { payload, headers, .. } => {
            assert!(payload.contains("SyntaxException"));
            assert_eq!(headers.len(), 1);
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_errors_propagate_unchanged() {
    let client = GraphClient::new(CannedExecutor::failing(TransportError::Timeout {
        after_ms: 250,
    }));
    let err = client
        .query_all(&active_people(), &Params::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Timeout { after_ms: 250 })
    ));
}

#[tokio::test]
async fn test_missing_cypher_endpoint_stops_before_execution() {
    let client = GraphClient::new(CannedExecutor::without_cypher());
    let err = client
        .query_all(&active_people(), &Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::CypherUnsupported));
    assert!(client.executor().calls().is_empty());
}

#[tokio::test]
async fn test_compile_errors_never_reach_the_executor() {
    let client = GraphClient::new(CannedExecutor::answering(RawExecutionResult::new(
        200,
        person_payload(),
    )));
    let query = active_people().having(Condition::equals("score", 1));
    let err = client
        .query_all(&query, &Params::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Query(_)));
    assert!(client.executor().calls().is_empty());
}
