//! Graph result model and Neo4j REST Cypher payload decoding.
//!
//! The REST Cypher endpoint answers with
//!
//! ```json
//! {"columns": ["n", "count"],
//!  "data": [[{"self": "http://host/db/data/node/5",
//!             "metadata": {"id": 5, "labels": ["Person"]},
//!             "data": {"name": "Sam"}}, 3]]}
//! ```
//!
//! Cells that carry `metadata.labels` (or a `self` URL under `/node/`) are
//! nodes, cells with `metadata.type` (or `/relationship/`) are relationships,
//! everything else is a scalar.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ClientError;

/// Flat record handed back to the caller.
pub type PropertyMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub rel_type: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// One slot of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphValue {
    Scalar { value: Value },
    Node(Node),
    Relationship(Relationship),
}

impl GraphValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        GraphValue::Scalar {
            value: value.into(),
        }
    }

    /// Property container of a node or relationship; `None` for scalars.
    pub fn properties(&self) -> Option<&PropertyMap> {
        match self {
            GraphValue::Node(node) => Some(&node.properties),
            GraphValue::Relationship(rel) => Some(&rel.properties),
            GraphValue::Scalar { .. } => None,
        }
    }

    /// JSON view: graph elements collapse to their properties.
    pub fn to_json(&self) -> Value {
        match self {
            GraphValue::Scalar { value } => value.clone(),
            GraphValue::Node(node) => Value::Object(node.properties.clone()),
            GraphValue::Relationship(rel) => Value::Object(rel.properties.clone()),
        }
    }

    /// Classify one REST payload cell.
    pub fn from_rest_cell(cell: Value) -> Self {
        let Value::Object(mut obj) = cell else {
            return GraphValue::Scalar { value: cell };
        };

        let self_url = obj.get("self").and_then(Value::as_str).map(str::to_string);
        let metadata = obj.get("metadata").and_then(Value::as_object).cloned();
        let is_node = metadata
            .as_ref()
            .is_some_and(|m| m.contains_key("labels"))
            || self_url.as_deref().is_some_and(|u| u.contains("/node/"));
        let is_relationship = metadata
            .as_ref()
            .is_some_and(|m| m.contains_key("type"))
            || self_url
                .as_deref()
                .is_some_and(|u| u.contains("/relationship/"));

        if !is_node && !is_relationship {
            return GraphValue::Scalar {
                value: Value::Object(obj),
            };
        }

        let properties = match obj.remove("data") {
            Some(Value::Object(props)) => props,
            _ => PropertyMap::new(),
        };
        let metadata = metadata.unwrap_or_default();
        let id = metadata
            .get("id")
            .and_then(Value::as_i64)
            .or_else(|| self_url.as_deref().and_then(trailing_id))
            .unwrap_or(-1);

        if is_relationship {
            let rel_type = metadata
                .get("type")
                .or_else(|| obj.get("type"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let start = obj.get("start").and_then(Value::as_str).and_then(trailing_id);
            let end = obj.get("end").and_then(Value::as_str).and_then(trailing_id);
            return GraphValue::Relationship(Relationship {
                id,
                rel_type,
                start,
                end,
                properties,
            });
        }

        let labels = metadata
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        GraphValue::Node(Node {
            id,
            labels,
            properties,
        })
    }
}

fn trailing_id(url: &str) -> Option<i64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Decoded tabular result: named columns, one value per column per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<GraphValue>>,
}

#[derive(Deserialize)]
struct RestPayload {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Decode a REST Cypher payload. An empty body (a `204`, or a write with
    /// nothing to return) is an empty result.
    pub fn from_rest_json(payload: &str) -> Result<Self, ClientError> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RestPayload =
            serde_json::from_str(payload).map_err(|e| ClientError::Decode(e.to_string()))?;
        let width = raw.columns.len();
        let mut rows = Vec::with_capacity(raw.data.len());
        for (index, row) in raw.data.into_iter().enumerate() {
            if width > 0 && row.len() != width {
                return Err(ClientError::Decode(format!(
                    "row {index} has {} cells for {width} columns",
                    row.len()
                )));
            }
            rows.push(row.into_iter().map(GraphValue::from_rest_cell).collect());
        }
        Ok(Self {
            columns: raw.columns,
            rows,
        })
    }

    /// Inverse of [`ResultSet::from_rest_json`], used by test doubles and captures.
    pub fn to_rest_json(&self) -> Value {
        let data: Vec<Value> = self
            .rows
            .iter()
            .map(|row| Value::Array(row.iter().map(rest_cell).collect()))
            .collect();
        serde_json::json!({ "columns": self.columns, "data": data })
    }
}

fn rest_cell(value: &GraphValue) -> Value {
    match value {
        GraphValue::Scalar { value } => value.clone(),
        GraphValue::Node(node) => serde_json::json!({
            "self": format!("/db/data/node/{}", node.id),
            "metadata": { "id": node.id, "labels": node.labels },
            "data": node.properties,
        }),
        GraphValue::Relationship(rel) => {
            let mut cell = serde_json::json!({
                "self": format!("/db/data/relationship/{}", rel.id),
                "metadata": { "id": rel.id, "type": rel.rel_type },
                "type": rel.rel_type,
                "data": rel.properties,
            });
            if let Some(start) = rel.start {
                cell["start"] = Value::String(format!("/db/data/node/{start}"));
            }
            if let Some(end) = rel.end {
                cell["end"] = Value::String(format!("/db/data/node/{end}"));
            }
            cell
        }
    }
}

/// What the execution collaborator hands back: status, headers, raw body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExecutionResult {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub payload: String,
}

impl RawExecutionResult {
    pub fn new(status: u16, payload: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            payload: payload.into(),
        }
    }

    /// A `200` carrying `result` in REST payload form.
    pub fn ok(result: &ResultSet) -> Self {
        let mut raw = Self::new(200, result.to_rest_json().to_string());
        raw.headers
            .insert("content-type".to_string(), "application/json".to_string());
        raw
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
