//! JSON query files for `graphbridge compile` / `graphbridge delete`.
//!
//! ```json
//! {
//!   "version": 1,
//!   "from": ["Post"],
//!   "joins": [{"label": "User", "relation": "HAS_AUTHOR", "direction": "OUT"}],
//!   "where": {"status": 1, "tag": ["rust", "graph"]},
//!   "select": ["title", "user.name AS author"],
//!   "order_by": ["created_at DESC"],
//!   "limit": 10
//! }
//! ```
//!
//! A `where` value is one of:
//! - a plain object: hash condition, keys in file order (`[..]` ⇒ `IN`, `null` ⇒ `IS NULL`,
//!   `{"raw": "..."}` ⇒ verbatim Cypher)
//! - a string: raw Cypher predicate
//! - an object with an `op` key: `and`, `or`, `not`, `in`, `between`, `compare`, `text`, `raw`

use anyhow::{anyhow, Result};
use graphbridge_cypher::{
    CompareOp, Condition, Direction, Expression, JoinSpec, OrderDirection, Params,
    QueryDescription, QueryValue, TextOp,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const QUERY_FILE_V1_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFileV1 {
    #[serde(default = "default_query_file_version")]
    pub version: u32,

    /// Node labels of the primary identifier.
    #[serde(default, alias = "from", alias = "label")]
    pub labels: LabelsIr,

    #[serde(default)]
    pub match_modifier: Option<String>,

    #[serde(default)]
    pub joins: Vec<JoinIr>,

    #[serde(default, alias = "where")]
    pub condition: Option<ConditionIr>,

    #[serde(default)]
    pub select: Vec<String>,

    #[serde(default)]
    pub group_by: Vec<String>,

    #[serde(default)]
    pub having: Option<ConditionIr>,

    #[serde(default)]
    pub distinct: bool,

    #[serde(default)]
    pub order_by: Vec<OrderIr>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default, alias = "skip")]
    pub offset: Option<u64>,

    #[serde(default)]
    pub union: Vec<UnionIr>,

    #[serde(default)]
    pub params: Params,
}

fn default_query_file_version() -> u32 {
    QUERY_FILE_V1_VERSION
}

/// `"Person"` or `["Person", "Admin"]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsIr {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl LabelsIr {
    fn into_vec(self) -> Vec<String> {
        match self {
            LabelsIr::None => Vec::new(),
            LabelsIr::One(label) => vec![label],
            LabelsIr::Many(labels) => labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinIr {
    #[serde(alias = "foreign_label")]
    pub label: String,
    /// One relationship type or several alternatives.
    #[serde(alias = "relations")]
    pub relation: LabelsIr,
    #[serde(default = "default_direction")]
    pub direction: Direction,
}

fn default_direction() -> Direction {
    Direction::In
}

/// `"created_at DESC"` or `{"column": "created_at", "direction": "desc"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderIr {
    Simple(String),
    Obj {
        column: String,
        #[serde(default)]
        direction: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionIr {
    #[serde(default)]
    pub all: bool,
    pub query: Box<QueryFileV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionIr {
    Raw(String),
    Op(ConditionOpIr),
    Hash(Map<String, Value>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ConditionOpIr {
    And {
        #[serde(alias = "of")]
        conditions: Vec<ConditionIr>,
    },
    Or {
        #[serde(alias = "of")]
        conditions: Vec<ConditionIr>,
    },
    Not {
        condition: Box<ConditionIr>,
    },
    In {
        column: String,
        values: Vec<Value>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        #[serde(default)]
        negated: bool,
    },
    Compare {
        column: String,
        operator: CompareOp,
        value: Value,
    },
    Text {
        column: String,
        operator: TextOp,
        value: String,
        #[serde(default)]
        negated: bool,
    },
    Raw {
        expression: String,
        #[serde(default)]
        params: Params,
    },
}

// ============================================================================
// Lowering
// ============================================================================

impl QueryFileV1 {
    pub fn parse(text: &str) -> Result<Self> {
        let file: QueryFileV1 =
            serde_json::from_str(text).map_err(|e| anyhow!("invalid query file: {e}"))?;
        if file.version != QUERY_FILE_V1_VERSION {
            return Err(anyhow!(
                "unsupported query file version {} (expected {QUERY_FILE_V1_VERSION})",
                file.version
            ));
        }
        Ok(file)
    }

    pub fn to_description(&self) -> Result<QueryDescription> {
        let mut q = QueryDescription::new().labels(self.labels.clone().into_vec());
        if let Some(modifier) = &self.match_modifier {
            q = q.match_modifier(modifier.clone());
        }
        for join in &self.joins {
            let relations = join.relation.clone().into_vec();
            if relations.is_empty() {
                return Err(anyhow!("join to `{}` names no relation", join.label));
            }
            q = q.join_spec(JoinSpec {
                foreign_label: join.label.clone(),
                relations,
                direction: join.direction,
            });
        }
        if let Some(condition) = &self.condition {
            q = q.filter(condition.to_condition()?);
        }
        if let Some(having) = &self.having {
            q = q.having(having.to_condition()?);
        }
        q = q
            .select(self.select.iter().map(String::as_str))
            .group_by(self.group_by.iter().map(String::as_str));
        if self.distinct {
            q = q.distinct();
        }
        for order in &self.order_by {
            let (column, direction) = order.to_order()?;
            q = q.order_by(column, direction);
        }
        if let Some(limit) = self.limit {
            q = q.limit(limit);
        }
        if let Some(offset) = self.offset {
            q = q.offset(offset);
        }
        for part in &self.union {
            let sub = part.query.to_description()?;
            q = if part.all { q.union_all(sub) } else { q.union(sub) };
        }
        for (name, value) in &self.params {
            q = q.param(name.clone(), value.clone());
        }
        Ok(q)
    }
}

impl OrderIr {
    fn to_order(&self) -> Result<(String, OrderDirection)> {
        let (column, direction) = match self {
            OrderIr::Simple(spec) => {
                let mut words = spec.split_whitespace();
                let column = words
                    .next()
                    .ok_or_else(|| anyhow!("empty ORDER BY entry"))?;
                (column.to_string(), words.next().map(str::to_string))
            }
            OrderIr::Obj { column, direction } => (column.clone(), direction.clone()),
        };
        let direction = match direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => OrderDirection::Asc,
            Some("desc") => OrderDirection::Desc,
            Some(other) => return Err(anyhow!("unknown sort direction `{other}`")),
        };
        Ok((column, direction))
    }
}

impl ConditionIr {
    pub fn to_condition(&self) -> Result<Condition> {
        Ok(match self {
            ConditionIr::Raw(text) => Condition::raw(Expression::new(text.clone())),
            ConditionIr::Hash(map) => {
                if let Some(op) = map.get("op") {
                    return Err(anyhow!("malformed `{op}` condition"));
                }
                let mut pairs = Vec::with_capacity(map.len());
                for (column, value) in map {
                    pairs.push((column.clone(), hash_value(value)?));
                }
                Condition::Hash(pairs)
            }
            ConditionIr::Op(op) => match op {
                ConditionOpIr::And { conditions } => Condition::And(lower_all(conditions)?),
                ConditionOpIr::Or { conditions } => Condition::Or(lower_all(conditions)?),
                ConditionOpIr::Not { condition } => condition.to_condition()?.negate(),
                ConditionOpIr::In {
                    column,
                    values,
                    negated,
                } => Condition::In {
                    column: column.clone(),
                    values: values.clone(),
                    negated: *negated,
                },
                ConditionOpIr::Between {
                    column,
                    low,
                    high,
                    negated,
                } => Condition::Between {
                    column: column.clone(),
                    low: low.clone(),
                    high: high.clone(),
                    negated: *negated,
                },
                ConditionOpIr::Compare {
                    column,
                    operator,
                    value,
                } => Condition::compare(column.clone(), *operator, value.clone()),
                ConditionOpIr::Text {
                    column,
                    operator,
                    value,
                    negated,
                } => Condition::Text {
                    column: column.clone(),
                    op: *operator,
                    value: value.clone(),
                    negated: *negated,
                },
                ConditionOpIr::Raw { expression, params } => {
                    Condition::raw(Expression::with_params(expression.clone(), params.clone()))
                }
            },
        })
    }
}

fn lower_all(conditions: &[ConditionIr]) -> Result<Vec<Condition>> {
    conditions.iter().map(ConditionIr::to_condition).collect()
}

fn hash_value(value: &Value) -> Result<QueryValue> {
    let Value::Object(obj) = value else {
        return Ok(QueryValue::from(value.clone()));
    };
    let Some(raw) = obj.get("raw") else {
        return Err(anyhow!(
            "hash values must be scalars, lists or {{\"raw\": ...}} objects"
        ));
    };
    let text = raw
        .as_str()
        .ok_or_else(|| anyhow!("`raw` must be a string"))?;
    let params: Params = match obj.get("params") {
        Some(p) => serde_json::from_value(p.clone())
            .map_err(|e| anyhow!("invalid raw params: {e}"))?,
        None => Params::new(),
    };
    Ok(QueryValue::Raw(Expression::with_params(text, params)))
}
