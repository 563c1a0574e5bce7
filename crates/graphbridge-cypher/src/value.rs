//! Values that flow into compiled queries.
//!
//! A condition value is decided once, when the query description is built:
//! it is either null, a bindable scalar, a list of scalars, or a raw Cypher
//! expression that carries its own named parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parameter table of a compiled query (name → bound value).
pub type Params = BTreeMap<String, Value>;

/// A raw Cypher fragment spliced into the query text verbatim.
///
/// Its parameters are merged into the query's parameter table as-is; they do
/// not go through placeholder allocation. Names written with the `@` sigil
/// (e.g. `@min_age`) are rewritten to brace form like generated placeholders.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Expression {
    pub text: String,
    #[serde(default)]
    pub params: Params,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Bind one named parameter.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Value side of a hash condition.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Compiles to `IS NULL`; consumes no placeholder.
    Null,
    /// One placeholder.
    Scalar(Value),
    /// Compiles to `IN [...]` with one placeholder per element.
    List(Vec<Value>),
    /// Spliced verbatim.
    Raw(Expression),
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => QueryValue::Null,
            Value::Array(items) => QueryValue::List(items),
            other => QueryValue::Scalar(other),
        }
    }
}

impl From<Expression> for QueryValue {
    fn from(expr: Expression) -> Self {
        QueryValue::Raw(expr)
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Scalar(Value::from(s))
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Scalar(Value::from(s))
    }
}

impl From<i32> for QueryValue {
    fn from(n: i32) -> Self {
        QueryValue::Scalar(Value::from(n))
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue::Scalar(Value::from(n))
    }
}

impl From<u64> for QueryValue {
    fn from(n: u64) -> Self {
        QueryValue::Scalar(Value::from(n))
    }
}

impl From<f64> for QueryValue {
    fn from(n: f64) -> Self {
        QueryValue::Scalar(Value::from(n))
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Scalar(Value::from(b))
    }
}

impl<T: Into<Value>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        QueryValue::List(items.into_iter().map(Into::into).collect())
    }
}
