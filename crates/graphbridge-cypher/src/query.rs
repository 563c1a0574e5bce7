//! Query description: the SQL-shaped input of the compiler.
//!
//! The description speaks in graph terms (labels, relations, properties) but
//! keeps the shape of a relational query builder: select / from / where /
//! join / group / order / limit / union.

use crate::value::{Expression, Params, QueryValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Conditions
// ============================================================================

/// Comparison operators for [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    pub fn as_cypher(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// String predicates Cypher offers in place of SQL `LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextOp {
    pub fn as_cypher(self) -> &'static str {
        match self {
            TextOp::Contains => "CONTAINS",
            TextOp::StartsWith => "STARTS WITH",
            TextOp::EndsWith => "ENDS WITH",
        }
    }
}

/// A `WHERE` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column → value mapping, AND-ed. Pair order is placeholder order.
    Hash(Vec<(String, QueryValue)>),
    /// Pre-built Cypher predicate.
    Raw(Expression),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Text {
        column: String,
        op: TextOp,
        value: String,
        negated: bool,
    },
}

impl Condition {
    pub fn hash<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<QueryValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Condition::Hash(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn raw(expr: Expression) -> Self {
        Condition::Raw(expr)
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn in_list<T: Into<Value>>(column: impl Into<String>, values: Vec<T>) -> Self {
        Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Condition::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        }
    }

    pub fn text(column: impl Into<String>, op: TextOp, value: impl Into<String>) -> Self {
        Condition::Text {
            column: column.into(),
            op,
            value: value.into(),
            negated: false,
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Canonical form: nested groups of the same kind flattened, empty hashes,
    /// empty raw expressions and empty groups dropped, single-child groups
    /// unwrapped. `None` means "no condition at all".
    pub fn resolve(self) -> Option<Condition> {
        match self {
            Condition::Hash(pairs) if pairs.is_empty() => None,
            Condition::Raw(expr) if expr.text.trim().is_empty() => None,
            Condition::And(children) => resolve_group(children, true),
            Condition::Or(children) => resolve_group(children, false),
            Condition::Not(inner) => inner.resolve().map(|c| Condition::Not(Box::new(c))),
            other => Some(other),
        }
    }
}

fn resolve_group(children: Vec<Condition>, conjunction: bool) -> Option<Condition> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children.into_iter().filter_map(Condition::resolve) {
        match child {
            Condition::And(grand) if conjunction => flat.extend(grand),
            Condition::Or(grand) if !conjunction => flat.extend(grand),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ if conjunction => Some(Condition::And(flat)),
        _ => Some(Condition::Or(flat)),
    }
}

// ============================================================================
// Joins, columns, ordering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

/// One hop from the previous node in the pattern to a node with `foreign_label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub foreign_label: String,
    /// Relationship types; the first one names the relationship identifier.
    pub relations: Vec<String>,
    pub direction: Direction,
}

impl JoinSpec {
    pub fn new(
        foreign_label: impl Into<String>,
        relation: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            foreign_label: foreign_label.into(),
            relations: vec![relation.into()],
            direction,
        }
    }
}

/// A `RETURN` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Name(String),
    Aliased { expr: String, alias: String },
    Raw(Expression),
}

impl Column {
    /// `"name"` or `"expr AS alias"` (keyword matched case-insensitively).
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let lower = spec.to_ascii_lowercase();
        match lower.rfind(" as ") {
            Some(pos) => Column::Aliased {
                expr: spec[..pos].trim().to_string(),
                alias: spec[pos + 4..].trim().to_string(),
            },
            None => Column::Name(spec.to_string()),
        }
    }
}

impl From<&str> for Column {
    fn from(spec: &str) -> Self {
        Column::parse(spec)
    }
}

impl From<String> for Column {
    fn from(spec: String) -> Self {
        Column::parse(&spec)
    }
}

impl From<Expression> for Column {
    fn from(expr: Expression) -> Self {
        Column::Raw(expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
    Raw(Expression),
}

/// A query appended with `UNION` / `UNION ALL`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionPart {
    pub query: QueryDescription,
    pub all: bool,
}

// ============================================================================
// Query description
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescription {
    /// Injected right after `MATCH`.
    pub match_modifier: Option<String>,
    pub labels: Vec<String>,
    pub joins: Vec<JoinSpec>,
    pub condition: Option<Condition>,
    pub select: Vec<Column>,
    /// Takes precedence over `select` when non-empty.
    pub group_by: Vec<Column>,
    /// Always rejected by the compiler.
    pub having: Option<Condition>,
    pub distinct: bool,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<UnionPart>,
    /// Parameters referenced by raw fragments of this description.
    pub params: Params,
}

impl QueryDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.match_modifier = Some(modifier.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn join(
        mut self,
        foreign_label: impl Into<String>,
        relation: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.joins
            .push(JoinSpec::new(foreign_label, relation, direction));
        self
    }

    pub fn join_spec(mut self, join: JoinSpec) -> Self {
        self.joins.push(join);
        self
    }

    /// Replace the condition.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn and_filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::And(vec![existing, condition]),
            None => condition,
        });
        self
    }

    pub fn or_filter(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => Condition::Or(vec![existing, condition]),
            None => condition,
        });
        self
    }

    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn union(mut self, query: QueryDescription) -> Self {
        self.unions.push(UnionPart { query, all: false });
        self
    }

    pub fn union_all(mut self, query: QueryDescription) -> Self {
        self.unions.push(UnionPart { query, all: true });
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_parse_splits_alias() {
        assert_eq!(Column::parse("name"), Column::Name("name".to_string()));
        assert_eq!(
            Column::parse("count(n) as total"),
            Column::Aliased {
                expr: "count(n)".to_string(),
                alias: "total".to_string()
            }
        );
    }

    #[test]
    fn resolve_drops_empty_parts_and_flattens() {
        let cond = Condition::And(vec![
            Condition::Hash(Vec::new()),
            Condition::And(vec![Condition::equals("a", 1), Condition::equals("b", 2)]),
            Condition::Raw(Expression::new("  ")),
        ]);
        let resolved = cond.resolve().expect("non-empty");
        match resolved {
            Condition::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn resolve_unwraps_single_child() {
        let cond = Condition::Or(vec![Condition::Hash(Vec::new()), Condition::equals("a", 1)]);
        assert_eq!(cond.resolve(), Some(Condition::equals("a", 1)));
        assert_eq!(Condition::And(Vec::new()).resolve(), None);
    }

    #[test]
    fn and_filter_accumulates() {
        let q = QueryDescription::new()
            .and_filter(Condition::equals("a", 1))
            .and_filter(Condition::equals("b", json!("x")));
        assert!(matches!(q.condition, Some(Condition::And(ref c)) if c.len() == 2));
    }

    #[test]
    fn direction_serializes_uppercase() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Direction::Out)?, "\"OUT\"");
        let d: Direction = serde_json::from_str("\"IN\"")?;
        assert_eq!(d, Direction::In);
        Ok(())
    }
}
