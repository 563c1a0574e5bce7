//! Clause builders.
//!
//! Each builder renders one clause from one fragment of the query description.
//! Builders that need placeholders take the [`ParamBinder`] explicitly; the
//! compiler calls them in text order so placeholder numbering follows the
//! order in which values appear in the query.

use crate::binder::ParamBinder;
use crate::config::CompilerConfig;
use crate::error::QueryError;
use crate::query::{Column, CompareOp, Condition, Direction, JoinSpec, OrderDirection};
use crate::value::QueryValue;
use serde_json::Value;
use std::collections::BTreeSet;

/// Bound to the primary matched node.
pub const PRIMARY_IDENTIFIER: &str = "n";
/// Bound to the relationship traversed by delete compilation.
pub const RELATION_IDENTIFIER: &str = "r";

// ============================================================================
// Identifiers and columns
// ============================================================================

/// `HAS_AUTHOR` → `hasAuthor`, `BlogPost` → `blogPost`, `user-profile` → `userProfile`.
pub fn lower_camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let words = label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty());

    for (index, word) in words.enumerate() {
        // Shouting words (`HAS`, `URL`) are treated as plain words.
        let normalized = if word.chars().any(|c| c.is_lowercase()) {
            word.to_string()
        } else {
            word.to_lowercase()
        };
        let mut chars = normalized.chars();
        if let Some(first) = chars.next() {
            if index == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Qualify a plain column name with the primary identifier.
///
/// Function calls (`count(n)`), already-qualified names (`user.name`) and the
/// identifier itself are left alone.
pub fn qualify_column(column: &str, config: &CompilerConfig) -> String {
    let column = column.trim();
    if !config.qualify_columns
        || column.contains('(')
        || column.contains('.')
        || column == PRIMARY_IDENTIFIER
        || column == "*"
    {
        return column.to_string();
    }
    format!("{PRIMARY_IDENTIFIER}.{column}")
}

fn checked_column(column: &str, config: &CompilerConfig) -> Result<String, QueryError> {
    if column.trim().is_empty() {
        return Err(QueryError::EmptyColumn);
    }
    Ok(qualify_column(column, config))
}

/// Property key used in `SET` / `CREATE` maps; never qualified.
pub(crate) fn checked_assignment_key(key: &str) -> Result<&str, QueryError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(QueryError::EmptyColumn);
    }
    Ok(key)
}

/// Single term unparenthesized; otherwise `(a) OP (b) OP ...`.
fn join_terms(terms: Vec<String>, op: &str) -> String {
    match terms.len() {
        0 => String::new(),
        1 => terms.into_iter().next().unwrap_or_default(),
        _ => terms
            .iter()
            .map(|t| format!("({t})"))
            .collect::<Vec<_>>()
            .join(&format!(" {op} ")),
    }
}

// ============================================================================
// MATCH / pattern
// ============================================================================

pub fn build_match(modifier: Option<&str>) -> String {
    match modifier.map(str::trim).filter(|m| !m.is_empty()) {
        Some(modifier) => format!("MATCH {modifier}"),
        None => "MATCH".to_string(),
    }
}

pub fn build_from<L: AsRef<str>>(labels: &[L]) -> String {
    let mut out = PRIMARY_IDENTIFIER.to_string();
    for label in labels {
        out.push(':');
        out.push_str(label.as_ref());
    }
    out
}

/// Render join hops as a chained directed pattern.
///
/// `Direction::Out` renders an incoming arrow (`<-[..]-`) and `Direction::In`
/// an outgoing one; callers depend on this orientation.
pub fn build_join(joins: &[JoinSpec], separator: &str) -> Result<String, QueryError> {
    let mut taken: BTreeSet<String> = [PRIMARY_IDENTIFIER, RELATION_IDENTIFIER]
        .iter()
        .map(|s| s.to_string())
        .collect();
    taken.insert(delete_identifier());

    let mut hops = Vec::with_capacity(joins.len());
    for join in joins {
        let relation = join.relations.first().ok_or_else(|| {
            QueryError::InvalidJoin(format!(
                "join to `{}` names no relation",
                join.foreign_label
            ))
        })?;
        let node_id = lower_camel_case(&join.foreign_label);
        let rel_id = lower_camel_case(relation);
        for id in [&node_id, &rel_id] {
            if id.is_empty() {
                return Err(QueryError::InvalidJoin(format!(
                    "cannot derive an identifier for join to `{}`",
                    join.foreign_label
                )));
            }
            if !taken.insert(id.clone()) {
                return Err(QueryError::DuplicateIdentifier(id.clone()));
            }
        }

        let rel_types = join.relations.join("|");
        let hop = match join.direction {
            Direction::Out => format!(
                "<-[{rel_id}:{rel_types}]-({node_id}:{})",
                join.foreign_label
            ),
            Direction::In => format!(
                "-[{rel_id}:{rel_types}]->({node_id}:{})",
                join.foreign_label
            ),
        };
        hops.push(hop);
    }
    Ok(hops.join(separator))
}

// ============================================================================
// WHERE
// ============================================================================

pub fn build_where(
    condition: Option<&Condition>,
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    match condition {
        Some(condition) => {
            let text = build_condition(condition, binder, config)?;
            if text.is_empty() {
                Ok(String::new())
            } else {
                Ok(format!("WHERE {text}"))
            }
        }
        None => Ok(String::new()),
    }
}

pub fn build_condition(
    condition: &Condition,
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    match condition {
        Condition::Hash(pairs) => build_hash_condition(pairs, binder, config),
        Condition::Raw(expr) => Ok(binder.merge_expression(expr)),
        Condition::And(children) => build_group(children, "AND", binder, config),
        Condition::Or(children) => build_group(children, "OR", binder, config),
        Condition::Not(inner) => {
            let text = build_condition(inner, binder, config)?;
            if text.is_empty() {
                Ok(text)
            } else {
                Ok(format!("NOT ({text})"))
            }
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            let column = checked_column(column, config)?;
            Ok(build_in_condition(&column, values, *negated, binder))
        }
        Condition::Between {
            column,
            low,
            high,
            negated,
        } => {
            let column = checked_column(column, config)?;
            let low = binder.bind(low.clone());
            let high = binder.bind(high.clone());
            let text = format!("{column} >= {low} AND {column} <= {high}");
            Ok(if *negated { format!("NOT ({text})") } else { text })
        }
        Condition::Compare { column, op, value } => {
            let column = checked_column(column, config)?;
            Ok(match (op, value) {
                (CompareOp::Eq, Value::Null) => format!("{column} IS NULL"),
                (CompareOp::Ne, Value::Null) => format!("{column} IS NOT NULL"),
                _ => {
                    let placeholder = binder.bind(value.clone());
                    format!("{column} {} {placeholder}", op.as_cypher())
                }
            })
        }
        Condition::Text {
            column,
            op,
            value,
            negated,
        } => {
            let column = checked_column(column, config)?;
            let placeholder = binder.bind(Value::String(value.clone()));
            let text = format!("{column} {} {placeholder}", op.as_cypher());
            Ok(if *negated { format!("NOT {text}") } else { text })
        }
    }
}

fn build_group(
    children: &[Condition],
    op: &str,
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    let mut terms = Vec::with_capacity(children.len());
    for child in children {
        let text = build_condition(child, binder, config)?;
        if !text.is_empty() {
            terms.push(text);
        }
    }
    Ok(join_terms(terms, op))
}

/// `column=value` pairs AND-ed together, in pair order.
pub fn build_hash_condition(
    pairs: &[(String, QueryValue)],
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    let mut terms = Vec::with_capacity(pairs.len());
    for (column, value) in pairs {
        let column = checked_column(column, config)?;
        let term = match value {
            QueryValue::List(values) => build_in_condition(&column, values, false, binder),
            QueryValue::Null => format!("{column} IS NULL"),
            QueryValue::Raw(expr) => format!("{column}={}", binder.merge_expression(expr)),
            QueryValue::Scalar(value) => {
                let placeholder = binder.bind(value.clone());
                format!("{column}={placeholder}")
            }
        };
        terms.push(term);
    }
    Ok(join_terms(terms, "AND"))
}

pub fn build_in_condition(
    column: &str,
    values: &[Value],
    negated: bool,
    binder: &mut ParamBinder,
) -> String {
    let placeholders: Vec<String> = values.iter().map(|v| binder.bind(v.clone())).collect();
    let text = format!("{column} IN [{}]", placeholders.join(","));
    if negated {
        format!("NOT {text}")
    } else {
        text
    }
}

// ============================================================================
// RETURN / ORDER BY / SKIP + LIMIT
// ============================================================================

/// The primary identifier is always returned after any explicit columns.
pub fn build_return(
    columns: &[Column],
    distinct: bool,
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    let mut items = Vec::with_capacity(columns.len() + 1);
    for column in columns {
        match column {
            Column::Name(name) => {
                let name = checked_column(name, config)?;
                if name != "*" && name != PRIMARY_IDENTIFIER {
                    items.push(name);
                }
            }
            Column::Aliased { expr, alias } => {
                let expr = checked_column(expr, config)?;
                items.push(format!("{expr} AS {alias}"));
            }
            Column::Raw(expr) => items.push(binder.merge_expression(expr)),
        }
    }
    items.push(PRIMARY_IDENTIFIER.to_string());

    let distinct = if distinct { "DISTINCT " } else { "" };
    Ok(format!("RETURN {distinct}{}", items.join(", ")))
}

pub fn build_order_by(
    columns: &[(String, OrderDirection)],
    binder: &mut ParamBinder,
    config: &CompilerConfig,
) -> Result<String, QueryError> {
    if columns.is_empty() {
        return Ok(String::new());
    }
    let mut items = Vec::with_capacity(columns.len());
    for (name, direction) in columns {
        let item = match direction {
            OrderDirection::Raw(expr) => binder.merge_expression(expr),
            OrderDirection::Asc => checked_column(name, config)?,
            OrderDirection::Desc => format!("{} DESC", checked_column(name, config)?),
        };
        items.push(item);
    }
    Ok(format!("ORDER BY {}", items.join(", ")))
}

/// `SKIP` precedes `LIMIT` (Cypher clause order); `Some(0)` is an explicit bound.
pub fn build_limit(limit: Option<u64>, skip: Option<u64>, separator: &str) -> String {
    let mut lines = Vec::with_capacity(2);
    if let Some(skip) = skip {
        lines.push(format!("SKIP {skip}"));
    }
    if let Some(limit) = limit {
        lines.push(format!("LIMIT {limit}"));
    }
    lines.join(separator)
}

// ============================================================================
// DELETE
// ============================================================================

fn delete_identifier() -> String {
    format!("{RELATION_IDENTIFIER}{PRIMARY_IDENTIFIER}")
}

/// The optional one-hop expansion used by delete compilation, plus the
/// identifier it binds for the far node.
pub fn build_directed_relations() -> (String, String) {
    let far = delete_identifier();
    let clause = format!("OPTIONAL MATCH ({PRIMARY_IDENTIFIER})-[{RELATION_IDENTIFIER}]->({far})");
    (clause, far)
}

pub fn build_delete(far_identifier: &str) -> String {
    format!("DELETE {PRIMARY_IDENTIFIER},{RELATION_IDENTIFIER},{far_identifier}")
}
