//! SQL `SELECT` text lowered into a query description.
//!
//! `sqlparser` does the parsing; this module maps the relational subset that
//! has a Cypher counterpart:
//!
//! ```sql
//! SELECT DISTINCT name, age AS years
//! FROM Person p
//! WHERE p.status = 1 AND (city IN ('Oslo', 'Bergen') OR name LIKE 'Sa%')
//! ORDER BY age DESC
//! LIMIT 10 OFFSET 20;
//! ```
//!
//! - each `FROM` table is a node label (`FROM Person, Admin` ⇒ `(n:Person:Admin)`)
//! - a table name or alias is an alternative spelling of `n`
//!   (`p.status` and `Person.status` ⇒ `n.status`)
//! - `LIKE` patterns map to `STARTS WITH` / `ENDS WITH` / `CONTAINS`
//! - `HAVING` is carried through so the compiler can reject it
//!
//! SQL joins, subqueries and `DISTINCT ON` are rejected.

use anyhow::{anyhow, Result};
use graphbridge_cypher::{
    CompareOp, Condition, Expression, OrderDirection, QueryDescription, QueryError, TextOp,
    PRIMARY_IDENTIFIER,
};
use serde_json::Value;
use sqlparser::ast::{
    BinaryOperator, Distinct, Expr, GroupByExpr, Ident, ObjectName, Query, Select, SelectItem,
    SetExpr, SetOperator, SetQuantifier, Statement, TableAlias, TableFactor, UnaryOperator,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub fn parse_sql_query(input: &str) -> Result<QueryDescription> {
    let dialect = GenericDialect {};
    let mut statements =
        Parser::parse_sql(&dialect, input).map_err(|e| anyhow!("failed to parse SQL: {e}"))?;
    if statements.len() != 1 {
        return Err(anyhow!(
            "expected exactly one SQL statement, got {}",
            statements.len()
        ));
    }
    match statements.remove(0) {
        Statement::Query(q) => lower_query(&q),
        other => Err(anyhow!("only SELECT statements are supported, got `{other}`")),
    }
}

fn lower_query(query: &Query) -> Result<QueryDescription> {
    if query.with.is_some() {
        return Err(unsupported("WITH"));
    }
    let mut q = lower_set_expr(&query.body)?;

    if !q.unions.is_empty()
        && (!query.order_by.is_empty() || query.limit.is_some() || query.offset.is_some())
    {
        return Err(anyhow!(
            "ORDER BY / LIMIT / OFFSET over a UNION is not supported; apply them per part"
        ));
    }

    let qualifiers = from_qualifiers(&query.body);
    for order in &query.order_by {
        let column = column_name(&order.expr, &qualifiers)?;
        let direction = if order.asc == Some(false) {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        };
        q = q.order_by(column, direction);
    }
    if let Some(limit) = &query.limit {
        q = q.limit(expr_as_u64(limit, "LIMIT")?);
    }
    if let Some(offset) = &query.offset {
        q = q.offset(expr_as_u64(&offset.value, "OFFSET")?);
    }
    Ok(q)
}

fn lower_set_expr(body: &SetExpr) -> Result<QueryDescription> {
    match body {
        SetExpr::Select(select) => lower_select(select),
        SetExpr::Query(inner) => lower_query(inner),
        SetExpr::SetOperation {
            op: SetOperator::Union,
            set_quantifier,
            left,
            right,
        } => {
            let primary = lower_set_expr(left)?;
            let part = lower_set_expr(right)?;
            Ok(match set_quantifier {
                SetQuantifier::All => primary.union_all(part),
                _ => primary.union(part),
            })
        }
        SetExpr::SetOperation { op, .. } => Err(unsupported(&op.to_string())),
        other => Err(anyhow!("unsupported query body: {other}")),
    }
}

fn lower_select(select: &Select) -> Result<QueryDescription> {
    let mut q = QueryDescription::new();
    let mut qualifiers = Vec::new();

    // FROM
    for table in &select.from {
        if !table.joins.is_empty() {
            return Err(unsupported("SQL JOIN"));
        }
        match &table.relation {
            TableFactor::Table { name, alias, .. } => {
                q = q.label(name.to_string());
                qualifiers.extend(table_qualifiers(name, alias.as_ref()));
            }
            TableFactor::Derived { .. } => return Err(unsupported("subquery")),
            other => return Err(anyhow!("unsupported FROM item: {other}")),
        }
    }

    match &select.distinct {
        None => {}
        Some(Distinct::Distinct) => q = q.distinct(),
        Some(Distinct::On(_)) => return Err(unsupported("DISTINCT ON")),
    }

    // SELECT
    let mut columns = Vec::new();
    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {}
            SelectItem::UnnamedExpr(expr) => columns.push(column_name(expr, &qualifiers)?),
            SelectItem::ExprWithAlias { expr, alias } => {
                columns.push(format!("{} AS {}", column_name(expr, &qualifiers)?, alias.value))
            }
        }
    }
    q = q.select(columns);

    // WHERE
    if let Some(selection) = &select.selection {
        q = q.filter(lower_condition(selection, &qualifiers)?);
    }

    match &select.group_by {
        GroupByExpr::Expressions(exprs) => {
            let mut group = Vec::with_capacity(exprs.len());
            for expr in exprs {
                group.push(column_name(expr, &qualifiers)?);
            }
            q = q.group_by(group);
        }
        GroupByExpr::All => return Err(unsupported("GROUP BY ALL")),
    }

    if let Some(having) = &select.having {
        q = q.having(Condition::raw(Expression::new(having.to_string())));
    }
    Ok(q)
}

fn from_qualifiers(body: &SetExpr) -> Vec<String> {
    let SetExpr::Select(select) = body else {
        return Vec::new();
    };
    select
        .from
        .iter()
        .flat_map(|table| match &table.relation {
            TableFactor::Table { name, alias, .. } => table_qualifiers(name, alias.as_ref()),
            _ => Vec::new(),
        })
        .collect()
}

/// Names that may qualify a column of this table: the table name itself and
/// its alias, if any. Both stand for the primary node.
fn table_qualifiers(name: &ObjectName, alias: Option<&TableAlias>) -> Vec<String> {
    name.0
        .last()
        .map(|table| table.value.clone())
        .into_iter()
        .chain(alias.map(|alias| alias.name.value.clone()))
        .collect()
}

// ============================================================================
// WHERE
// ============================================================================

fn lower_condition(expr: &Expr, qualifiers: &[String]) -> Result<Condition> {
    match expr {
        Expr::Nested(inner) => lower_condition(inner, qualifiers),
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => Ok(Condition::And(vec![
                lower_condition(left, qualifiers)?,
                lower_condition(right, qualifiers)?,
            ])),
            BinaryOperator::Or => Ok(Condition::Or(vec![
                lower_condition(left, qualifiers)?,
                lower_condition(right, qualifiers)?,
            ])),
            other => lower_comparison(left, other, right, qualifiers),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr,
        } => Ok(lower_condition(expr, qualifiers)?.negate()),
        Expr::IsNull(inner) => Ok(Condition::compare(
            column_name(inner, qualifiers)?,
            CompareOp::Eq,
            Value::Null,
        )),
        Expr::IsNotNull(inner) => Ok(Condition::compare(
            column_name(inner, qualifiers)?,
            CompareOp::Ne,
            Value::Null,
        )),
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let values = list.iter().map(literal).collect::<Result<Vec<_>>>()?;
            Ok(Condition::In {
                column: column_name(expr, qualifiers)?,
                values,
                negated: *negated,
            })
        }
        Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Condition::Between {
            column: column_name(expr, qualifiers)?,
            low: literal(low)?,
            high: literal(high)?,
            negated: *negated,
        }),
        Expr::Like {
            negated,
            expr,
            pattern,
            escape_char,
        } => {
            if escape_char.is_some() {
                return Err(unsupported("LIKE ... ESCAPE"));
            }
            let column = column_name(expr, qualifiers)?;
            let Value::String(pattern) = literal(pattern)? else {
                return Err(anyhow!("LIKE pattern must be a string literal"));
            };
            let condition = lower_like(column, &pattern)?;
            Ok(if *negated { condition.negate() } else { condition })
        }
        Expr::InSubquery { .. } | Expr::Exists { .. } | Expr::Subquery(_) => {
            Err(unsupported("subquery"))
        }
        other => Err(anyhow!("unsupported WHERE predicate: {other}")),
    }
}

fn lower_comparison(
    left: &Expr,
    op: &BinaryOperator,
    right: &Expr,
    qualifiers: &[String],
) -> Result<Condition> {
    let op = match op {
        BinaryOperator::Eq => CompareOp::Eq,
        BinaryOperator::NotEq => CompareOp::Ne,
        BinaryOperator::Lt => CompareOp::Lt,
        BinaryOperator::LtEq => CompareOp::Le,
        BinaryOperator::Gt => CompareOp::Gt,
        BinaryOperator::GtEq => CompareOp::Ge,
        other => return Err(anyhow!("unsupported WHERE operator `{other}`")),
    };
    // `1 < age` reads as `age > 1`.
    if let (Ok(value), Ok(column)) = (literal(left), column_name(right, qualifiers)) {
        return Ok(Condition::compare(column, flip(op), value));
    }
    Ok(Condition::compare(
        column_name(left, qualifiers)?,
        op,
        literal(right)?,
    ))
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Ge => CompareOp::Le,
        symmetric => symmetric,
    }
}

fn lower_like(column: String, pattern: &str) -> Result<Condition> {
    let leading = pattern.starts_with('%');
    let rest = pattern.strip_prefix('%').unwrap_or(pattern);
    let trailing = rest.ends_with('%');
    let core = rest.strip_suffix('%').unwrap_or(rest);
    if core.contains('%') || core.contains('_') {
        return Err(anyhow!(
            "LIKE pattern `{pattern}` has no Cypher equivalent (only leading/trailing `%`)"
        ));
    }
    Ok(match (leading, trailing) {
        (true, true) => Condition::text(column, TextOp::Contains, core),
        (false, true) => Condition::text(column, TextOp::StartsWith, core),
        (true, false) => Condition::text(column, TextOp::EndsWith, core),
        (false, false) => Condition::equals(column, core),
    })
}

// ============================================================================
// Terms
// ============================================================================

/// Column reference as the compiler expects it: bare names stay bare (and
/// get `n.`-qualified later), names qualified by a `FROM` table or its alias
/// are rewritten to `n.`.
fn column_name(expr: &Expr, qualifiers: &[String]) -> Result<String> {
    match expr {
        Expr::Identifier(id) => ident(id),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] if qualifiers.contains(&table.value) => {
                Ok(format!("{PRIMARY_IDENTIFIER}.{}", ident(column)?))
            }
            _ => Ok(parts
                .iter()
                .map(|p| p.value.as_str())
                .collect::<Vec<_>>()
                .join(".")),
        },
        Expr::Function(_) => Ok(expr.to_string()),
        Expr::Nested(inner) => column_name(inner, qualifiers),
        other => Err(anyhow!("expected a column reference, got `{other}`")),
    }
}

fn ident(id: &Ident) -> Result<String> {
    let name = id.value.trim();
    if name.is_empty() {
        return Err(anyhow!("empty identifier in SQL query"));
    }
    Ok(name.to_string())
}

fn literal(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Value(v) => match v {
            sqlparser::ast::Value::Number(s, _) => number(s),
            sqlparser::ast::Value::SingleQuotedString(s)
            | sqlparser::ast::Value::DoubleQuotedString(s) => Ok(Value::String(s.clone())),
            sqlparser::ast::Value::Boolean(b) => Ok(Value::Bool(*b)),
            sqlparser::ast::Value::Null => Ok(Value::Null),
            other => Err(anyhow!("unsupported literal: {other}")),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Number(n) => number(&format!("-{n}")),
            other => Err(anyhow!("cannot negate {other}")),
        },
        Expr::Nested(inner) => literal(inner),
        other => Err(anyhow!("expected a literal, got `{other}`")),
    }
}

fn number(s: &str) -> Result<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::from(i));
    }
    let f = s
        .parse::<f64>()
        .map_err(|e| anyhow!("invalid number `{s}`: {e}"))?;
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("number `{s}` is not finite"))
}

fn expr_as_u64(e: &Expr, clause: &str) -> Result<u64> {
    match e {
        Expr::Value(sqlparser::ast::Value::Number(s, _)) => s
            .parse::<u64>()
            .map_err(|e| anyhow!("invalid {clause} number `{s}`: {e}")),
        other => Err(anyhow!("unsupported {clause} expression: {other}")),
    }
}

fn unsupported(construct: &str) -> anyhow::Error {
    QueryError::Unsupported(construct.to_string()).into()
}
