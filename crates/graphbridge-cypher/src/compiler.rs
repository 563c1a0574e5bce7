//! Top-level query assembly.

use crate::binder::{postpare, ParamBinder};
use crate::clause::{
    build_delete, build_directed_relations, build_from, build_join, build_limit, build_match,
    build_order_by, build_return, build_where, checked_assignment_key, PRIMARY_IDENTIFIER,
};
use crate::config::CompilerConfig;
use crate::error::QueryError;
use crate::query::{Condition, JoinSpec, QueryDescription};
use crate::value::Params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Cypher text plus the parameters it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub cypher: String,
    pub params: Params,
}

/// Compiles query descriptions into Cypher.
///
/// Stateless between calls: every call threads its own parameter binder
/// through the clause builders, so one compiler can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct CypherCompiler {
    config: CompilerConfig,
}

impl CypherCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a read query. `params` are caller-supplied bindings and win
    /// over the description's own parameters on name collision.
    pub fn build(
        &self,
        query: &QueryDescription,
        params: &Params,
    ) -> Result<CompiledQuery, QueryError> {
        let mut binder = ParamBinder::with_caller(&query.params, params);
        let text = self.build_query_text(query, &mut binder)?;
        Ok(self.finish(text, binder))
    }

    /// `DELETE n,r,rn`: removes each matched node, its outgoing relationships
    /// and the node at the far end of each of them. The optional match is a
    /// single hop, so nothing beyond the far node is ever deleted.
    pub fn delete<L: AsRef<str>>(
        &self,
        labels: &[L],
        condition: Option<&Condition>,
        params: &Params,
    ) -> Result<CompiledQuery, QueryError> {
        let mut binder = ParamBinder::with_caller(&Params::new(), params);
        let condition = condition.cloned().and_then(Condition::resolve);

        let (optional_match, far) = build_directed_relations();
        let clauses = vec![
            format!("{} ({})", build_match(None), build_from(labels)),
            build_where(condition.as_ref(), &mut binder, &self.config)?,
            optional_match,
            build_delete(&far),
        ];
        Ok(self.finish(self.join_clauses(clauses), binder))
    }

    /// `CREATE` one node with the given labels and properties.
    pub fn insert<L: AsRef<str>>(
        &self,
        labels: &[L],
        properties: &[(String, Value)],
        params: &Params,
    ) -> Result<CompiledQuery, QueryError> {
        let mut binder = ParamBinder::with_caller(&Params::new(), params);

        let mut entries = Vec::with_capacity(properties.len());
        for (key, value) in properties {
            let key = checked_assignment_key(key)?;
            let placeholder = binder.bind(value.clone());
            entries.push(format!("{key}: {placeholder}"));
        }
        let map = if entries.is_empty() {
            String::new()
        } else {
            format!(" {{{}}}", entries.join(", "))
        };

        let clauses = vec![
            format!("CREATE ({}{map})", build_from(labels)),
            format!("RETURN {PRIMARY_IDENTIFIER}"),
        ];
        Ok(self.finish(self.join_clauses(clauses), binder))
    }

    /// `SET` properties on every matched node.
    pub fn update<L: AsRef<str>>(
        &self,
        labels: &[L],
        assignments: &[(String, Value)],
        condition: Option<&Condition>,
        params: &Params,
    ) -> Result<CompiledQuery, QueryError> {
        if assignments.is_empty() {
            return Err(QueryError::EmptyAssignment);
        }
        let mut binder = ParamBinder::with_caller(&Params::new(), params);
        let condition = condition.cloned().and_then(Condition::resolve);

        let head = format!("{} ({})", build_match(None), build_from(labels));
        let where_clause = build_where(condition.as_ref(), &mut binder, &self.config)?;

        let mut sets = Vec::with_capacity(assignments.len());
        for (key, value) in assignments {
            let key = checked_assignment_key(key)?;
            let placeholder = binder.bind(value.clone());
            sets.push(format!("{PRIMARY_IDENTIFIER}.{key}={placeholder}"));
        }

        let clauses = vec![
            head,
            where_clause,
            format!("SET {}", sets.join(", ")),
            format!("RETURN {PRIMARY_IDENTIFIER}"),
        ];
        Ok(self.finish(self.join_clauses(clauses), binder))
    }

    fn build_query_text(
        &self,
        query: &QueryDescription,
        binder: &mut ParamBinder,
    ) -> Result<String, QueryError> {
        let body = self.build_single(query, binder)?;
        if query.unions.is_empty() {
            return Ok(body);
        }

        let separator = &self.config.separator;
        let mut parts = vec![format!("({body})")];
        for part in &query.unions {
            binder.merge_missing(&part.query.params);
            let text = self.build_query_text(&part.query, binder)?;
            parts.push(if part.all { "UNION ALL" } else { "UNION" }.to_string());
            parts.push(format!("({text})"));
        }
        Ok(parts.join(separator))
    }

    fn build_single(
        &self,
        query: &QueryDescription,
        binder: &mut ParamBinder,
    ) -> Result<String, QueryError> {
        if query.having.is_some() {
            return Err(QueryError::Unsupported("HAVING".to_string()));
        }

        let condition = query.condition.clone().and_then(Condition::resolve);
        let columns = if query.group_by.is_empty() {
            &query.select
        } else {
            &query.group_by
        };

        let clauses = vec![
            format!(
                "{} {}",
                build_match(query.match_modifier.as_deref()),
                self.build_pattern(&query.labels, &query.joins)?
            ),
            build_where(condition.as_ref(), binder, &self.config)?,
            build_return(columns, query.distinct, binder, &self.config)?,
            build_order_by(&query.order_by, binder, &self.config)?,
            build_limit(query.limit, query.offset, &self.config.separator),
        ];
        Ok(self.join_clauses(clauses))
    }

    fn build_pattern(&self, labels: &[String], joins: &[JoinSpec]) -> Result<String, QueryError> {
        let mut pattern = format!("({})", build_from(labels));
        if !joins.is_empty() {
            pattern.push_str(&build_join(joins, &self.config.separator)?);
        }
        Ok(pattern)
    }

    fn join_clauses(&self, clauses: Vec<String>) -> String {
        clauses
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(&self.config.separator)
    }

    fn finish(&self, text: String, binder: ParamBinder) -> CompiledQuery {
        let (cypher, params) = postpare(&text, binder.into_params());
        debug!(params = params.len(), cypher = %cypher, "compiled cypher");
        CompiledQuery { cypher, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, OrderDirection};
    use crate::value::{Expression, QueryValue};
    use serde_json::json;

    #[test]
    fn compiles_full_read_query() -> Result<(), QueryError> {
        let q = QueryDescription::new()
            .label("Post")
            .join("User", "HAS_AUTHOR", Direction::Out)
            .filter(Condition::hash([("status", QueryValue::from(1))]))
            .order_by("created_at", OrderDirection::Desc)
            .limit(10)
            .offset(20);
        let compiled = CypherCompiler::default().build(&q, &Params::new())?;
        assert_eq!(
            compiled.cypher,
            "MATCH (n:Post)<-[hasAuthor:HAS_AUTHOR]-(user:User)\n\
             WHERE n.status={p0}\n\
             RETURN n\n\
             ORDER BY n.created_at DESC\n\
             SKIP 20\n\
             LIMIT 10"
        );
        assert_eq!(compiled.params, Params::from([("p0".to_string(), json!(1))]));
        Ok(())
    }

    #[test]
    fn group_by_wins_over_select() -> Result<(), QueryError> {
        let q = QueryDescription::new()
            .label("Person")
            .select(["name"])
            .group_by(["city"]);
        let compiled = CypherCompiler::new(CompilerConfig::single_line()).build(&q, &Params::new())?;
        assert_eq!(compiled.cypher, "MATCH (n:Person) RETURN n.city, n");
        Ok(())
    }

    #[test]
    fn having_is_rejected() {
        let q = QueryDescription::new()
            .label("Person")
            .having(Condition::equals("total", 1));
        let err = CypherCompiler::default()
            .build(&q, &Params::new())
            .unwrap_err();
        assert_eq!(err, QueryError::Unsupported("HAVING".to_string()));
    }

    #[test]
    fn caller_params_override_description_params() -> Result<(), QueryError> {
        let q = QueryDescription::new()
            .label("Person")
            .filter(Condition::raw(Expression::new("n.age > @min")))
            .param("@min", 18);
        let caller = Params::from([("@min".to_string(), json!(21))]);
        let compiled = CypherCompiler::default().build(&q, &caller)?;
        assert!(compiled.cypher.contains("WHERE n.age > {min}"));
        assert_eq!(compiled.params.get("min"), Some(&json!(21)));
        Ok(())
    }

    #[test]
    fn caller_params_override_expression_bindings() -> Result<(), QueryError> {
        let q = QueryDescription::new()
            .label("Person")
            .filter(Condition::raw(Expression::new("n.age > @min").bind("@min", 18)));
        let caller = Params::from([("@min".to_string(), json!(21))]);
        let compiled = CypherCompiler::default().build(&q, &caller)?;
        assert!(compiled.cypher.contains("WHERE n.age > {min}"));
        assert_eq!(compiled.params.get("min"), Some(&json!(21)));
        Ok(())
    }

    #[test]
    fn expression_binding_cannot_replace_an_allocated_placeholder() -> Result<(), QueryError> {
        let q = QueryDescription::new().label("Person").filter(Condition::And(vec![
            Condition::equals("status", 1),
            Condition::raw(Expression::new("n.age > @p0").bind("@p0", 30)),
        ]));
        let compiled = CypherCompiler::new(CompilerConfig::single_line()).build(&q, &Params::new())?;
        assert_eq!(
            compiled.cypher,
            "MATCH (n:Person) WHERE (n.status = {p0}) AND (n.age > {p1}) RETURN n"
        );
        assert_eq!(compiled.params.get("p0"), Some(&json!(1)));
        assert_eq!(compiled.params.get("p1"), Some(&json!(30)));
        Ok(())
    }

    #[test]
    fn union_parts_share_one_placeholder_pass() -> Result<(), QueryError> {
        let admins = QueryDescription::new()
            .label("Admin")
            .filter(Condition::equals("active", true));
        let q = QueryDescription::new()
            .label("User")
            .filter(Condition::equals("active", true))
            .union_all(admins);
        let compiled = CypherCompiler::new(CompilerConfig::single_line()).build(&q, &Params::new())?;
        assert_eq!(
            compiled.cypher,
            "(MATCH (n:User) WHERE n.active = {p0} RETURN n) UNION ALL \
             (MATCH (n:Admin) WHERE n.active = {p1} RETURN n)"
        );
        assert_eq!(compiled.params.len(), 2);
        Ok(())
    }

    #[test]
    fn insert_binds_each_property() -> Result<(), QueryError> {
        let compiled = CypherCompiler::default().insert(
            &["Person"],
            &[
                ("name".to_string(), json!("Sam")),
                ("age".to_string(), json!(41)),
            ],
            &Params::new(),
        )?;
        assert_eq!(
            compiled.cypher,
            "CREATE (n:Person {name: {p0}, age: {p1}})\nRETURN n"
        );
        assert_eq!(compiled.params.get("p1"), Some(&json!(41)));
        Ok(())
    }

    #[test]
    fn update_binds_where_before_set() -> Result<(), QueryError> {
        let cond = Condition::hash([("id", QueryValue::from(7))]);
        let compiled = CypherCompiler::default().update(
            &["Person"],
            &[("name".to_string(), json!("Jane"))],
            Some(&cond),
            &Params::new(),
        )?;
        assert_eq!(
            compiled.cypher,
            "MATCH (n:Person)\nWHERE n.id={p0}\nSET n.name={p1}\nRETURN n"
        );
        Ok(())
    }

    #[test]
    fn update_without_assignments_fails() {
        let none: [&str; 0] = [];
        let err = CypherCompiler::default()
            .update(&none, &[], None, &Params::new())
            .unwrap_err();
        assert_eq!(err, QueryError::EmptyAssignment);
    }
}
