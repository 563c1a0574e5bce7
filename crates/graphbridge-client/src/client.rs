//! Query-builder-facing facade: compile, execute, normalize.

use graphbridge_cypher::{
    CompiledQuery, CompilerConfig, Condition, CypherCompiler, Expression, Params,
    QueryDescription, PRIMARY_IDENTIFIER, RELATION_IDENTIFIER,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ClientError;
use crate::executor::CypherExecutor;
use crate::graph::{GraphValue, Node, PropertyMap, Relationship, ResultSet};
use crate::normalize::{check_status, first_scalar, normalize_rows, Extraction};

pub struct GraphClient<E: CypherExecutor> {
    executor: E,
    compiler: CypherCompiler,
}

impl<E: CypherExecutor> GraphClient<E> {
    pub fn new(executor: E) -> Self {
        Self::with_config(executor, CompilerConfig::default())
    }

    pub fn with_config(executor: E, config: CompilerConfig) -> Self {
        Self {
            executor,
            compiler: CypherCompiler::new(config),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn compile(
        &self,
        query: &QueryDescription,
        params: &Params,
    ) -> Result<CompiledQuery, ClientError> {
        Ok(self.compiler.build(query, params)?)
    }

    /// Every matched graph element as a flat property record.
    pub async fn query_all(
        &self,
        query: &QueryDescription,
        params: &Params,
    ) -> Result<Vec<PropertyMap>, ClientError> {
        let compiled = self.compile(query, params)?;
        let set = self.run(&compiled).await?;
        Ok(normalize_rows(&set, Extraction::Properties))
    }

    /// First record, with the query limited to one row.
    pub async fn query_one(
        &self,
        query: &QueryDescription,
        params: &Params,
    ) -> Result<Option<PropertyMap>, ClientError> {
        let limited = query.clone().limit(1);
        Ok(self.query_all(&limited, params).await?.into_iter().next())
    }

    /// First column of the first row, e.g. for `count(n)` selections.
    pub async fn query_scalar(
        &self,
        query: &QueryDescription,
        params: &Params,
    ) -> Result<Option<Value>, ClientError> {
        let compiled = self.compile(query, params)?;
        let set = self.run(&compiled).await?;
        Ok(first_scalar(&set))
    }

    /// Run already-compiled Cypher; returns the number of records produced.
    pub async fn execute(&self, compiled: &CompiledQuery) -> Result<usize, ClientError> {
        let set = self.run(compiled).await?;
        Ok(normalize_rows(&set, Extraction::Properties).len())
    }

    pub async fn delete(
        &self,
        labels: &[&str],
        condition: Option<&Condition>,
    ) -> Result<usize, ClientError> {
        let compiled = self.compiler.delete(labels, condition, &Params::new())?;
        self.execute(&compiled).await
    }

    pub async fn node(&self, id: i64) -> Result<Option<Node>, ClientError> {
        let query = QueryDescription::new().filter(Condition::raw(
            Expression::new(format!("id({PRIMARY_IDENTIFIER})=@id")).bind("@id", id),
        ));
        let compiled = self.compile(&query, &Params::new())?;
        let set = self.run(&compiled).await?;
        Ok(first_node(set))
    }

    pub async fn relationship(&self, id: i64) -> Result<Option<Relationship>, ClientError> {
        let sep = &self.compiler.config().separator;
        let r = RELATION_IDENTIFIER;
        let compiled = CompiledQuery {
            cypher: format!("MATCH ()-[{r}]->(){sep}WHERE id({r})={{id}}{sep}RETURN {r}"),
            params: Params::from([("id".to_string(), json!(id))]),
        };
        let set = self.run(&compiled).await?;
        Ok(set.rows.into_iter().flatten().find_map(|slot| match slot {
            GraphValue::Relationship(rel) => Some(rel),
            _ => None,
        }))
    }

    /// Add labels to an existing node; returns the updated node.
    pub async fn add_labels(
        &self,
        node_id: i64,
        labels: &[&str],
    ) -> Result<Option<Node>, ClientError> {
        if labels.is_empty() {
            return self.node(node_id).await;
        }
        let sep = &self.compiler.config().separator;
        let n = PRIMARY_IDENTIFIER;
        let set_labels: String = labels
            .iter()
            .map(|label| format!(":`{}`", label.replace('`', "``")))
            .collect();
        let compiled = CompiledQuery {
            cypher: format!(
                "MATCH ({n}){sep}WHERE id({n})={{id}}{sep}SET {n}{set_labels}{sep}RETURN {n}"
            ),
            params: Params::from([("id".to_string(), json!(node_id))]),
        };
        let set = self.run(&compiled).await?;
        Ok(first_node(set))
    }

    async fn run(&self, compiled: &CompiledQuery) -> Result<ResultSet, ClientError> {
        let endpoint = self
            .executor
            .supports_cypher()
            .ok_or(ClientError::CypherUnsupported)?;
        debug!(
            endpoint = %endpoint,
            params = compiled.params.len(),
            cypher = %compiled.cypher,
            "executing cypher"
        );
        let raw = self
            .executor
            .execute_cypher(&compiled.cypher, &compiled.params)
            .await?;
        check_status(&raw)?;
        ResultSet::from_rest_json(&raw.payload)
    }
}

fn first_node(set: ResultSet) -> Option<Node> {
    set.rows.into_iter().flatten().find_map(|slot| match slot {
        GraphValue::Node(node) => Some(node),
        _ => None,
    })
}
