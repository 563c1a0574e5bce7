//! SQL-shaped query descriptions compiled into Cypher.
//!
//! ```text
//! QueryDescription ──► clause builders ──► assembly ──► postpare ──► CompiledQuery
//!   labels/joins        MATCH (n:L)<-[..]-(..)           @p0 → {p0}     { cypher, params }
//!   condition           WHERE ...
//!   select/group        RETURN ..., n
//!   order/limit         ORDER BY / SKIP / LIMIT
//! ```
//!
//! The primary node is always bound to `n`. Values are bound through `@p<N>`
//! placeholders allocated in text order, then rewritten to the `{p<N>}` form
//! the graph database expects.
//!
//! ```
//! use graphbridge_cypher::{Condition, CypherCompiler, Params, QueryDescription, QueryValue};
//!
//! let query = QueryDescription::new()
//!     .label("Person")
//!     .filter(Condition::hash([("status", QueryValue::from(1))]))
//!     .limit(10);
//! let compiled = CypherCompiler::default().build(&query, &Params::new()).unwrap();
//! assert_eq!(compiled.cypher, "MATCH (n:Person)\nWHERE n.status={p0}\nRETURN n\nLIMIT 10");
//! ```

pub mod binder;
pub mod clause;
pub mod compiler;
pub mod config;
pub mod error;
pub mod query;
pub mod value;

pub use binder::{postpare, ParamBinder};
pub use clause::{PRIMARY_IDENTIFIER, RELATION_IDENTIFIER};
pub use compiler::{CompiledQuery, CypherCompiler};
pub use config::CompilerConfig;
pub use error::QueryError;
pub use query::{
    Column, CompareOp, Condition, Direction, JoinSpec, OrderDirection, QueryDescription, TextOp,
    UnionPart,
};
pub use value::{Expression, Params, QueryValue};
