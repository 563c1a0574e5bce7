/// Errors raised while compiling a query description.
///
/// Compilation either yields the full Cypher text and parameter table or
/// fails here; there is no partial output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A relational construct with no Cypher equivalent (e.g. `HAVING`).
    #[error("{0} is not supported by Cypher")]
    Unsupported(String),
    #[error("identifier `{0}` is bound more than once in the match pattern")]
    DuplicateIdentifier(String),
    #[error("invalid join: {0}")]
    InvalidJoin(String),
    #[error("column name must not be empty")]
    EmptyColumn,
    #[error("update requires at least one property to set")]
    EmptyAssignment,
}
