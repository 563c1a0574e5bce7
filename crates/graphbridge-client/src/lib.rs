//! Execution seam and result normalization for compiled Cypher.
//!
//! [`GraphClient`] compiles query descriptions with `graphbridge-cypher`, hands
//! the text to a [`CypherExecutor`], rejects non-2xx answers with
//! [`ClientError::ExecutionFailed`] and flattens the decoded rows into
//! property maps.

pub mod client;
pub mod error;
pub mod executor;
pub mod graph;
pub mod normalize;

pub use client::GraphClient;
pub use error::{ClientError, TransportError};
pub use executor::CypherExecutor;
pub use graph::{GraphValue, Node, PropertyMap, RawExecutionResult, Relationship, ResultSet};
pub use normalize::{check_status, normalize, normalize_rows, normalize_with, Extraction};
