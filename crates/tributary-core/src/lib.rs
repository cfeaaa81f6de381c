//! # Tributary Core
//!
//! Declarative pipeline builder for dataflow jobs.
//!
//! This crate provides:
//! - **Tags**: typed, ordered identity tokens addressing the inputs of a
//!   multi-input construct
//! - **Aggregate operations**: accumulator bundles of arity 1, 2, 3 and a
//!   tag-generic N-ary form, built immutably
//! - **Tagged bags**: the default payload of joins and co-groups
//! - **Pipeline graph**: an append-only DAG of typed stages with join and
//!   co-group builders, compiled into an immutable [`PipelineDag`]
//! - **Local executor**: an in-process reference runner for compiled pipelines
//!
//! ## Design Principles
//!
//! 1. **Append-only graph** - a node's upstream list is fixed when it is created
//! 2. **Immutable operations** - every `with_*` returns a new value
//! 3. **Checked tag sets** - operations and builders agree on tags before any node exists
//! 4. **Deterministic order** - everything tag-keyed iterates by tag index
//!
//! ## Example
//!
//! ```rust,ignore
//! use tributary_core::{JoinOn, LocalExecutor, Pipeline, Sink, Source};
//!
//! let pipeline = Pipeline::new();
//! let trades = pipeline.draw_from(Source::from_vec("trades", trades));
//! let products = pipeline.draw_from(Source::from_vec("products", products));
//!
//! let on = JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id);
//! let joined = trades.join(&products, on)?;
//! let (sink, enriched) = Sink::collect("enriched");
//! joined.drain_to(sink);
//!
//! let dag = pipeline.compile()?;
//! LocalExecutor::default().run(&dag)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod bag;
pub mod execution;
pub mod pipeline;
pub mod tag;

// Re-export key types
pub use aggregate::{
    Aggregate, AggregateOperation, AggregateOperation1, AggregateOperation2, AggregateOperation3,
    AccumulatorsByTag,
};
pub use bag::{BagError, BagsByTag};
pub use execution::{ExecutionError, ExecutionMetrics, ExecutorConfig, LocalExecutor};
pub use pipeline::{
    CoGroupBuilder, CollectedItems, JoinBuilder, JoinOn, NodeId, Pipeline, PipelineConfig,
    PipelineDag, PipelineError, PipelineId, Sink, SinkStage, Source, Stage,
};
pub use tag::{Tag, TagKey, TagOwner};

/// Bound shared by every element type that flows between stages.
pub trait Element: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Element for T {}

/// Result type for tributary-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tributary-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pipeline construction or compilation errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    /// Tagged bag access errors
    #[error("Bag error: {0}")]
    Bag(#[from] bag::BagError),

    /// Local execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] execution::ExecutionError),
}
