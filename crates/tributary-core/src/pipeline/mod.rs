//! # Pipeline Graph
//!
//! Declarative description of a dataflow computation as a DAG of typed
//! stages.
//!
//! ## Overview
//!
//! - **`Pipeline`**: the append-only arena every stage belongs to
//! - **`Stage`** / **`SinkStage`**: typed node handles with the fluent
//!   algebra (`map`, `filter`, `flat_map`, `group_by`, `join`, `co_group`,
//!   `drain_to`)
//! - **`JoinBuilder`** / **`CoGroupBuilder`**: tag-minting collectors for
//!   multi-input nodes
//! - **`PipelineDag`**: the immutable compiled form
//!
//! ## Key Design Principles
//!
//! 1. **Edges are fixed at node creation** - a node only ever points at
//!    nodes created before it, so no cycle can be built
//! 2. **One graph per construct** - every clause of a join or co-group must
//!    come from the primary stage's pipeline
//! 3. **Tag order is input order** - a multi-input node's upstream list
//!    follows its clause tags
//!
//! ## Example
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new();
//! let trades = pipeline.draw_from(Source::from_vec("trades", trades));
//! let a = pipeline.draw_from(Source::from_vec("a", a));
//! let b = pipeline.draw_from(Source::from_vec("b", b));
//!
//! let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
//! let a_tag = builder.add(&a, |x: &A| x.class_id);
//! let b_tag = builder.add(&b, |x: &B| x.class_id);
//! let (sink, grouped) = Sink::collect("grouped");
//! builder.build_to_bags()?.drain_to(sink);
//!
//! let dag = pipeline.compile()?;
//! assert_eq!(dag.node_count(), 5);
//! ```

pub mod config;
pub mod connector;
pub mod dag;
pub mod error;
pub mod graph;
pub mod transform;
pub mod transforms;

mod cogroup;
mod join;
mod stage;

#[cfg(test)]
mod tests;

// Re-export key types
pub use cogroup::CoGroupBuilder;
pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_MAX_FAN_OUT, MAX_FAN_OUT_LIMIT};
pub use connector::{CollectedItems, Sink, Source};
pub use dag::PipelineDag;
pub use error::PipelineError;
pub use graph::{NodeId, Pipeline, PipelineId, StageNode};
pub use join::{JoinBuilder, JoinOn};
pub use stage::{SinkStage, Stage};
pub use transform::{Transform, TransformKind, UnaryTransform};
