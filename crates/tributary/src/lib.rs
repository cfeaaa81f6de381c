//! # Tributary
//!
//! Declarative, type-safe pipeline builder for dataflow engines.
//!
//! A [`Pipeline`] is described as a DAG of typed stages. Multi-input stages
//! (hash joins and co-groups) address their inputs through ordered [`Tag`]s,
//! and aggregation logic is packaged as immutable aggregate operations. The
//! compiled [`PipelineDag`] can be handed to a planner, or run in-process with
//! the [`LocalExecutor`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tributary::prelude::*;
//!
//! #[derive(Clone)]
//! struct Trade { class_id: u32, product_id: u32 }
//!
//! #[derive(Clone)]
//! struct Product { id: u32, name: String }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new();
//!     let trades = pipeline.draw_from(Source::from_vec("trades", load_trades()));
//!     let products = pipeline.draw_from(Source::from_vec("products", load_products()));
//!
//!     let mut join = trades.join_builder();
//!     let product_tag = join.add(
//!         &products,
//!         JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
//!     );
//!     let (sink, enriched) = Sink::collect("enriched");
//!     join.build()?.drain_to(sink);
//!
//!     LocalExecutor::default().run(&pipeline.compile()?)?;
//!     for (trade, bags) in enriched.take() {
//!         println!("{} -> {:?}", trade.product_id, bags.bag(product_tag)?.len());
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export the core crate
pub use tributary_core::*;

// Re-export aggregate building blocks
pub use tributary_core::aggregate::{ops, AggregateOperationBuilder, CombiningBuilder};

// Re-export pipeline configuration and payload types
pub use tributary_core::pipeline::{
    transforms, PipelineConfigBuilder, StageNode, Transform, TransformKind, UnaryTransform,
};

/// Commonly used types and traits.
///
/// ```rust,ignore
/// use tributary::prelude::*;
/// ```
pub mod prelude {
    // Graph
    pub use tributary_core::{
        CoGroupBuilder, JoinBuilder, JoinOn, NodeId, Pipeline, PipelineConfig, PipelineDag, Sink,
        SinkStage, Source, Stage,
    };

    // Tags and bags
    pub use tributary_core::{BagsByTag, Tag};

    // Aggregation
    pub use tributary_core::aggregate::ops;
    pub use tributary_core::{
        AccumulatorsByTag, Aggregate, AggregateOperation, AggregateOperation1,
        AggregateOperation2, AggregateOperation3,
    };

    // Execution
    pub use tributary_core::{ExecutionMetrics, ExecutorConfig, LocalExecutor};

    // Errors
    pub use tributary_core::{BagError, Error, ExecutionError, PipelineError};
}
