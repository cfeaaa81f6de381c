//! Local batch executor for compiled pipelines.
//!
//! [`LocalExecutor`] runs a [`PipelineDag`] once, in-process, visiting nodes
//! in topological order. Every node's output is materialized as a single
//! partition and kept until all of its downstream nodes have run.
//!
//! ```rust,ignore
//! let (sink, out) = Sink::collect("out");
//! pipeline.draw_from(Source::from_vec("numbers", vec![1, 2, 3]))
//!     .map(|x: &i32| x * 10)
//!     .drain_to(sink);
//!
//! let metrics = LocalExecutor::default().run(&pipeline.compile()?)?;
//! assert_eq!(metrics.items_written, 3);
//! assert_eq!(out.take(), vec![10, 20, 30]);
//! ```

use crate::bag::BagError;
use crate::pipeline::transform::{Body, Partition};
use crate::pipeline::{NodeId, PipelineDag, PipelineError};

/// Errors raised while executing a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A node received a partition of an unexpected element type.
    #[error("node '{node}' expected elements of type {expected}")]
    PartitionTypeMismatch {
        /// Node name.
        node: String,
        /// Expected element type.
        expected: &'static str,
    },

    /// An accumulate function rejected an element of one of its inputs.
    #[error("node '{node}' input {input}: element is not of type {expected}")]
    ElementTypeMismatch {
        /// Node name.
        node: String,
        /// Input index.
        input: usize,
        /// Expected element type.
        expected: &'static str,
    },

    /// A node ran without one of its inputs.
    #[error("node '{node}' is missing input {input}")]
    MissingInput {
        /// Node name.
        node: String,
        /// Input index.
        input: usize,
    },

    /// An upstream node produced no partition before its consumer ran.
    #[error("upstream {upstream} of node '{node}' has not produced output")]
    UpstreamNotReady {
        /// Node name.
        node: String,
        /// Upstream node.
        upstream: NodeId,
    },

    /// Graph error.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Bag access error.
    #[error("bag error: {0}")]
    Bag(#[from] BagError),
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Collect per-run item counters.
    pub collect_metrics: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            collect_metrics: true,
        }
    }
}

/// Counters for one executor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionMetrics {
    /// Nodes executed.
    pub nodes_executed: u64,
    /// Items read from sources.
    pub items_read: u64,
    /// Items produced by transform nodes.
    pub items_produced: u64,
    /// Items written to sinks.
    pub items_written: u64,
}

/// Single-threaded, single-pass executor.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    config: ExecutorConfig,
}

impl LocalExecutor {
    /// Creates an executor with the given configuration.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs every node of `dag` once, in topological order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] if a node receives input it cannot
    /// process. Sinks that already ran keep what they received.
    pub fn run(&self, dag: &PipelineDag) -> Result<ExecutionMetrics, ExecutionError> {
        let mut metrics = ExecutionMetrics::default();
        let mut outputs: Vec<Option<Partition>> = vec![None; dag.node_count()];
        let mut pending: Vec<usize> = dag
            .nodes()
            .iter()
            .map(|n| dag.downstream(n.id()).len())
            .collect();

        for &id in dag.execution_order() {
            let node = dag.node(id).ok_or(PipelineError::StageNotFound(id))?;
            let name = node.name();

            let mut inputs: Vec<Partition> = Vec::with_capacity(node.upstream().len());
            for &up in node.upstream() {
                let partition = outputs[up.index()].clone().ok_or_else(|| {
                    ExecutionError::UpstreamNotReady {
                        node: name.to_string(),
                        upstream: up,
                    }
                })?;
                inputs.push(partition);
            }

            let (produced, count) = match node.transform().body() {
                Body::Source(reader) => {
                    let batch = reader.read();
                    self.count(&mut metrics.items_read, batch.len);
                    (Some(batch.data), batch.len)
                }
                Body::Kernel(kernel) => {
                    let refs: Vec<&Partition> = inputs.iter().collect();
                    let batch = kernel.run(name, &refs)?;
                    self.count(&mut metrics.items_produced, batch.len);
                    (Some(batch.data), batch.len)
                }
                Body::Sink(writer) => {
                    let input = inputs.first().ok_or_else(|| ExecutionError::MissingInput {
                        node: name.to_string(),
                        input: 0,
                    })?;
                    let written = writer.write(name, input)?;
                    self.count(&mut metrics.items_written, written);
                    (None, written)
                }
            };
            tracing::debug!(
                pipeline = dag.name(),
                node = %id,
                kind = %node.transform().kind(),
                stage = name,
                items = count,
                "node executed"
            );
            metrics.nodes_executed += 1;

            for &up in node.upstream() {
                let left = &mut pending[up.index()];
                *left = left.saturating_sub(1);
                if *left == 0 {
                    outputs[up.index()] = None;
                }
            }
            if pending[id.index()] > 0 {
                outputs[id.index()] = produced;
            }
        }

        tracing::info!(
            pipeline = dag.name(),
            nodes = metrics.nodes_executed,
            read = metrics.items_read,
            written = metrics.items_written,
            "pipeline executed"
        );
        Ok(metrics)
    }

    fn count(&self, counter: &mut u64, items: usize) {
        if self.config.collect_metrics {
            *counter += items as u64;
        }
    }
}
