//! Compiled pipeline graph.
//!
//! [`PipelineDag`] is the immutable, thread-shareable form of a pipeline
//! handed to a planner or to the [`LocalExecutor`](crate::LocalExecutor).
//! It carries every node's upstream list and transform, the derived
//! downstream lists, and a deterministic topological execution order.

use std::collections::VecDeque;
use std::fmt;

use smallvec::SmallVec;

use super::error::PipelineError;
use super::graph::{NodeId, PipelineGraph, PipelineId, StageNode};
use super::transform::TransformKind;

/// Immutable snapshot of a compiled pipeline.
pub struct PipelineDag {
    pipeline: PipelineId,
    name: String,
    nodes: Vec<StageNode>,
    downstream: Vec<SmallVec<[NodeId; 4]>>,
    execution_order: Vec<NodeId>,
    sources: Vec<NodeId>,
    sinks: Vec<NodeId>,
}

impl PipelineDag {
    /// Snapshots `graph` after validating it.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::EmptyPipeline`] if the graph has no nodes
    /// - [`PipelineError::FanOutLimitExceeded`] if a node has more downstream
    ///   nodes than the configured maximum
    /// - [`PipelineError::CycleDetected`] if a topological order does not exist
    /// - [`PipelineError::DanglingStage`] if a non-sink node has no downstream
    ///   and the configuration requires every stage to be drained
    pub(crate) fn compile(graph: &PipelineGraph) -> Result<Self, PipelineError> {
        let nodes = graph.nodes();
        if nodes.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }

        let config = graph.config();
        let downstream = graph.downstream();
        check_fan_out(nodes, &downstream, config.effective_max_fan_out())?;
        let execution_order = kahn_topo_sort(nodes, &downstream)?;

        let dangling: Vec<&StageNode> = nodes
            .iter()
            .filter(|n| n.transform().kind() != TransformKind::Sink)
            .filter(|n| downstream[n.id().index()].is_empty())
            .collect();
        if let Some(first) = dangling.first() {
            if config.require_drained {
                return Err(PipelineError::DanglingStage(first.name().to_string()));
            }
            for node in &dangling {
                tracing::warn!(
                    pipeline = %config.name,
                    node = %node.id(),
                    name = node.name(),
                    "stage is never drained"
                );
            }
        }

        let of_kind = |kind: TransformKind| -> Vec<NodeId> {
            nodes
                .iter()
                .filter(|n| n.transform().kind() == kind)
                .map(StageNode::id)
                .collect()
        };
        let dag = Self {
            pipeline: graph.id(),
            name: config.name.clone(),
            sources: of_kind(TransformKind::Source),
            sinks: of_kind(TransformKind::Sink),
            nodes: nodes.to_vec(),
            downstream,
            execution_order,
        };
        tracing::info!(
            pipeline = %dag.name,
            nodes = dag.node_count(),
            edges = dag.edge_count(),
            sources = dag.sources.len(),
            sinks = dag.sinks.len(),
            "pipeline compiled"
        );
        Ok(dag)
    }

    // ---- Accessors ----

    /// Identity of the pipeline this was compiled from.
    #[must_use]
    pub fn pipeline_id(&self) -> PipelineId {
        self.pipeline
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.upstream().len()).sum()
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&StageNode> {
        self.nodes.get(id.index())
    }

    /// Returns all nodes, in creation order.
    #[must_use]
    pub fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    /// Downstream nodes of `id`, in creation order.
    #[must_use]
    pub fn downstream(&self, id: NodeId) -> &[NodeId] {
        self.downstream
            .get(id.index())
            .map(SmallVec::as_slice)
            .unwrap_or(&[])
    }

    /// All edges as `(upstream, downstream)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| n.upstream().iter().map(move |&up| (up, n.id())))
    }

    /// Returns nodes in topological execution order (dependencies first).
    #[must_use]
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    /// Returns all source nodes.
    #[must_use]
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    /// Returns all sink nodes.
    #[must_use]
    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }
}

impl fmt::Debug for PipelineDag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineDag")
            .field("name", &self.name)
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.edge_count())
            .field("sources", &self.sources)
            .field("sinks", &self.sinks)
            .field("execution_order", &self.execution_order)
            .finish_non_exhaustive()
    }
}

fn check_fan_out(
    nodes: &[StageNode],
    downstream: &[SmallVec<[NodeId; 4]>],
    max: usize,
) -> Result<(), PipelineError> {
    for node in nodes {
        let count = downstream[node.id().index()].len();
        if count > max {
            return Err(PipelineError::FanOutLimitExceeded {
                node: node.name().to_string(),
                count,
                max,
            });
        }
    }
    Ok(())
}

/// Kahn's algorithm; ties are broken by ascending `NodeId`.
fn kahn_topo_sort(
    nodes: &[StageNode],
    downstream: &[SmallVec<[NodeId; 4]>],
) -> Result<Vec<NodeId>, PipelineError> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.upstream().len()).collect();
    let mut queue: VecDeque<NodeId> = nodes
        .iter()
        .filter(|n| n.upstream().is_empty())
        .map(StageNode::id)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);

        let mut ready: Vec<NodeId> = Vec::new();
        for &target in &downstream[id.index()] {
            let deg = &mut in_degree[target.index()];
            *deg = deg.saturating_sub(1);
            if *deg == 0 {
                ready.push(target);
            }
        }
        ready.sort_unstable();
        queue.extend(ready);
    }

    if order.len() < nodes.len() {
        let stuck = nodes
            .iter()
            .find(|n| in_degree[n.id().index()] > 0)
            .map_or_else(|| "unknown".to_string(), |n| n.name().to_string());
        return Err(PipelineError::CycleDetected(stuck));
    }
    Ok(order)
}
