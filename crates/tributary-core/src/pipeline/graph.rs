//! Append-only pipeline graph.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Each node stores only its
//! upstream list, fixed when the node is created; downstream lists are
//! derived from the arena on demand. Since a new node can only point at
//! nodes that already exist, the graph is acyclic by construction.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::Element;

use super::config::PipelineConfig;
use super::connector::Source;
use super::dag::PipelineDag;
use super::error::PipelineError;
use super::stage::Stage;
use super::transform::Transform;

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u64);

impl PipelineId {
    fn next() -> Self {
        Self(NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipelineId({})", self.0)
    }
}

/// Index of a node in its pipeline's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A node of the pipeline graph.
///
/// The upstream list is ordered: for a multi-input node it lines up with the
/// transform's clause tags.
#[derive(Debug, Clone)]
pub struct StageNode {
    id: NodeId,
    upstream: SmallVec<[NodeId; 4]>,
    transform: Transform,
}

impl StageNode {
    /// Node identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Upstream nodes, in input order.
    #[must_use]
    pub fn upstream(&self) -> &[NodeId] {
        &self.upstream
    }

    /// How the node derives from its upstream.
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Node name, taken from its transform.
    #[must_use]
    pub fn name(&self) -> &str {
        self.transform.name()
    }
}

#[derive(Debug)]
pub(crate) struct PipelineGraph {
    id: PipelineId,
    config: PipelineConfig,
    nodes: Vec<StageNode>,
}

impl PipelineGraph {
    fn new(config: PipelineConfig) -> Self {
        Self {
            id: PipelineId::next(),
            config,
            nodes: Vec::new(),
        }
    }

    fn add_node(&mut self, upstream: &[NodeId], transform: Transform) -> NodeId {
        // Node count is bounded far below u32::MAX by available memory.
        #[allow(clippy::cast_possible_truncation)]
        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!(
            pipeline = %self.config.name,
            node = %id,
            kind = %transform.kind(),
            name = transform.name(),
            upstream = upstream.len(),
            "stage added"
        );
        self.nodes.push(StageNode {
            id,
            upstream: upstream.iter().copied().collect(),
            transform,
        });
        id
    }

    pub(crate) fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn id(&self) -> PipelineId {
        self.id
    }

    /// Derives downstream lists, indexed by `NodeId`, in creation order.
    pub(crate) fn downstream(&self) -> Vec<SmallVec<[NodeId; 4]>> {
        let mut downstream = vec![SmallVec::new(); self.nodes.len()];
        for node in &self.nodes {
            for up in &node.upstream {
                downstream[up.index()].push(node.id);
            }
        }
        downstream
    }
}

/// The single mutable object every stage of a computation belongs to.
///
/// Cloning a `Pipeline` yields another handle to the same graph. Graph
/// construction is single-threaded; compile the pipeline into a
/// [`PipelineDag`] to share it across threads.
#[derive(Clone)]
pub struct Pipeline {
    inner: Rc<RefCell<PipelineGraph>>,
}

impl Pipeline {
    /// Creates an empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Creates an empty pipeline.
    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PipelineGraph::new(config))),
        }
    }

    /// Identity of this pipeline.
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.inner.borrow().id
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> String {
        self.inner.borrow().config.name.clone()
    }

    /// Number of nodes created so far.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Adds a source node and returns its stage.
    pub fn draw_from<T: Element>(&self, source: Source<T>) -> Stage<T> {
        let id = self.add_node(&[], source.into_transform());
        Stage::new(self.clone(), id)
    }

    /// Returns a copy of the node with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StageNotFound`] if no such node exists.
    pub fn node(&self, id: NodeId) -> Result<StageNode, PipelineError> {
        self.inner
            .borrow()
            .nodes
            .get(id.index())
            .cloned()
            .ok_or(PipelineError::StageNotFound(id))
    }

    /// Upstream list of a node.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StageNotFound`] if no such node exists.
    pub fn upstream_of(&self, id: NodeId) -> Result<Vec<NodeId>, PipelineError> {
        self.node(id).map(|node| node.upstream().to_vec())
    }

    /// The adjacency mapping: every node with its downstream nodes, in
    /// creation order.
    #[must_use]
    pub fn adjacency(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        let graph = self.inner.borrow();
        graph
            .downstream()
            .into_iter()
            .zip(graph.nodes.iter())
            .map(|(down, node)| (node.id, down.into_vec()))
            .collect()
    }

    /// Snapshots and validates the graph.
    ///
    /// # Errors
    ///
    /// See [`PipelineDag::compile`].
    pub fn compile(&self) -> Result<PipelineDag, PipelineError> {
        PipelineDag::compile(&self.inner.borrow())
    }

    pub(crate) fn add_node(&self, upstream: &[NodeId], transform: Transform) -> NodeId {
        self.inner.borrow_mut().add_node(upstream, transform)
    }

    /// Fails with [`PipelineError::CrossGraphReference`] unless `other` is
    /// this pipeline.
    pub(crate) fn check_same(
        &self,
        context: &'static str,
        other: &Pipeline,
    ) -> Result<(), PipelineError> {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            Ok(())
        } else {
            Err(PipelineError::CrossGraphReference {
                context,
                expected: self.id(),
                found: other.id(),
            })
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.inner.borrow();
        f.debug_struct("Pipeline")
            .field("id", &graph.id)
            .field("name", &graph.config.name)
            .field("node_count", &graph.nodes.len())
            .finish()
    }
}
