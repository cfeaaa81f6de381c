//! Transform payloads carried by pipeline nodes.
//!
//! A [`Transform`] tells a planner *how* a node derives from its upstream
//! list: its [`TransformKind`], a name, the ordered clause tags of a
//! multi-input node, and a type-erased body the local executor can run.
//! Element data moves between bodies as a [`Partition`], a shared `Vec<T>`
//! behind `dyn Any`.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::execution::ExecutionError;
use crate::tag::TagKey;
use crate::Element;

/// Materialized output of one node: a `Vec<T>` for the node's element type.
pub(crate) type Partition = Arc<dyn Any + Send + Sync>;

/// A partition together with its element count.
pub(crate) struct Batch {
    pub(crate) data: Partition,
    pub(crate) len: usize,
}

impl Batch {
    pub(crate) fn from_vec<T: Element>(items: Vec<T>) -> Self {
        Self {
            len: items.len(),
            data: Arc::new(items),
        }
    }
}

/// Reads the `Vec<T>` out of `partition`.
pub(crate) fn elements<'a, T: Element>(
    node: &str,
    partition: &'a Partition,
) -> Result<&'a [T], ExecutionError> {
    partition
        .downcast_ref::<Vec<T>>()
        .map(Vec::as_slice)
        .ok_or_else(|| ExecutionError::PartitionTypeMismatch {
            node: node.to_string(),
            expected: type_name::<T>(),
        })
}

/// Classification of a node for the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Reads a source; no upstream.
    Source,
    /// One output per input element.
    Map,
    /// Keeps the input elements matching a predicate.
    Filter,
    /// Zero or more outputs per input element.
    FlatMap,
    /// Keyed single-input aggregation.
    GroupBy,
    /// Broadcast hash join of a primary input with N secondary inputs.
    HashJoin,
    /// Full outer keyed aggregation across N inputs.
    CoGroup,
    /// Writes to a sink; no downstream.
    Sink,
}

impl TransformKind {
    /// Returns `true` for kinds that accept more than one upstream node.
    #[must_use]
    pub fn is_multi_input(self) -> bool {
        matches!(self, Self::HashJoin | Self::CoGroup)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Source => "source",
            Self::Map => "map",
            Self::Filter => "filter",
            Self::FlatMap => "flat-map",
            Self::GroupBy => "group-by",
            Self::HashJoin => "hash-join",
            Self::CoGroup => "co-group",
            Self::Sink => "sink",
        };
        f.write_str(s)
    }
}

/// Produces the elements of a source node.
pub(crate) trait SourceReader: Send + Sync {
    fn read(&self) -> Batch;
}

/// Derives a node's output from its upstream partitions, in upstream order.
pub(crate) trait Kernel: Send + Sync {
    fn run(&self, node: &str, inputs: &[&Partition]) -> Result<Batch, ExecutionError>;
}

/// Consumes the partition of a sink node's single upstream. Returns the
/// number of elements written.
pub(crate) trait SinkWriter: Send + Sync {
    fn write(&self, node: &str, input: &Partition) -> Result<usize, ExecutionError>;
}

#[derive(Clone)]
pub(crate) enum Body {
    Source(Arc<dyn SourceReader>),
    Kernel(Arc<dyn Kernel>),
    Sink(Arc<dyn SinkWriter>),
}

/// Payload of one pipeline node.
#[derive(Clone)]
pub struct Transform {
    kind: TransformKind,
    name: String,
    clause_tags: Vec<TagKey>,
    body: Body,
}

impl Transform {
    pub(crate) fn new(kind: TransformKind, name: impl Into<String>, body: Body) -> Self {
        Self {
            kind,
            name: name.into(),
            clause_tags: Vec::new(),
            body,
        }
    }

    pub(crate) fn with_clause_tags(mut self, tags: Vec<TagKey>) -> Self {
        self.clause_tags = tags;
        self
    }

    /// Kind of the transform.
    #[must_use]
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clause tags of a multi-input node, in upstream order. Empty for
    /// single-input nodes.
    #[must_use]
    pub fn clause_tags(&self) -> &[TagKey] {
        &self.clause_tags
    }

    pub(crate) fn body(&self) -> &Body {
        &self.body
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("clause_tags", &self.clause_tags)
            .finish_non_exhaustive()
    }
}

type ApplyFn<I, O> = Arc<dyn Fn(&[I]) -> Vec<O> + Send + Sync>;

/// Typed single-input transform, applied with [`Stage::apply`](super::Stage::apply).
///
/// Built by the functions of the [`transforms`](super::transforms) module.
pub struct UnaryTransform<I, O> {
    kind: TransformKind,
    name: String,
    apply: ApplyFn<I, O>,
}

impl<I: Element, O: Element> UnaryTransform<I, O> {
    pub(crate) fn new(
        kind: TransformKind,
        apply: impl Fn(&[I]) -> Vec<O> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            name: kind.to_string(),
            apply: Arc::new(apply),
        }
    }

    /// Returns the transform under a different name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Kind of the transform.
    #[must_use]
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Name of the transform.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the transform to a slice of input elements.
    #[must_use]
    pub fn apply_to(&self, items: &[I]) -> Vec<O> {
        (self.apply)(items)
    }

    pub(crate) fn into_transform(self) -> Transform {
        let kernel = UnaryKernel::<I, O> {
            apply: self.apply,
            _marker: PhantomData,
        };
        Transform::new(self.kind, self.name, Body::Kernel(Arc::new(kernel)))
    }
}

impl<I, O> Clone for UnaryTransform<I, O> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            name: self.name.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<I, O> fmt::Debug for UnaryTransform<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryTransform")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

struct UnaryKernel<I, O> {
    apply: ApplyFn<I, O>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I: Element, O: Element> Kernel for UnaryKernel<I, O> {
    fn run(&self, node: &str, inputs: &[&Partition]) -> Result<Batch, ExecutionError> {
        let input = inputs.first().ok_or_else(|| ExecutionError::MissingInput {
            node: node.to_string(),
            input: 0,
        })?;
        let items = elements::<I>(node, input)?;
        Ok(Batch::from_vec((self.apply)(items)))
    }
}
