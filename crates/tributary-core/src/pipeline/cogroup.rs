//! Multi-way co-group: full outer group-by-key across N inputs.
//!
//! Every clause of a [`CoGroupBuilder`], the primary one included, brings
//! its own key function. Elements of all inputs that share a key are folded
//! into one accumulator through the accumulate function registered for
//! their input's tag, and each accumulator is finished once. A key needs to
//! occur in only one input to produce an output record.
//!
//! Keys are emitted in order of first appearance, scanning the inputs in tag
//! order.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::aggregate::ops::{self, ToBags};
use crate::aggregate::{Aggregate, AggregateOperation};
use crate::bag::BagsByTag;
use crate::execution::ExecutionError;
use crate::tag::{Tag, TagKey, TagMinter, TagOwner};
use crate::Element;

use super::error::PipelineError;
use super::graph::{NodeId, Pipeline};
use super::stage::Stage;
use super::transform::{elements, Batch, Body, Kernel, Partition, Transform, TransformKind};

/// One co-group input with its element type erased.
pub(crate) trait KeyedInput<K>: Send + Sync {
    fn tag(&self) -> TagKey;

    /// Calls `f` with the key and the element for every element of `input`.
    /// Stops with [`ExecutionError::ElementTypeMismatch`] as soon as `f`
    /// rejects an element.
    fn for_each(
        &self,
        node: &str,
        input: &Partition,
        f: &mut dyn FnMut(K, &dyn Any) -> bool,
    ) -> Result<(), ExecutionError>;

    /// Registers this input's typed tag with a bag-collecting operation.
    fn register_bag(&self, bags: ToBags) -> ToBags;
}

struct KeyedClause<K, E> {
    tag: Tag<E>,
    key: Arc<dyn Fn(&E) -> K + Send + Sync>,
}

impl<K: 'static, E: Element> KeyedInput<K> for KeyedClause<K, E> {
    fn tag(&self) -> TagKey {
        self.tag.key()
    }

    fn for_each(
        &self,
        node: &str,
        input: &Partition,
        f: &mut dyn FnMut(K, &dyn Any) -> bool,
    ) -> Result<(), ExecutionError> {
        for item in elements::<E>(node, input)? {
            if !f((self.key)(item), item as &dyn Any) {
                return Err(ExecutionError::ElementTypeMismatch {
                    node: node.to_string(),
                    input: self.tag.index(),
                    expected: type_name::<E>(),
                });
            }
        }
        Ok(())
    }

    fn register_bag(&self, bags: ToBags) -> ToBags {
        bags.with_tag(self.tag)
    }
}

struct CoGroupClause<K> {
    pipeline: Pipeline,
    node: NodeId,
    input: Arc<dyn KeyedInput<K>>,
}

/// Collects the clauses of a multi-way co-group.
///
/// ```rust,ignore
/// let mut builder = trades.co_group_builder(|t: &Trade| t.class_id);
/// let trade_tag = builder.left_tag();
/// let a_tag = builder.add(&a, |x: &A| x.class_id);
/// let b_tag = builder.add(&b, |x: &B| x.class_id);
/// let grouped = builder.build_to_bags()?; // Stage<(u32, BagsByTag)>
/// ```
pub struct CoGroupBuilder<K, T> {
    primary: Stage<T>,
    left_tag: Tag<T>,
    minter: TagMinter,
    clauses: BTreeMap<TagKey, CoGroupClause<K>>,
}

impl<K, T> CoGroupBuilder<K, T>
where
    K: Element + Hash + Eq,
    T: Element,
{
    pub(crate) fn new(primary: Stage<T>, key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self::with_owner(primary, key, TagOwner::unique())
    }

    /// A builder whose tags are the positional `tag0`, `tag1`, ...
    pub(crate) fn positional(
        primary: Stage<T>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self::with_owner(primary, key, TagOwner::Positional)
    }

    fn with_owner(
        primary: Stage<T>,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        owner: TagOwner,
    ) -> Self {
        let mut builder = Self {
            left_tag: Tag::minted(0, owner),
            primary: primary.clone(),
            minter: TagMinter::new(owner),
            clauses: BTreeMap::new(),
        };
        builder.left_tag = builder.add(&primary, key);
        builder
    }

    /// Tag of the primary stage (index 0).
    #[must_use]
    pub fn left_tag(&self) -> Tag<T> {
        self.left_tag
    }

    /// Adds an input grouped by `key`; returns its tag.
    pub fn add<E: Element>(
        &mut self,
        stage: &Stage<E>,
        key: impl Fn(&E) -> K + Send + Sync + 'static,
    ) -> Tag<E> {
        let tag = self.minter.mint::<E>();
        let input = KeyedClause {
            tag,
            key: Arc::new(key),
        };
        self.clauses.insert(
            tag.key(),
            CoGroupClause {
                pipeline: stage.pipeline().clone(),
                node: stage.id(),
                input: Arc::new(input),
            },
        );
        tag
    }

    /// Tags of all clauses, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.clauses.keys().copied()
    }

    /// Creates the co-group node, aggregating with `op`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ArityMismatch`], [`PipelineError::ForeignTag`] or
    ///   [`PipelineError::MissingTag`] unless `op` has an accumulate function
    ///   for exactly this builder's tags
    /// - [`PipelineError::CrossGraphReference`] if an input belongs to
    ///   another pipeline
    ///
    /// No node is created when an error is returned.
    pub fn build<A: 'static, R: Element>(
        self,
        op: AggregateOperation<A, R>,
    ) -> Result<Stage<(K, R)>, PipelineError> {
        self.build_in("CoGroupBuilder::build", op)
    }

    /// Creates a co-group node whose result holds every input's elements for
    /// the key, bagged under the input's tag. Inputs without elements for a
    /// key contribute an empty bag.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if an input belongs to
    /// another pipeline.
    pub fn build_to_bags(self) -> Result<Stage<(K, BagsByTag)>, PipelineError> {
        let op = self
            .clauses
            .values()
            .fold(ops::to_bags(), |bags, clause| clause.input.register_bag(bags))
            .build();
        self.build_in("CoGroupBuilder::build_to_bags", op)
    }

    pub(crate) fn build_in<A: 'static, R: Element>(
        self,
        context: &'static str,
        op: AggregateOperation<A, R>,
    ) -> Result<Stage<(K, R)>, PipelineError> {
        let tags: Vec<TagKey> = self.tags().collect();
        op.validate_tags(context, &tags)?;

        let pipeline = self.primary.pipeline().clone();
        let mut upstream = Vec::with_capacity(self.clauses.len());
        let mut inputs = Vec::with_capacity(self.clauses.len());
        for clause in self.clauses.into_values() {
            pipeline.check_same(context, &clause.pipeline)?;
            upstream.push(clause.node);
            inputs.push(clause.input);
        }

        let kernel = CoGroupKernel { inputs, op };
        let kind = TransformKind::CoGroup;
        let transform = Transform::new(kind, kind.to_string(), Body::Kernel(Arc::new(kernel)))
            .with_clause_tags(tags);
        let id = pipeline.add_node(&upstream, transform);
        Ok(Stage::new(pipeline, id))
    }
}

impl<K, T> fmt::Debug for CoGroupBuilder<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoGroupBuilder")
            .field("primary", &self.primary.id())
            .field("tags", &self.clauses.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

struct CoGroupKernel<K, A, R> {
    inputs: Vec<Arc<dyn KeyedInput<K>>>,
    op: AggregateOperation<A, R>,
}

impl<K, A, R> Kernel for CoGroupKernel<K, A, R>
where
    K: Element + Hash + Eq,
    A: 'static,
    R: Element,
{
    fn run(&self, node: &str, inputs: &[&Partition]) -> Result<Batch, ExecutionError> {
        let mut index: FxHashMap<K, usize> = FxHashMap::default();
        let mut groups: Vec<(K, A)> = Vec::new();

        for (i, clause) in self.inputs.iter().enumerate() {
            let input = inputs.get(i).ok_or_else(|| ExecutionError::MissingInput {
                node: node.to_string(),
                input: i,
            })?;
            let tag = clause.tag();
            clause.for_each(node, input, &mut |key: K, item: &dyn Any| {
                let slot = match index.get(&key) {
                    Some(&slot) => slot,
                    None => {
                        groups.push((key.clone(), self.op.create_accumulator()));
                        index.insert(key, groups.len() - 1);
                        groups.len() - 1
                    }
                };
                self.op.accumulate_erased(&tag, &mut groups[slot].1, item)
            })?;
        }

        let output: Vec<(K, R)> = groups
            .into_iter()
            .map(|(key, acc)| {
                let result = self.op.finish(&acc);
                (key, result)
            })
            .collect();
        Ok(Batch::from_vec(output))
    }
}
