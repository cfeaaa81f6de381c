//! Multi-way broadcast hash join.
//!
//! A [`JoinBuilder`] starts from a primary stage (tag 0) and collects one
//! clause per secondary stage, each with its own [`JoinOn`] condition and a
//! freshly minted tag. `build` creates a single node whose upstream list is
//! `[primary, secondary 1, .., secondary N]` in tag order.
//!
//! At execution time every secondary input is built into a hash lookup and
//! each primary element is emitted once, with the matching bucket of every
//! secondary under that secondary's tag. An empty bucket still yields an
//! (empty) bag, so unmatched primary elements are never dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::bag::{AnyBag, BagsByTag};
use crate::execution::ExecutionError;
use crate::tag::{Tag, TagKey, TagMinter, TagOwner};
use crate::Element;

use super::error::PipelineError;
use super::graph::{NodeId, Pipeline};
use super::stage::Stage;
use super::transform::{elements, Batch, Body, Kernel, Partition, Transform, TransformKind};

type KeyFn<X, K> = Arc<dyn Fn(&X) -> K + Send + Sync>;

/// Equi-join condition between a primary element `L` and a secondary
/// element `R`.
pub struct JoinOn<K, L, R> {
    left_key: KeyFn<L, K>,
    right_key: KeyFn<R, K>,
}

impl<K, L, R> JoinOn<K, L, R> {
    /// Matches elements whose extracted keys are equal.
    pub fn on_keys(
        left_key: impl Fn(&L) -> K + Send + Sync + 'static,
        right_key: impl Fn(&R) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            left_key: Arc::new(left_key),
            right_key: Arc::new(right_key),
        }
    }

    /// Key of a primary element.
    pub fn left_key(&self, left: &L) -> K {
        (self.left_key)(left)
    }

    /// Key of a secondary element.
    pub fn right_key(&self, right: &R) -> K {
        (self.right_key)(right)
    }
}

impl<K, L, R> Clone for JoinOn<K, L, R> {
    fn clone(&self) -> Self {
        Self {
            left_key: Arc::clone(&self.left_key),
            right_key: Arc::clone(&self.right_key),
        }
    }
}

impl<K, L, R> fmt::Debug for JoinOn<K, L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOn")
            .field("key", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}

/// A join condition with its secondary element type erased.
pub(crate) trait JoinCondition<T>: Send + Sync {
    /// Builds the lookup for one secondary partition.
    fn build_lookup(
        &self,
        node: &str,
        secondary: &Partition,
    ) -> Result<Box<dyn JoinLookup<T>>, ExecutionError>;
}

pub(crate) trait JoinLookup<T> {
    /// Matching secondary elements for `primary`, as a `Vec<R>` bag.
    fn probe(&self, primary: &T) -> Box<dyn AnyBag>;
}

impl<K, T, E> JoinCondition<T> for JoinOn<K, T, E>
where
    K: Hash + Eq + Send + Sync + 'static,
    T: Element,
    E: Element,
{
    fn build_lookup(
        &self,
        node: &str,
        secondary: &Partition,
    ) -> Result<Box<dyn JoinLookup<T>>, ExecutionError> {
        let mut buckets: FxHashMap<K, Vec<E>> = FxHashMap::default();
        for item in elements::<E>(node, secondary)? {
            buckets
                .entry((self.right_key)(item))
                .or_default()
                .push(item.clone());
        }
        Ok(Box::new(HashLookup {
            buckets,
            left_key: Arc::clone(&self.left_key),
        }))
    }
}

struct HashLookup<K, T, E> {
    buckets: FxHashMap<K, Vec<E>>,
    left_key: KeyFn<T, K>,
}

impl<K, T, E> JoinLookup<T> for HashLookup<K, T, E>
where
    K: Hash + Eq,
    E: Element,
{
    fn probe(&self, primary: &T) -> Box<dyn AnyBag> {
        let matches = self
            .buckets
            .get(&(self.left_key)(primary))
            .cloned()
            .unwrap_or_default();
        Box::new(matches)
    }
}

enum JoinClause<T> {
    /// The primary stage; it drives the join and has no condition.
    Primary,
    Secondary {
        pipeline: Pipeline,
        node: NodeId,
        condition: Arc<dyn JoinCondition<T>>,
    },
}

/// Collects the clauses of a multi-way hash join.
///
/// ```rust,ignore
/// let mut builder = trades.join_builder();
/// let product_tag = builder.add(
///     &products,
///     JoinOn::on_keys(|t: &Trade| t.product_id, |p: &Product| p.id),
/// );
/// let broker_tag = builder.add(
///     &brokers,
///     JoinOn::on_keys(|t: &Trade| t.broker_id, |b: &Broker| b.id),
/// );
/// let joined = builder.build()?; // Stage<(Trade, BagsByTag)>
/// ```
pub struct JoinBuilder<T> {
    primary: Stage<T>,
    left_tag: Tag<T>,
    minter: TagMinter,
    clauses: BTreeMap<TagKey, JoinClause<T>>,
}

impl<T: Element> JoinBuilder<T> {
    pub(crate) fn new(primary: Stage<T>) -> Self {
        Self::with_owner(primary, TagOwner::unique())
    }

    /// A builder whose tags are the positional `tag0`, `tag1`, ...
    pub(crate) fn positional(primary: Stage<T>) -> Self {
        Self::with_owner(primary, TagOwner::Positional)
    }

    fn with_owner(primary: Stage<T>, owner: TagOwner) -> Self {
        let mut minter = TagMinter::new(owner);
        let left_tag = minter.mint::<T>();
        let mut clauses = BTreeMap::new();
        clauses.insert(left_tag.key(), JoinClause::Primary);
        Self {
            primary,
            left_tag,
            minter,
            clauses,
        }
    }

    /// Tag of the primary stage (index 0).
    #[must_use]
    pub fn left_tag(&self) -> Tag<T> {
        self.left_tag
    }

    /// Adds a secondary stage joined on `condition`; returns the tag under
    /// which its matches will appear.
    pub fn add<K, E>(&mut self, stage: &Stage<E>, condition: JoinOn<K, T, E>) -> Tag<E>
    where
        K: Hash + Eq + Send + Sync + 'static,
        E: Element,
    {
        let tag = self.minter.mint::<E>();
        self.clauses.insert(
            tag.key(),
            JoinClause::Secondary {
                pipeline: stage.pipeline().clone(),
                node: stage.id(),
                condition: Arc::new(condition),
            },
        );
        tag
    }

    /// Number of clauses, the primary included.
    #[must_use]
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Creates the join node.
    ///
    /// The resulting stage emits, per primary element, the element and the
    /// matching secondary elements bagged under their tags.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if a secondary stage
    /// belongs to another pipeline. No node is created in that case.
    pub fn build(self) -> Result<Stage<(T, BagsByTag)>, PipelineError> {
        self.build_with("JoinBuilder::build", |item: &T, bags| (item.clone(), bags))
    }

    pub(crate) fn build_with<O: Element>(
        self,
        context: &'static str,
        emit: impl Fn(&T, BagsByTag) -> O + Send + Sync + 'static,
    ) -> Result<Stage<O>, PipelineError> {
        let pipeline = self.primary.pipeline().clone();
        let mut upstream = Vec::with_capacity(self.clauses.len());
        let mut tags = Vec::with_capacity(self.clauses.len());
        let mut conditions = Vec::with_capacity(self.clauses.len().saturating_sub(1));

        for (key, clause) in self.clauses {
            tags.push(key);
            match clause {
                JoinClause::Primary => upstream.push(self.primary.id()),
                JoinClause::Secondary {
                    pipeline: owner,
                    node,
                    condition,
                } => {
                    pipeline.check_same(context, &owner)?;
                    upstream.push(node);
                    conditions.push((key, condition));
                }
            }
        }

        let kernel = HashJoinKernel {
            conditions,
            emit: Arc::new(emit),
        };
        let kind = TransformKind::HashJoin;
        let transform = Transform::new(kind, kind.to_string(), Body::Kernel(Arc::new(kernel)))
            .with_clause_tags(tags);
        let id = pipeline.add_node(&upstream, transform);
        Ok(Stage::new(pipeline, id))
    }
}

impl<T> fmt::Debug for JoinBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinBuilder")
            .field("primary", &self.primary.id())
            .field("tags", &self.clauses.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

type EmitFn<T, O> = Arc<dyn Fn(&T, BagsByTag) -> O + Send + Sync>;

struct HashJoinKernel<T, O> {
    conditions: Vec<(TagKey, Arc<dyn JoinCondition<T>>)>,
    emit: EmitFn<T, O>,
}

impl<T: Element, O: Element> Kernel for HashJoinKernel<T, O> {
    fn run(&self, node: &str, inputs: &[&Partition]) -> Result<Batch, ExecutionError> {
        let missing = |input: usize| ExecutionError::MissingInput {
            node: node.to_string(),
            input,
        };
        let primary = elements::<T>(node, inputs.first().ok_or_else(|| missing(0))?)?;

        let mut lookups = Vec::with_capacity(self.conditions.len());
        for (i, (tag, condition)) in self.conditions.iter().enumerate() {
            let input = inputs.get(i + 1).ok_or_else(|| missing(i + 1))?;
            lookups.push((*tag, condition.build_lookup(node, input)?));
        }

        let output: Vec<O> = primary
            .iter()
            .map(|item| {
                let mut bags = BagsByTag::new();
                for (tag, lookup) in &lookups {
                    bags.put_erased(*tag, lookup.probe(item));
                }
                (self.emit)(item, bags)
            })
            .collect();
        Ok(Batch::from_vec(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_probe_returns_bucket_or_empty() {
        let on = JoinOn::on_keys(|l: &(u32, u8)| l.0, |r: &(u32, char)| r.0);
        let secondary: Partition = Arc::new(vec![(1_u32, 'x'), (1, 'y'), (3, 'z')]);
        let lookup = on.build_lookup("join", &secondary).unwrap();

        let hit = lookup.probe(&(1, 10));
        let hit = hit.as_any().downcast_ref::<Vec<(u32, char)>>().unwrap();
        assert_eq!(hit, &vec![(1, 'x'), (1, 'y')]);

        let miss = lookup.probe(&(2, 20));
        assert_eq!(miss.len(), 0);
    }

    #[test]
    fn test_build_lookup_rejects_wrong_partition() {
        let on = JoinOn::on_keys(|l: &u32| *l, |r: &u32| *r);
        let wrong: Partition = Arc::new(vec!["nope".to_string()]);
        let err = JoinCondition::<u32>::build_lookup(&on, "join", &wrong).err();
        assert!(matches!(err, Some(ExecutionError::PartitionTypeMismatch { .. })));
    }
}
