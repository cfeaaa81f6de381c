//! # Aggregate Operations
//!
//! Accumulator bundles used by `group_by` and co-group stages.
//!
//! An aggregate operation holds four accumulator-only functions shared by
//! every arity:
//!
//! - **create**: builds an empty accumulator
//! - **combine**: merges a partial accumulator into another (associative)
//! - **deduct** (optional): removes a previously combined contribution
//! - **finish**: turns an accumulator into the result
//!
//! plus one *accumulate* function per input, which is the only part that
//! sees input elements. Keeping accumulate separate lets one accumulator type
//! fold arbitrarily many heterogeneous inputs.
//!
//! ## Arity forms
//!
//! - [`AggregateOperation1`], [`AggregateOperation2`], [`AggregateOperation3`]:
//!   typed accumulate slots addressed by position (`Tag::tag0..tag2`)
//! - [`AggregateOperation`]: tag-generic, driven by an [`AccumulatorsByTag`]
//!   registry whose tag set is validated against the builder that uses it
//!
//! Every `with_*` method returns a new operation that shares the unchanged
//! functions with the receiver; nothing is mutated in place.
//!
//! ## Example
//!
//! ```rust,ignore
//! let op = AggregateOperation::with_create(BagsByTag::new)
//!     .and_accumulate(trade_tag, move |acc, t: &Trade| acc.ensure_bag(trade_tag).push(t.clone()))
//!     .and_accumulate(product_tag, move |acc, p: &Product| acc.ensure_bag(product_tag).push(p.clone()))
//!     .and_combine(BagsByTag::combine_with)
//!     .and_finish(Clone::clone);
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::PipelineError;
use crate::tag::{self, Tag, TagKey, TagOwner};

/// Implements [`Aggregate`] by delegating to a `core` field and a
/// `slot_count` method.
macro_rules! delegate_aggregate {
    ($ty:ident < $($param:ident),+ >) => {
        impl<$($param),+> $crate::aggregate::Aggregate<A, R> for $ty<$($param),+> {
            fn arity(&self) -> usize {
                self.slot_count()
            }

            fn create_accumulator(&self) -> A {
                self.core.create_accumulator()
            }

            fn combine(&self, acc: &mut A, other: &A) {
                self.core.combine(acc, other);
            }

            fn deduct(&self, acc: &mut A, other: &A) -> Result<(), $crate::pipeline::PipelineError> {
                self.core.deduct(acc, other)
            }

            fn has_deduct(&self) -> bool {
                self.core.deduct.is_some()
            }

            fn finish(&self, acc: &A) -> R {
                self.core.finish(acc)
            }
        }
    };
}

mod arity;
mod builder;
pub mod ops;

pub use arity::{AggregateOperation1, AggregateOperation2, AggregateOperation3};
pub use builder::{AggregateOperationBuilder, CombiningBuilder};

/// Builds an empty accumulator.
pub type CreateFn<A> = Arc<dyn Fn() -> A + Send + Sync>;

/// Merges (or, as a deduct function, un-merges) the second accumulator into the first.
pub type CombineFn<A> = Arc<dyn Fn(&mut A, &A) + Send + Sync>;

/// Turns an accumulator into a result.
pub type FinishFn<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

/// Folds one input element into an accumulator.
pub type AccumulateItemFn<A, T> = Arc<dyn Fn(&mut A, &T) + Send + Sync>;

/// Accumulate function with its input type erased. Returns `false` when the
/// item is not of the expected type.
pub(crate) type ErasedAccumulateFn<A> = Arc<dyn Fn(&mut A, &dyn Any) -> bool + Send + Sync>;

/// Common surface of every aggregate operation arity.
pub trait Aggregate<A, R> {
    /// Number of accumulate functions (one per input).
    fn arity(&self) -> usize;

    /// Creates an empty accumulator.
    fn create_accumulator(&self) -> A;

    /// Merges `other` into `acc`.
    fn combine(&self, acc: &mut A, other: &A);

    /// Removes `other`'s prior contribution from `acc`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DeductUnsupported`] for forward-only operations.
    fn deduct(&self, acc: &mut A, other: &A) -> Result<(), PipelineError>;

    /// Returns `true` if the operation supports retraction.
    fn has_deduct(&self) -> bool;

    /// Computes the result for `acc`.
    fn finish(&self, acc: &A) -> R;
}

/// Accumulator-only functions shared by all arities.
pub(crate) struct OperationCore<A, R> {
    pub(crate) create: CreateFn<A>,
    pub(crate) combine: CombineFn<A>,
    pub(crate) deduct: Option<CombineFn<A>>,
    pub(crate) finish: FinishFn<A, R>,
}

impl<A, R> Clone for OperationCore<A, R> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
            combine: Arc::clone(&self.combine),
            deduct: self.deduct.clone(),
            finish: Arc::clone(&self.finish),
        }
    }
}

impl<A, R> OperationCore<A, R> {
    pub(crate) fn create_accumulator(&self) -> A {
        (self.create)()
    }

    pub(crate) fn combine(&self, acc: &mut A, other: &A) {
        (self.combine)(acc, other);
    }

    pub(crate) fn deduct(&self, acc: &mut A, other: &A) -> Result<(), PipelineError> {
        let deduct = self.deduct.as_ref().ok_or(PipelineError::DeductUnsupported)?;
        deduct(acc, other);
        Ok(())
    }

    pub(crate) fn finish(&self, acc: &A) -> R {
        (self.finish)(acc)
    }

    pub(crate) fn with_finish<R1>(&self, finish: FinishFn<A, R1>) -> OperationCore<A, R1> {
        OperationCore {
            create: Arc::clone(&self.create),
            combine: Arc::clone(&self.combine),
            deduct: self.deduct.clone(),
            finish,
        }
    }

    pub(crate) fn with_deduct(&self, deduct: CombineFn<A>) -> Self {
        Self {
            deduct: Some(deduct),
            ..self.clone()
        }
    }
}

/// Registry of type-erased accumulate functions keyed by tag.
///
/// Each entry is stored under the tag's erased identity, which includes the
/// witness type, so a function can only ever be fetched back under the type
/// it was registered with.
pub struct AccumulatorsByTag<A> {
    entries: BTreeMap<TagKey, ErasedAccumulateFn<A>>,
}

impl<A: 'static> AccumulatorsByTag<A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers `accumulate` under `tag`, replacing any previous entry.
    pub fn insert<T: 'static>(
        &mut self,
        tag: Tag<T>,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) {
        self.insert_fn(tag, Arc::new(accumulate));
    }

    /// Registers an already shared accumulate function under `tag`.
    pub fn insert_fn<T: 'static>(&mut self, tag: Tag<T>, accumulate: AccumulateItemFn<A, T>) {
        let erased: ErasedAccumulateFn<A> = Arc::new(move |acc: &mut A, item: &dyn Any| {
            match item.downcast_ref::<T>() {
                Some(item) => {
                    accumulate(acc, item);
                    true
                }
                None => false,
            }
        });
        self.entries.insert(tag.key(), erased);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: 'static>(
        mut self,
        tag: Tag<T>,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> Self {
        self.insert(tag, accumulate);
        self
    }

    /// Returns the typed accumulate function registered under `tag`.
    #[must_use]
    pub fn get<T: 'static>(&self, tag: Tag<T>) -> Option<AccumulateItemFn<A, T>> {
        let erased = Arc::clone(self.entries.get(&tag.key())?);
        Some(Arc::new(move |acc: &mut A, item: &T| {
            erased(acc, item as &dyn Any);
        }))
    }

    pub(crate) fn get_erased(&self, key: &TagKey) -> Option<&ErasedAccumulateFn<A>> {
        self.entries.get(key)
    }
}

impl<A> AccumulatorsByTag<A> {
    /// Returns `true` if an entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &TagKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered tags in tag order.
    pub fn tags(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.entries.keys().copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that this registry holds exactly the `expected` tag set.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ArityMismatch`] if the entry count differs
    /// - [`PipelineError::ForeignTag`] if an entry's tag comes from a scope
    ///   that minted none of the expected tags
    /// - [`PipelineError::MissingTag`] if an expected tag has no entry
    pub(crate) fn validate_against(
        &self,
        context: &'static str,
        expected: &[TagKey],
    ) -> Result<(), PipelineError> {
        if self.entries.len() != expected.len() {
            return Err(PipelineError::ArityMismatch {
                context,
                expected: expected.len(),
                given: self.entries.len(),
                expected_tags: tag::describe(expected),
            });
        }
        let owners: Vec<TagOwner> = expected.iter().map(TagKey::owner).collect();
        if let Some(foreign) = self.entries.keys().find(|k| !owners.contains(&k.owner())) {
            return Err(PipelineError::ForeignTag {
                context,
                tag: *foreign,
                expected_tags: tag::describe(expected),
            });
        }
        if let Some(missing) = expected.iter().find(|k| !self.entries.contains_key(k)) {
            return Err(PipelineError::MissingTag {
                context,
                tag: *missing,
                expected_tags: tag::describe(expected),
            });
        }
        Ok(())
    }
}

impl<A: 'static> Default for AccumulatorsByTag<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for AccumulatorsByTag<A> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

/// Two registries are equal when they hold the same tags bound to the very
/// same function instances.
impl<A> PartialEq for AccumulatorsByTag<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((ka, fa), (kb, fb))| ka == kb && Arc::ptr_eq(fa, fb))
    }
}

impl<A> fmt::Debug for AccumulatorsByTag<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.keys().map(|k| format!("{k}")))
            .finish()
    }
}

/// Tag-generic aggregate operation of arbitrary arity.
///
/// The declared tag set is the key set of its [`AccumulatorsByTag`]. A
/// co-group builder checks that set against its own clause tags before it
/// creates any node.
pub struct AggregateOperation<A, R> {
    pub(crate) core: OperationCore<A, R>,
    accumulators: AccumulatorsByTag<A>,
}

impl<A: 'static> AggregateOperation<A, ()> {
    /// Starts building an operation from its accumulator constructor.
    pub fn with_create(
        create: impl Fn() -> A + Send + Sync + 'static,
    ) -> AggregateOperationBuilder<A, ()> {
        AggregateOperationBuilder::new(Arc::new(create))
    }
}

impl<A: 'static, R: 'static> AggregateOperation<A, R> {
    pub(crate) fn from_parts(core: OperationCore<A, R>, accumulators: AccumulatorsByTag<A>) -> Self {
        Self { core, accumulators }
    }

    /// Tags known to the operation, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.accumulators.tags()
    }

    /// The accumulate registry.
    #[must_use]
    pub fn accumulators_by_tag(&self) -> &AccumulatorsByTag<A> {
        &self.accumulators
    }

    /// Folds `item`, which arrived on the input addressed by `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingTag`] if `tag` is unknown to the operation.
    pub fn accumulate<T: 'static>(
        &self,
        tag: Tag<T>,
        acc: &mut A,
        item: &T,
    ) -> Result<(), PipelineError> {
        let key = tag.key();
        match self.accumulators.get_erased(&key) {
            Some(accumulate) if accumulate(acc, item as &dyn Any) => Ok(()),
            _ => Err(PipelineError::MissingTag {
                context: "AggregateOperation::accumulate",
                tag: key,
                expected_tags: tag::describe(&self.tags().collect::<Vec<_>>()),
            }),
        }
    }

    /// Erased form of [`accumulate`](Self::accumulate); returns `false` if
    /// there is no entry for `key` or `item` has the wrong type.
    pub(crate) fn accumulate_erased(&self, key: &TagKey, acc: &mut A, item: &dyn Any) -> bool {
        self.accumulators
            .get_erased(key)
            .is_some_and(|accumulate| accumulate(acc, item))
    }

    /// Returns a copy driven by `accumulators` instead.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::ArityMismatch`], [`PipelineError::ForeignTag`]
    /// or [`PipelineError::MissingTag`] unless `accumulators` covers exactly
    /// this operation's tags.
    pub fn with_accumulators_by_tag(
        &self,
        accumulators: AccumulatorsByTag<A>,
    ) -> Result<Self, PipelineError> {
        let expected: Vec<TagKey> = self.tags().collect();
        accumulators.validate_against("AggregateOperation::with_accumulators_by_tag", &expected)?;
        Ok(Self::from_parts(self.core.clone(), accumulators))
    }

    /// Returns a copy whose accumulate function for `tag` is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingTag`] if `tag` is unknown to the operation.
    pub fn with_accumulate_item_f<T: 'static>(
        &self,
        tag: Tag<T>,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> Result<Self, PipelineError> {
        if !self.accumulators.contains(&tag.key()) {
            return Err(PipelineError::MissingTag {
                context: "AggregateOperation::with_accumulate_item_f",
                tag: tag.key(),
                expected_tags: tag::describe(&self.tags().collect::<Vec<_>>()),
            });
        }
        let mut accumulators = self.accumulators.clone();
        accumulators.insert(tag, accumulate);
        Ok(Self::from_parts(self.core.clone(), accumulators))
    }

    /// Returns a copy with a different finish function.
    #[must_use]
    pub fn with_finish<R1: 'static>(
        &self,
        finish: impl Fn(&A) -> R1 + Send + Sync + 'static,
    ) -> AggregateOperation<A, R1> {
        AggregateOperation::from_parts(self.core.with_finish(Arc::new(finish)), self.accumulators.clone())
    }

    /// Checks the operation's tag set against the tags of a builder.
    pub(crate) fn validate_tags(
        &self,
        context: &'static str,
        expected: &[TagKey],
    ) -> Result<(), PipelineError> {
        self.accumulators.validate_against(context, expected)
    }
}

impl<A, R> AggregateOperation<A, R> {
    fn slot_count(&self) -> usize {
        self.accumulators.len()
    }
}

delegate_aggregate!(AggregateOperation<A, R>);

impl<A, R> Clone for AggregateOperation<A, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            accumulators: self.accumulators.clone(),
        }
    }
}

impl<A, R> fmt::Debug for AggregateOperation<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOperation")
            .field("tags", &self.accumulators)
            .field("deduct", &self.core.deduct.is_some())
            .finish_non_exhaustive()
    }
}
