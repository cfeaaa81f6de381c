//! Fixed-arity aggregate operations.
//!
//! Each form stores its accumulate functions as typed slots. Slot `i` is
//! addressed by the positional tag `Tag::<Ti>::positional(i)`, slot 0 being
//! the primary input. [`AggregateOperation1::to_tagged`] and friends lower a
//! fixed form to the tag-generic [`AggregateOperation`] that stage kernels
//! execute.

use std::fmt;
use std::sync::Arc;

use crate::pipeline::PipelineError;
use crate::tag::{self, Tag, TagKey};

use super::{
    AccumulateItemFn, AccumulatorsByTag, AggregateOperation, OperationCore,
};

/// Looks up a validated slot in `accumulators`.
fn slot<A: 'static, T: 'static>(
    accumulators: &AccumulatorsByTag<A>,
    tag: Tag<T>,
    context: &'static str,
    expected: &[TagKey],
) -> Result<AccumulateItemFn<A, T>, PipelineError> {
    accumulators.get(tag).ok_or_else(|| PipelineError::MissingTag {
        context,
        tag: tag.key(),
        expected_tags: tag::describe(expected),
    })
}

/// Single-input aggregate operation, as used by `group_by`.
pub struct AggregateOperation1<T0, A, R> {
    pub(crate) core: OperationCore<A, R>,
    accumulate_item_f0: AccumulateItemFn<A, T0>,
}

impl<T0: 'static, A: 'static, R: 'static> AggregateOperation1<T0, A, R> {
    /// Creates a forward-only operation from its parts.
    pub fn new(
        create: impl Fn() -> A + Send + Sync + 'static,
        accumulate: impl Fn(&mut A, &T0) + Send + Sync + 'static,
        combine: impl Fn(&mut A, &A) + Send + Sync + 'static,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> Self {
        let core = OperationCore {
            create: Arc::new(create),
            combine: Arc::new(combine),
            deduct: None,
            finish: Arc::new(finish),
        };
        Self::from_parts(core, Arc::new(accumulate))
    }

    pub(crate) fn from_parts(core: OperationCore<A, R>, f0: AccumulateItemFn<A, T0>) -> Self {
        Self {
            core,
            accumulate_item_f0: f0,
        }
    }

    /// Returns a copy that supports retraction through `deduct`.
    #[must_use]
    pub fn with_deduct(&self, deduct: impl Fn(&mut A, &A) + Send + Sync + 'static) -> Self {
        Self::from_parts(
            self.core.with_deduct(Arc::new(deduct)),
            Arc::clone(&self.accumulate_item_f0),
        )
    }

    /// The accumulate function of slot 0.
    #[must_use]
    pub fn accumulate_item_f0(&self) -> &AccumulateItemFn<A, T0> {
        &self.accumulate_item_f0
    }

    /// Folds `item` into `acc`.
    pub fn accumulate(&self, acc: &mut A, item: &T0) {
        (self.accumulate_item_f0)(acc, item);
    }

    /// Returns a copy with a different finish function.
    #[must_use]
    pub fn with_finish<R1: 'static>(
        &self,
        finish: impl Fn(&A) -> R1 + Send + Sync + 'static,
    ) -> AggregateOperation1<T0, A, R1> {
        AggregateOperation1::from_parts(
            self.core.with_finish(Arc::new(finish)),
            Arc::clone(&self.accumulate_item_f0),
        )
    }

    /// Returns a copy that accepts a different input type.
    #[must_use]
    pub fn with_accumulate_item_f<T: 'static>(
        &self,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> AggregateOperation1<T, A, R> {
        AggregateOperation1::from_parts(self.core.clone(), Arc::new(accumulate))
    }

    /// The slot as a registry keyed by `tag0`.
    #[must_use]
    pub fn accumulators_by_tag(&self) -> AccumulatorsByTag<A> {
        let mut accumulators = AccumulatorsByTag::new();
        accumulators.insert_fn(Tag::<T0>::tag0(), Arc::clone(&self.accumulate_item_f0));
        accumulators
    }

    /// Returns a copy whose slot is taken from `accumulators`.
    ///
    /// # Errors
    ///
    /// Fails unless `accumulators` holds exactly one entry, under `tag0`.
    pub fn with_accumulators_by_tag(
        &self,
        accumulators: &AccumulatorsByTag<A>,
    ) -> Result<Self, PipelineError> {
        const CONTEXT: &str = "AggregateOperation1::with_accumulators_by_tag";
        let expected = [Tag::<T0>::tag0().key()];
        accumulators.validate_against(CONTEXT, &expected)?;
        let f0 = slot(accumulators, Tag::<T0>::tag0(), CONTEXT, &expected)?;
        Ok(Self::from_parts(self.core.clone(), f0))
    }

    /// Lowers to the tag-generic form.
    #[must_use]
    pub fn to_tagged(&self) -> AggregateOperation<A, R> {
        AggregateOperation::from_parts(self.core.clone(), self.accumulators_by_tag())
    }
}

impl<T0, A, R> AggregateOperation1<T0, A, R> {
    #[allow(clippy::unused_self)]
    fn slot_count(&self) -> usize {
        1
    }
}

delegate_aggregate!(AggregateOperation1<T0, A, R>);

impl<T0, A, R> Clone for AggregateOperation1<T0, A, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            accumulate_item_f0: Arc::clone(&self.accumulate_item_f0),
        }
    }
}

impl<T0, A, R> fmt::Debug for AggregateOperation1<T0, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOperation1")
            .field("input", &std::any::type_name::<T0>())
            .field("deduct", &self.core.deduct.is_some())
            .finish_non_exhaustive()
    }
}

/// Two-input aggregate operation, as used by the direct two-way co-group.
pub struct AggregateOperation2<T0, T1, A, R> {
    pub(crate) core: OperationCore<A, R>,
    accumulate_item_f0: AccumulateItemFn<A, T0>,
    accumulate_item_f1: AccumulateItemFn<A, T1>,
}

impl<T0: 'static, T1: 'static, A: 'static, R: 'static> AggregateOperation2<T0, T1, A, R> {
    pub(crate) fn from_parts(
        core: OperationCore<A, R>,
        f0: AccumulateItemFn<A, T0>,
        f1: AccumulateItemFn<A, T1>,
    ) -> Self {
        Self {
            core,
            accumulate_item_f0: f0,
            accumulate_item_f1: f1,
        }
    }

    /// The accumulate function of slot 0.
    #[must_use]
    pub fn accumulate_item_f0(&self) -> &AccumulateItemFn<A, T0> {
        &self.accumulate_item_f0
    }

    /// The accumulate function of slot 1.
    #[must_use]
    pub fn accumulate_item_f1(&self) -> &AccumulateItemFn<A, T1> {
        &self.accumulate_item_f1
    }

    /// Returns a copy with a different finish function.
    #[must_use]
    pub fn with_finish<R1: 'static>(
        &self,
        finish: impl Fn(&A) -> R1 + Send + Sync + 'static,
    ) -> AggregateOperation2<T0, T1, A, R1> {
        AggregateOperation2::from_parts(
            self.core.with_finish(Arc::new(finish)),
            Arc::clone(&self.accumulate_item_f0),
            Arc::clone(&self.accumulate_item_f1),
        )
    }

    /// Returns a copy whose slot 0 accepts a different input type.
    #[must_use]
    pub fn with_accumulate_item_f0<T: 'static>(
        &self,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> AggregateOperation2<T, T1, A, R> {
        AggregateOperation2::from_parts(
            self.core.clone(),
            Arc::new(accumulate),
            Arc::clone(&self.accumulate_item_f1),
        )
    }

    /// Returns a copy whose slot 1 accepts a different input type.
    #[must_use]
    pub fn with_accumulate_item_f1<T: 'static>(
        &self,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> AggregateOperation2<T0, T, A, R> {
        AggregateOperation2::from_parts(
            self.core.clone(),
            Arc::clone(&self.accumulate_item_f0),
            Arc::new(accumulate),
        )
    }

    /// The slots as a registry keyed by `tag0` and `tag1`.
    #[must_use]
    pub fn accumulators_by_tag(&self) -> AccumulatorsByTag<A> {
        let mut accumulators = AccumulatorsByTag::new();
        accumulators.insert_fn(Tag::<T0>::tag0(), Arc::clone(&self.accumulate_item_f0));
        accumulators.insert_fn(Tag::<T1>::tag1(), Arc::clone(&self.accumulate_item_f1));
        accumulators
    }

    /// Returns a copy whose slots are taken from `accumulators`.
    ///
    /// # Errors
    ///
    /// Fails unless `accumulators` holds exactly `tag0` and `tag1`.
    pub fn with_accumulators_by_tag(
        &self,
        accumulators: &AccumulatorsByTag<A>,
    ) -> Result<Self, PipelineError> {
        const CONTEXT: &str = "AggregateOperation2::with_accumulators_by_tag";
        let expected = [Tag::<T0>::tag0().key(), Tag::<T1>::tag1().key()];
        accumulators.validate_against(CONTEXT, &expected)?;
        let f0 = slot(accumulators, Tag::<T0>::tag0(), CONTEXT, &expected)?;
        let f1 = slot(accumulators, Tag::<T1>::tag1(), CONTEXT, &expected)?;
        Ok(Self::from_parts(self.core.clone(), f0, f1))
    }

    /// Lowers to the tag-generic form.
    #[must_use]
    pub fn to_tagged(&self) -> AggregateOperation<A, R> {
        AggregateOperation::from_parts(self.core.clone(), self.accumulators_by_tag())
    }
}

impl<T0, T1, A, R> AggregateOperation2<T0, T1, A, R> {
    #[allow(clippy::unused_self)]
    fn slot_count(&self) -> usize {
        2
    }
}

delegate_aggregate!(AggregateOperation2<T0, T1, A, R>);

impl<T0, T1, A, R> Clone for AggregateOperation2<T0, T1, A, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            accumulate_item_f0: Arc::clone(&self.accumulate_item_f0),
            accumulate_item_f1: Arc::clone(&self.accumulate_item_f1),
        }
    }
}

impl<T0, T1, A, R> fmt::Debug for AggregateOperation2<T0, T1, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOperation2")
            .field("inputs", &[std::any::type_name::<T0>(), std::any::type_name::<T1>()])
            .field("deduct", &self.core.deduct.is_some())
            .finish_non_exhaustive()
    }
}

/// Three-input aggregate operation, as used by the direct three-way co-group.
pub struct AggregateOperation3<T0, T1, T2, A, R> {
    pub(crate) core: OperationCore<A, R>,
    accumulate_item_f0: AccumulateItemFn<A, T0>,
    accumulate_item_f1: AccumulateItemFn<A, T1>,
    accumulate_item_f2: AccumulateItemFn<A, T2>,
}

impl<T0: 'static, T1: 'static, T2: 'static, A: 'static, R: 'static>
    AggregateOperation3<T0, T1, T2, A, R>
{
    pub(crate) fn from_parts(
        core: OperationCore<A, R>,
        f0: AccumulateItemFn<A, T0>,
        f1: AccumulateItemFn<A, T1>,
        f2: AccumulateItemFn<A, T2>,
    ) -> Self {
        Self {
            core,
            accumulate_item_f0: f0,
            accumulate_item_f1: f1,
            accumulate_item_f2: f2,
        }
    }

    /// The accumulate function of slot 0.
    #[must_use]
    pub fn accumulate_item_f0(&self) -> &AccumulateItemFn<A, T0> {
        &self.accumulate_item_f0
    }

    /// The accumulate function of slot 1.
    #[must_use]
    pub fn accumulate_item_f1(&self) -> &AccumulateItemFn<A, T1> {
        &self.accumulate_item_f1
    }

    /// The accumulate function of slot 2.
    #[must_use]
    pub fn accumulate_item_f2(&self) -> &AccumulateItemFn<A, T2> {
        &self.accumulate_item_f2
    }

    /// Returns a copy with a different finish function.
    #[must_use]
    pub fn with_finish<R1: 'static>(
        &self,
        finish: impl Fn(&A) -> R1 + Send + Sync + 'static,
    ) -> AggregateOperation3<T0, T1, T2, A, R1> {
        AggregateOperation3::from_parts(
            self.core.with_finish(Arc::new(finish)),
            Arc::clone(&self.accumulate_item_f0),
            Arc::clone(&self.accumulate_item_f1),
            Arc::clone(&self.accumulate_item_f2),
        )
    }

    /// Returns a copy whose slot 2 accepts a different input type.
    #[must_use]
    pub fn with_accumulate_item_f2<T: 'static>(
        &self,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> AggregateOperation3<T0, T1, T, A, R> {
        AggregateOperation3::from_parts(
            self.core.clone(),
            Arc::clone(&self.accumulate_item_f0),
            Arc::clone(&self.accumulate_item_f1),
            Arc::new(accumulate),
        )
    }

    /// The slots as a registry keyed by `tag0`, `tag1` and `tag2`.
    #[must_use]
    pub fn accumulators_by_tag(&self) -> AccumulatorsByTag<A> {
        let mut accumulators = AccumulatorsByTag::new();
        accumulators.insert_fn(Tag::<T0>::tag0(), Arc::clone(&self.accumulate_item_f0));
        accumulators.insert_fn(Tag::<T1>::tag1(), Arc::clone(&self.accumulate_item_f1));
        accumulators.insert_fn(Tag::<T2>::tag2(), Arc::clone(&self.accumulate_item_f2));
        accumulators
    }

    /// Returns a copy whose slots are taken from `accumulators`.
    ///
    /// # Errors
    ///
    /// Fails unless `accumulators` holds exactly `tag0`, `tag1` and `tag2`.
    pub fn with_accumulators_by_tag(
        &self,
        accumulators: &AccumulatorsByTag<A>,
    ) -> Result<Self, PipelineError> {
        const CONTEXT: &str = "AggregateOperation3::with_accumulators_by_tag";
        let expected = [
            Tag::<T0>::tag0().key(),
            Tag::<T1>::tag1().key(),
            Tag::<T2>::tag2().key(),
        ];
        accumulators.validate_against(CONTEXT, &expected)?;
        let f0 = slot(accumulators, Tag::<T0>::tag0(), CONTEXT, &expected)?;
        let f1 = slot(accumulators, Tag::<T1>::tag1(), CONTEXT, &expected)?;
        let f2 = slot(accumulators, Tag::<T2>::tag2(), CONTEXT, &expected)?;
        Ok(Self::from_parts(self.core.clone(), f0, f1, f2))
    }

    /// Lowers to the tag-generic form.
    #[must_use]
    pub fn to_tagged(&self) -> AggregateOperation<A, R> {
        AggregateOperation::from_parts(self.core.clone(), self.accumulators_by_tag())
    }
}

impl<T0, T1, T2, A, R> AggregateOperation3<T0, T1, T2, A, R> {
    #[allow(clippy::unused_self)]
    fn slot_count(&self) -> usize {
        3
    }
}

delegate_aggregate!(AggregateOperation3<T0, T1, T2, A, R>);

impl<T0, T1, T2, A, R> Clone for AggregateOperation3<T0, T1, T2, A, R> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            accumulate_item_f0: Arc::clone(&self.accumulate_item_f0),
            accumulate_item_f1: Arc::clone(&self.accumulate_item_f1),
            accumulate_item_f2: Arc::clone(&self.accumulate_item_f2),
        }
    }
}

impl<T0, T1, T2, A, R> fmt::Debug for AggregateOperation3<T0, T1, T2, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOperation3")
            .field(
                "inputs",
                &[
                    std::any::type_name::<T0>(),
                    std::any::type_name::<T1>(),
                    std::any::type_name::<T2>(),
                ],
            )
            .field("deduct", &self.core.deduct.is_some())
            .finish_non_exhaustive()
    }
}
