//! Fluent construction of aggregate operations.
//!
//! `with_create` starts the chain; accumulate functions are added either by
//! tag (producing a tag-generic [`AggregateOperation`]) or by position
//! (producing [`AggregateOperation1`]..[`AggregateOperation3`]). `and_combine`
//! is mandatory, `and_deduct` optional, and `and_finish` ends the chain.
//! The slot type parameter `S` tracks which form is being built, so only the
//! matching `and_finish` is available.

use std::sync::Arc;

use crate::tag::Tag;

use super::{
    AccumulateItemFn, AccumulatorsByTag, AggregateOperation, AggregateOperation1,
    AggregateOperation2, AggregateOperation3, CombineFn, CreateFn, OperationCore,
};

/// First half of the chain: accumulator constructor plus accumulate slots.
pub struct AggregateOperationBuilder<A, S> {
    create: CreateFn<A>,
    slots: S,
}

impl<A: 'static> AggregateOperationBuilder<A, ()> {
    pub(crate) fn new(create: CreateFn<A>) -> Self {
        Self { create, slots: () }
    }

    /// Registers the accumulate function for `tag`.
    pub fn and_accumulate<T: 'static>(
        self,
        tag: Tag<T>,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> AggregateOperationBuilder<A, AccumulatorsByTag<A>> {
        AggregateOperationBuilder {
            create: self.create,
            slots: AccumulatorsByTag::new().with(tag, accumulate),
        }
    }

    /// Registers the accumulate function for positional slot 0.
    pub fn and_accumulate0<T0: 'static>(
        self,
        accumulate: impl Fn(&mut A, &T0) + Send + Sync + 'static,
    ) -> AggregateOperationBuilder<A, (AccumulateItemFn<A, T0>,)> {
        AggregateOperationBuilder {
            create: self.create,
            slots: (Arc::new(accumulate),),
        }
    }
}

impl<A: 'static> AggregateOperationBuilder<A, AccumulatorsByTag<A>> {
    /// Registers the accumulate function for one more tag.
    #[must_use]
    pub fn and_accumulate<T: 'static>(
        mut self,
        tag: Tag<T>,
        accumulate: impl Fn(&mut A, &T) + Send + Sync + 'static,
    ) -> Self {
        self.slots.insert(tag, accumulate);
        self
    }
}

impl<A: 'static, T0: 'static> AggregateOperationBuilder<A, (AccumulateItemFn<A, T0>,)> {
    /// Registers the accumulate function for positional slot 1.
    pub fn and_accumulate1<T1: 'static>(
        self,
        accumulate: impl Fn(&mut A, &T1) + Send + Sync + 'static,
    ) -> AggregateOperationBuilder<A, (AccumulateItemFn<A, T0>, AccumulateItemFn<A, T1>)> {
        let (f0,) = self.slots;
        AggregateOperationBuilder {
            create: self.create,
            slots: (f0, Arc::new(accumulate)),
        }
    }
}

impl<A: 'static, T0: 'static, T1: 'static>
    AggregateOperationBuilder<A, (AccumulateItemFn<A, T0>, AccumulateItemFn<A, T1>)>
{
    /// Registers the accumulate function for positional slot 2.
    #[allow(clippy::type_complexity)]
    pub fn and_accumulate2<T2: 'static>(
        self,
        accumulate: impl Fn(&mut A, &T2) + Send + Sync + 'static,
    ) -> AggregateOperationBuilder<
        A,
        (
            AccumulateItemFn<A, T0>,
            AccumulateItemFn<A, T1>,
            AccumulateItemFn<A, T2>,
        ),
    > {
        let (f0, f1) = self.slots;
        AggregateOperationBuilder {
            create: self.create,
            slots: (f0, f1, Arc::new(accumulate)),
        }
    }
}

impl<A: 'static, S> AggregateOperationBuilder<A, S> {
    /// Sets the combine function.
    pub fn and_combine(
        self,
        combine: impl Fn(&mut A, &A) + Send + Sync + 'static,
    ) -> CombiningBuilder<A, S> {
        CombiningBuilder {
            create: self.create,
            slots: self.slots,
            combine: Arc::new(combine),
            deduct: None,
        }
    }
}

/// Second half of the chain: combine is known, deduct and finish follow.
pub struct CombiningBuilder<A, S> {
    create: CreateFn<A>,
    slots: S,
    combine: CombineFn<A>,
    deduct: Option<CombineFn<A>>,
}

impl<A: 'static, S> CombiningBuilder<A, S> {
    /// Sets the deduct function, making the operation retractable.
    #[must_use]
    pub fn and_deduct(mut self, deduct: impl Fn(&mut A, &A) + Send + Sync + 'static) -> Self {
        self.deduct = Some(Arc::new(deduct));
        self
    }

    fn core<R>(
        create: CreateFn<A>,
        combine: CombineFn<A>,
        deduct: Option<CombineFn<A>>,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> OperationCore<A, R> {
        OperationCore {
            create,
            combine,
            deduct,
            finish: Arc::new(finish),
        }
    }
}

impl<A: 'static> CombiningBuilder<A, AccumulatorsByTag<A>> {
    /// Completes a tag-generic operation.
    pub fn and_finish<R: 'static>(
        self,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> AggregateOperation<A, R> {
        let core = Self::core(self.create, self.combine, self.deduct, finish);
        AggregateOperation::from_parts(core, self.slots)
    }
}

impl<A: 'static, T0: 'static> CombiningBuilder<A, (AccumulateItemFn<A, T0>,)> {
    /// Completes a single-input operation.
    pub fn and_finish<R: 'static>(
        self,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> AggregateOperation1<T0, A, R> {
        let core = Self::core(self.create, self.combine, self.deduct, finish);
        let (f0,) = self.slots;
        AggregateOperation1::from_parts(core, f0)
    }
}

impl<A: 'static, T0: 'static, T1: 'static>
    CombiningBuilder<A, (AccumulateItemFn<A, T0>, AccumulateItemFn<A, T1>)>
{
    /// Completes a two-input operation.
    pub fn and_finish<R: 'static>(
        self,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> AggregateOperation2<T0, T1, A, R> {
        let core = Self::core(self.create, self.combine, self.deduct, finish);
        let (f0, f1) = self.slots;
        AggregateOperation2::from_parts(core, f0, f1)
    }
}

impl<A: 'static, T0: 'static, T1: 'static, T2: 'static>
    CombiningBuilder<
        A,
        (
            AccumulateItemFn<A, T0>,
            AccumulateItemFn<A, T1>,
            AccumulateItemFn<A, T2>,
        ),
    >
{
    /// Completes a three-input operation.
    pub fn and_finish<R: 'static>(
        self,
        finish: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> AggregateOperation3<T0, T1, T2, A, R> {
        let core = Self::core(self.create, self.combine, self.deduct, finish);
        let (f0, f1, f2) = self.slots;
        AggregateOperation3::from_parts(core, f0, f1, f2)
    }
}
