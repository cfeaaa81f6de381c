//! Stock aggregate operations.

use std::fmt;
use std::sync::Arc;

use crate::bag::BagsByTag;
use crate::tag::{Tag, TagKey};
use crate::Element;

use super::{AggregateOperation, AggregateOperation1, AccumulatorsByTag, OperationCore};

/// Counts input items. Supports deduct.
#[must_use]
pub fn counting<T: 'static>() -> AggregateOperation1<T, i64, i64> {
    AggregateOperation1::new(
        || 0_i64,
        |acc: &mut i64, _: &T| *acc += 1,
        |a: &mut i64, b: &i64| *a += b,
        |a: &i64| *a,
    )
    .with_deduct(|a: &mut i64, b: &i64| *a -= b)
}

/// Sums `value(item)` over all input items. Supports deduct.
#[must_use]
pub fn summing_i64<T: 'static>(
    value: impl Fn(&T) -> i64 + Send + Sync + 'static,
) -> AggregateOperation1<T, i64, i64> {
    AggregateOperation1::new(
        || 0_i64,
        move |acc: &mut i64, item: &T| *acc += value(item),
        |a: &mut i64, b: &i64| *a += b,
        |a: &i64| *a,
    )
    .with_deduct(|a: &mut i64, b: &i64| *a -= b)
}

/// Collects input items into a list, in arrival order.
#[must_use]
pub fn to_list<T: Element>() -> AggregateOperation1<T, Vec<T>, Vec<T>> {
    AggregateOperation1::new(
        Vec::new,
        |acc: &mut Vec<T>, item: &T| acc.push(item.clone()),
        |a: &mut Vec<T>, b: &Vec<T>| a.extend(b.iter().cloned()),
        Vec::clone,
    )
}

/// Starts a [`ToBags`] operation.
#[must_use]
pub fn to_bags() -> ToBags {
    ToBags::default()
}

type BagInit = Arc<dyn Fn(&mut BagsByTag) + Send + Sync>;

/// Builds the operation that sorts every input into a [`BagsByTag`] under
/// its own tag.
///
/// Each registered tag gets an empty bag when the accumulator is created, so
/// a key that only occurs on some inputs still reads an empty bag, not an
/// absent one, for the others.
#[derive(Default)]
pub struct ToBags {
    initializers: Vec<BagInit>,
    accumulators: AccumulatorsByTag<BagsByTag>,
}

impl ToBags {
    /// Adds an input addressed by `tag`.
    #[must_use]
    pub fn with_tag<E: Element>(mut self, tag: Tag<E>) -> Self {
        self.initializers.push(Arc::new(move |bags: &mut BagsByTag| {
            bags.ensure_bag(tag);
        }));
        self.accumulators
            .insert(tag, move |bags: &mut BagsByTag, item: &E| {
                bags.ensure_bag(tag).push(item.clone());
            });
        self
    }

    /// Tags registered so far.
    pub fn tags(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.accumulators.tags()
    }

    /// Completes the operation. Its result is the accumulated bags.
    #[must_use]
    pub fn build(self) -> AggregateOperation<BagsByTag, BagsByTag> {
        let initializers = self.initializers;
        let core = OperationCore {
            create: Arc::new(move || {
                let mut bags = BagsByTag::new();
                for init in &initializers {
                    init(&mut bags);
                }
                bags
            }),
            combine: Arc::new(BagsByTag::combine_with),
            deduct: None,
            finish: Arc::new(BagsByTag::clone),
        };
        AggregateOperation::from_parts(core, self.accumulators)
    }
}

impl fmt::Debug for ToBags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToBags")
            .field("tags", &self.accumulators)
            .finish()
    }
}
