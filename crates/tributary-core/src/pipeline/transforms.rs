//! Single-input transforms.
//!
//! Each function returns a [`UnaryTransform`] to be attached with
//! [`Stage::apply`](super::Stage::apply). The `Stage` shortcuts (`map`,
//! `filter`, `flat_map`, `group_by`) call these.

use std::hash::Hash;

use fxhash::FxHashMap;

use crate::aggregate::{Aggregate, AggregateOperation1};
use crate::Element;

use super::transform::{TransformKind, UnaryTransform};

/// One output per input element.
pub fn map<I: Element, O: Element>(
    f: impl Fn(&I) -> O + Send + Sync + 'static,
) -> UnaryTransform<I, O> {
    UnaryTransform::new(TransformKind::Map, move |items: &[I]| {
        items.iter().map(&f).collect()
    })
}

/// Keeps the elements for which `predicate` holds.
pub fn filter<T: Element>(
    predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
) -> UnaryTransform<T, T> {
    UnaryTransform::new(TransformKind::Filter, move |items: &[T]| {
        items.iter().filter(|item| predicate(item)).cloned().collect()
    })
}

/// Zero or more outputs per input element.
pub fn flat_map<I: Element, O: Element, It: IntoIterator<Item = O>>(
    f: impl Fn(&I) -> It + Send + Sync + 'static,
) -> UnaryTransform<I, O> {
    UnaryTransform::new(TransformKind::FlatMap, move |items: &[I]| {
        items.iter().flat_map(&f).collect()
    })
}

/// Groups elements by `key` and aggregates each group with `op`.
///
/// Emits one `(key, result)` pair per distinct key, in order of first
/// appearance.
pub fn group_by<I, K, A, R>(
    key: impl Fn(&I) -> K + Send + Sync + 'static,
    op: AggregateOperation1<I, A, R>,
) -> UnaryTransform<I, (K, R)>
where
    I: Element,
    K: Element + Hash + Eq,
    A: 'static,
    R: Element,
{
    UnaryTransform::new(TransformKind::GroupBy, move |items: &[I]| {
        let mut index: FxHashMap<K, usize> = FxHashMap::default();
        let mut groups: Vec<(K, A)> = Vec::new();
        for item in items {
            let k = key(item);
            let slot = match index.get(&k) {
                Some(&slot) => slot,
                None => {
                    groups.push((k.clone(), op.create_accumulator()));
                    index.insert(k, groups.len() - 1);
                    groups.len() - 1
                }
            };
            op.accumulate(&mut groups[slot].1, item);
        }
        groups
            .into_iter()
            .map(|(k, acc)| (k, op.finish(&acc)))
            .collect()
    })
}
