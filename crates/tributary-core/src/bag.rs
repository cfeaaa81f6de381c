//! Tagged bag container.
//!
//! [`BagsByTag`] maps each [`Tag`] to one bag (a `Vec`) of elements of the
//! tag's witness type. It is the default result shape of the join builder
//! and the default accumulator of the tag-generic co-group.
//!
//! `combine_with` is a per-tag union: bags under the same tag are
//! concatenated, bags present on one side only are copied over. The result
//! is independent of merge order at the multiset level, so partial results
//! may be merged in whatever order they arrive.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use crate::tag::{Tag, TagKey};
use crate::Element;

/// Errors raised when reading a [`BagsByTag`].
#[derive(Debug, thiserror::Error)]
pub enum BagError {
    /// No bag was ever stored under the tag.
    #[error("no bag for tag {0}")]
    NoBagForTag(TagKey),
}

/// Object-safe view of a `Vec<E>` stored under a tag.
pub(crate) trait AnyBag: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Appends clones of `other`'s elements. `other` must hold the same
    /// element type; a mismatched bag is ignored.
    fn extend_from(&mut self, other: &dyn AnyBag);

    fn clone_box(&self) -> Box<dyn AnyBag>;

    fn len(&self) -> usize;
}

impl<E: Element> AnyBag for Vec<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn extend_from(&mut self, other: &dyn AnyBag) {
        if let Some(other) = other.as_any().downcast_ref::<Vec<E>>() {
            self.extend(other.iter().cloned());
        }
    }

    fn clone_box(&self) -> Box<dyn AnyBag> {
        Box::new(self.clone())
    }

    fn len(&self) -> usize {
        self.len()
    }
}

/// Mapping from tag to a bag of elements, at most one bag per tag.
#[derive(Default)]
pub struct BagsByTag {
    bags: BTreeMap<TagKey, Box<dyn AnyBag>>,
}

impl BagsByTag {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bag stored under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`BagError::NoBagForTag`] if nothing was stored under `tag`.
    pub fn bag<E: Element>(&self, tag: Tag<E>) -> Result<&[E], BagError> {
        self.bags
            .get(&tag.key())
            .and_then(|bag| bag.as_any().downcast_ref::<Vec<E>>())
            .map(Vec::as_slice)
            .ok_or(BagError::NoBagForTag(tag.key()))
    }

    /// Stores `bag` under `tag`, replacing any previous bag.
    pub fn put<E: Element>(&mut self, tag: Tag<E>, bag: Vec<E>) {
        self.bags.insert(tag.key(), Box::new(bag));
    }

    /// Returns the bag under `tag`, creating an empty one on first use.
    pub fn ensure_bag<E: Element>(&mut self, tag: Tag<E>) -> &mut Vec<E> {
        self.bags
            .entry(tag.key())
            .or_insert_with(|| Box::new(Vec::<E>::new()))
            .as_any_mut()
            .downcast_mut::<Vec<E>>()
            .expect("bag type is fixed by the tag's witness type")
    }

    /// Removes and returns the bag under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`BagError::NoBagForTag`] if nothing was stored under `tag`.
    pub fn take<E: Element>(&mut self, tag: Tag<E>) -> Result<Vec<E>, BagError> {
        let key = tag.key();
        self.bags
            .remove(&key)
            .and_then(|bag| bag.into_any().downcast::<Vec<E>>().ok())
            .map(|bag| *bag)
            .ok_or(BagError::NoBagForTag(key))
    }

    /// Merges `other` into `self`, tag by tag.
    pub fn combine_with(&mut self, other: &BagsByTag) {
        for (key, bag) in &other.bags {
            match self.bags.get_mut(key) {
                Some(existing) => existing.extend_from(bag.as_ref()),
                None => {
                    self.bags.insert(*key, bag.clone_box());
                }
            }
        }
    }

    /// Returns `true` if a bag is stored under `tag`.
    #[must_use]
    pub fn contains<E>(&self, tag: Tag<E>) -> bool {
        self.bags.contains_key(&tag.key())
    }

    /// Tags with a bag, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = TagKey> + '_ {
        self.bags.keys().copied()
    }

    /// Number of tags with a bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    /// Returns `true` if no bag is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    pub(crate) fn put_erased(&mut self, key: TagKey, bag: Box<dyn AnyBag>) {
        self.bags.insert(key, bag);
    }
}

impl Clone for BagsByTag {
    fn clone(&self) -> Self {
        Self {
            bags: self
                .bags
                .iter()
                .map(|(key, bag)| (*key, bag.clone_box()))
                .collect(),
        }
    }
}

impl fmt::Debug for BagsByTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, bag) in &self.bags {
            map.entry(&format_args!("{key}"), &format_args!("{} element(s)", bag.len()));
        }
        map.finish()
    }
}
