//! Typed identity tokens for multi-input constructs.
//!
//! A [`Tag`] addresses one participant among several in a join, a co-group
//! or a tag-generic aggregate operation. Tags are minted by builders in
//! strict insertion order starting at index 0 (the primary input), are
//! immutable afterwards, and are totally ordered by index. Every tag-keyed
//! structure in this crate iterates in that order, which keeps the positional
//! clause list of a compiled node aligned with the tags embedded in its
//! tagged results.
//!
//! Two tags are equal only when they denote the same slot of the same minting
//! scope. Builders each get a unique [`TagOwner`]; the fixed-arity aggregate
//! operations share the [`TagOwner::Positional`] scope (`tag0`, `tag1`, `tag2`).

use std::any::{type_name, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Scope that minted a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagOwner {
    /// Shared positional scope used by the fixed-arity operations.
    Positional,
    /// A single builder instance.
    Builder(u64),
}

impl TagOwner {
    /// Allocates a fresh, process-unique builder scope.
    pub(crate) fn unique() -> Self {
        Self::Builder(NEXT_OWNER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for TagOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional => write!(f, "positional"),
            Self::Builder(id) => write!(f, "builder#{id}"),
        }
    }
}

/// Type-erased identity of a [`Tag`].
///
/// Carries the witness type so that erased containers can refuse to hand
/// out a value under the wrong type. Equality, hashing and ordering ignore
/// the type name, which is kept for diagnostics only.
#[derive(Clone, Copy)]
pub struct TagKey {
    index: usize,
    owner: TagOwner,
    type_id: TypeId,
    type_name: &'static str,
}

impl TagKey {
    fn of<T: 'static>(index: usize, owner: TagOwner) -> Self {
        Self {
            index,
            owner,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Insertion index of the tag.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Scope that minted the tag.
    #[must_use]
    pub fn owner(&self) -> TagOwner {
        self.owner
    }

    /// Name of the witness type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for TagKey {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.owner == other.owner && self.type_id == other.type_id
    }
}

impl Eq for TagKey {}

impl Hash for TagKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.owner.hash(state);
        self.type_id.hash(state);
    }
}

impl PartialOrd for TagKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.owner.cmp(&other.owner))
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagKey")
            .field("index", &self.index)
            .field("owner", &self.owner)
            .field("type", &self.type_name)
            .finish()
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag{}@{}", self.index, self.owner)
    }
}

/// Ordered, typed identity token.
///
/// `T` is the element type of the participant the tag addresses. A tag is
/// `Copy` and is only ever referenced, never owned, by the structures that
/// use it to recover typed values.
pub struct Tag<T> {
    key: TagKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Tag<T> {
    /// Positional tag for slot 0 (the primary input of fixed-arity forms).
    #[must_use]
    pub fn tag0() -> Self {
        Self::positional(0)
    }

    /// Positional tag for slot 1.
    #[must_use]
    pub fn tag1() -> Self {
        Self::positional(1)
    }

    /// Positional tag for slot 2.
    #[must_use]
    pub fn tag2() -> Self {
        Self::positional(2)
    }

    /// Positional tag for an arbitrary slot.
    #[must_use]
    pub fn positional(index: usize) -> Self {
        Self::minted(index, TagOwner::Positional)
    }

    pub(crate) fn minted(index: usize, owner: TagOwner) -> Self {
        Self {
            key: TagKey::of::<T>(index, owner),
            _marker: PhantomData,
        }
    }
}

impl<T> Tag<T> {
    /// Insertion index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.key.index
    }

    /// Type-erased identity.
    #[must_use]
    pub fn key(&self) -> TagKey {
        self.key
    }

    /// Scope that minted this tag.
    #[must_use]
    pub fn owner(&self) -> TagOwner {
        self.key.owner
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Tag<T> {}

impl<T> PartialEq for Tag<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Tag<T> {}

impl<T> Hash for Tag<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> PartialOrd for Tag<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Tag<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag<{}>({})", self.key.type_name, self.key)
    }
}

impl<T> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

/// Mints tags for one builder in strict insertion order.
#[derive(Debug)]
pub(crate) struct TagMinter {
    owner: TagOwner,
    next: usize,
}

impl TagMinter {
    pub(crate) fn new(owner: TagOwner) -> Self {
        Self { owner, next: 0 }
    }

    pub(crate) fn mint<T: 'static>(&mut self) -> Tag<T> {
        let tag = Tag::minted(self.next, self.owner);
        self.next += 1;
        tag
    }
}

/// Renders a tag set for diagnostics, e.g. `[tag0@builder#3, tag1@builder#3]`.
pub(crate) fn describe<'a>(tags: impl IntoIterator<Item = &'a TagKey>) -> String {
    let rendered: Vec<String> = tags.into_iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minter_assigns_insertion_order() {
        let mut minter = TagMinter::new(TagOwner::unique());
        let a: Tag<i32> = minter.mint();
        let b: Tag<String> = minter.mint();
        let c: Tag<u8> = minter.mint();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);

        let mut keys = vec![c.key(), a.key(), b.key()];
        keys.sort();
        assert_eq!(keys, vec![a.key(), b.key(), c.key()]);
    }

    #[test]
    fn test_tags_from_different_builders_differ() {
        let mut left = TagMinter::new(TagOwner::unique());
        let mut right = TagMinter::new(TagOwner::unique());
        let a: Tag<i32> = left.mint();
        let b: Tag<i32> = right.mint();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
    }

    #[test]
    fn test_positional_tags_are_stable() {
        assert_eq!(Tag::<i32>::tag1(), Tag::<i32>::positional(1));
        assert!(Tag::<i32>::tag0() < Tag::<i32>::tag1());
        assert_eq!(Tag::<i32>::tag2().owner(), TagOwner::Positional);
    }

    #[test]
    fn test_key_carries_witness_type() {
        let a = Tag::<i32>::tag0().key();
        let b = Tag::<i64>::tag0().key();
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
        assert_eq!(a.type_name(), "i32");
    }

    #[test]
    fn test_describe_tag_set() {
        let keys = [Tag::<i32>::tag0().key(), Tag::<i32>::tag1().key()];
        assert_eq!(describe(&keys), "[tag0@positional, tag1@positional]");
    }
}
