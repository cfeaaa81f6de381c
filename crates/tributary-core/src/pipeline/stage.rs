//! Typed stage handles.
//!
//! A [`Stage<T>`] names one node of a [`Pipeline`] whose output elements are
//! of type `T`. It holds no data. Every operation creates a new node whose
//! upstream list points at existing stages, and returns a handle to it.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::aggregate::{AggregateOperation1, AggregateOperation2, AggregateOperation3};
use crate::bag::BagsByTag;
use crate::Element;

use super::cogroup::CoGroupBuilder;
use super::connector::Sink;
use super::error::PipelineError;
use super::graph::{NodeId, Pipeline};
use super::join::{JoinBuilder, JoinOn};
use super::transform::UnaryTransform;
use super::transforms;

/// Handle to a node producing elements of type `T`.
pub struct Stage<T> {
    pipeline: Pipeline,
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Stage<T> {
    pub(crate) fn new(pipeline: Pipeline, id: NodeId) -> Self {
        Self {
            pipeline,
            id,
            _marker: PhantomData,
        }
    }

    /// Node behind this stage.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Pipeline owning this stage.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl<T: Element> Stage<T> {
    /// Attaches a single-input transform.
    pub fn apply<O: Element>(&self, transform: UnaryTransform<T, O>) -> Stage<O> {
        let id = self
            .pipeline
            .add_node(&[self.id], transform.into_transform());
        Stage::new(self.pipeline.clone(), id)
    }

    /// Maps every element through `f`.
    pub fn map<O: Element>(&self, f: impl Fn(&T) -> O + Send + Sync + 'static) -> Stage<O> {
        self.apply(transforms::map(f))
    }

    /// Keeps the elements matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Stage<T> {
        self.apply(transforms::filter(predicate))
    }

    /// Maps every element to zero or more outputs.
    pub fn flat_map<O: Element, It: IntoIterator<Item = O>>(
        &self,
        f: impl Fn(&T) -> It + Send + Sync + 'static,
    ) -> Stage<O> {
        self.apply(transforms::flat_map(f))
    }

    /// Groups by `key` and aggregates each group with `op`.
    pub fn group_by<K, A, R>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        op: AggregateOperation1<T, A, R>,
    ) -> Stage<(K, R)>
    where
        K: Element + Hash + Eq,
        A: 'static,
        R: Element,
    {
        self.apply(transforms::group_by(key, op))
    }

    /// Starts a multi-way hash join with this stage as the primary input.
    #[must_use]
    pub fn join_builder(&self) -> JoinBuilder<T> {
        JoinBuilder::new(self.clone())
    }

    /// Left-outer hash join with one secondary stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if `s1` belongs to
    /// another pipeline.
    pub fn join<K, E1>(
        &self,
        s1: &Stage<E1>,
        on1: JoinOn<K, T, E1>,
    ) -> Result<Stage<(T, Vec<E1>)>, PipelineError>
    where
        K: Hash + Eq + Send + Sync + 'static,
        E1: Element,
    {
        let mut builder = JoinBuilder::positional(self.clone());
        let tag1 = builder.add(s1, on1);
        builder.build_with("Stage::join", move |item: &T, mut bags: BagsByTag| {
            (item.clone(), bags.take(tag1).unwrap_or_default())
        })
    }

    /// Left-outer hash join with two secondary stages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if a secondary stage
    /// belongs to another pipeline.
    pub fn join2<K1, E1, K2, E2>(
        &self,
        s1: &Stage<E1>,
        on1: JoinOn<K1, T, E1>,
        s2: &Stage<E2>,
        on2: JoinOn<K2, T, E2>,
    ) -> Result<Stage<(T, Vec<E1>, Vec<E2>)>, PipelineError>
    where
        K1: Hash + Eq + Send + Sync + 'static,
        E1: Element,
        K2: Hash + Eq + Send + Sync + 'static,
        E2: Element,
    {
        let mut builder = JoinBuilder::positional(self.clone());
        let tag1 = builder.add(s1, on1);
        let tag2 = builder.add(s2, on2);
        builder.build_with("Stage::join2", move |item: &T, mut bags: BagsByTag| {
            (
                item.clone(),
                bags.take(tag1).unwrap_or_default(),
                bags.take(tag2).unwrap_or_default(),
            )
        })
    }

    /// Starts a multi-way co-group with this stage as the primary input,
    /// grouped by `key`.
    pub fn co_group_builder<K: Element + Hash + Eq>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> CoGroupBuilder<K, T> {
        CoGroupBuilder::new(self.clone(), key)
    }

    /// Two-way co-group. Emits one `(key, result)` per key occurring in
    /// either input.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if `s1` belongs to
    /// another pipeline.
    pub fn co_group<K, T1, A, R>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        s1: &Stage<T1>,
        key1: impl Fn(&T1) -> K + Send + Sync + 'static,
        op: AggregateOperation2<T, T1, A, R>,
    ) -> Result<Stage<(K, R)>, PipelineError>
    where
        K: Element + Hash + Eq,
        T1: Element,
        A: 'static,
        R: Element,
    {
        let mut builder = CoGroupBuilder::positional(self.clone(), key);
        builder.add(s1, key1);
        builder.build_in("Stage::co_group", op.to_tagged())
    }

    /// Three-way co-group. Emits one `(key, result)` per key occurring in
    /// any input.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CrossGraphReference`] if a secondary stage
    /// belongs to another pipeline.
    pub fn co_group2<K, T1, T2, A, R>(
        &self,
        key: impl Fn(&T) -> K + Send + Sync + 'static,
        s1: &Stage<T1>,
        key1: impl Fn(&T1) -> K + Send + Sync + 'static,
        s2: &Stage<T2>,
        key2: impl Fn(&T2) -> K + Send + Sync + 'static,
        op: AggregateOperation3<T, T1, T2, A, R>,
    ) -> Result<Stage<(K, R)>, PipelineError>
    where
        K: Element + Hash + Eq,
        T1: Element,
        T2: Element,
        A: 'static,
        R: Element,
    {
        let mut builder = CoGroupBuilder::positional(self.clone(), key);
        builder.add(s1, key1);
        builder.add(s2, key2);
        builder.build_in("Stage::co_group2", op.to_tagged())
    }

    /// Drains this stage into `sink`, creating a terminal node.
    pub fn drain_to(&self, sink: Sink<T>) -> SinkStage {
        let id = self.pipeline.add_node(&[self.id], sink.into_transform());
        SinkStage {
            pipeline: self.pipeline.clone(),
            id,
        }
    }
}

impl<T> Clone for Stage<T> {
    fn clone(&self) -> Self {
        Self::new(self.pipeline.clone(), self.id)
    }
}

impl<T> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("pipeline", &self.pipeline.id())
            .field("id", &self.id)
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

/// Handle to a sink node. No transform can follow it.
#[derive(Clone)]
pub struct SinkStage {
    pipeline: Pipeline,
    id: NodeId,
}

impl SinkStage {
    /// Node behind this sink.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Pipeline owning this sink.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl fmt::Debug for SinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkStage")
            .field("pipeline", &self.pipeline.id())
            .field("id", &self.id)
            .finish()
    }
}
