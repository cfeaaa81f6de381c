//! Error types for pipeline construction and compilation.

use crate::tag::TagKey;

use super::graph::{NodeId, PipelineId};

/// Contract violations raised while describing or compiling a pipeline.
///
/// All of these are synchronous and non-retriable: they abort construction
/// of the whole pipeline description.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An accumulator mapping has a different size than the operation's arity.
    #[error("{context}: expected {expected} accumulate functions for tags {expected_tags}, got {given}")]
    ArityMismatch {
        /// Operation or builder that raised the error.
        context: &'static str,
        /// Declared arity.
        expected: usize,
        /// Number of entries supplied.
        given: usize,
        /// The tag set the operation requires.
        expected_tags: String,
    },

    /// An accumulator mapping omits a required tag.
    #[error("{context}: no accumulate function for {tag}, expected tags {expected_tags}")]
    MissingTag {
        /// Operation or builder that raised the error.
        context: &'static str,
        /// The tag without an entry.
        tag: TagKey,
        /// The tag set the operation requires.
        expected_tags: String,
    },

    /// A tag minted by another builder was presented.
    #[error("{context}: {tag} was not minted here, expected tags {expected_tags}")]
    ForeignTag {
        /// Operation or builder that raised the error.
        context: &'static str,
        /// The foreign tag.
        tag: TagKey,
        /// The tag set the operation requires.
        expected_tags: String,
    },

    /// A clause references a stage owned by a different pipeline.
    #[error("{context}: stage belongs to pipeline {found}, expected pipeline {expected}")]
    CrossGraphReference {
        /// Builder that raised the error.
        context: &'static str,
        /// Pipeline of the primary stage.
        expected: PipelineId,
        /// Pipeline of the offending stage.
        found: PipelineId,
    },

    /// A node id does not exist in the pipeline.
    #[error("stage not found: {0}")]
    StageNotFound(NodeId),

    /// The pipeline has no stages.
    #[error("empty pipeline: no stages")]
    EmptyPipeline,

    /// A node exceeds the configured fan-out limit.
    #[error("fan-out limit exceeded: stage {node} has {count} downstream stages (max {max})")]
    FanOutLimitExceeded {
        /// Stage name.
        node: String,
        /// Actual fan-out.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A non-sink stage is never drained.
    #[error("dangling stage: {0} has no downstream stage")]
    DanglingStage(String),

    /// The graph contains a cycle involving the named stage.
    #[error("cycle detected involving stage: {0}")]
    CycleDetected(String),

    /// `deduct` was invoked on a forward-only operation.
    #[error("aggregate operation has no deduct function")]
    DeductUnsupported,
}
