//! Error types for the sponsorship hierarchy.

use crate::category::Category;
use crate::member::MemberId;
use thiserror::Error;

/// Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or mutating the hierarchy.
///
/// Structural errors abort the whole operation and leave previously
/// installed state untouched. Counter refusals are not errors; see
/// [`crate::AdjustOutcome`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// No member holds BFS level 0.
    #[error("no root member at BFS level 0")]
    MissingRoot,

    /// More than one member holds BFS level 0.
    #[error("multiple root members at BFS level 0: {members:?}")]
    MultipleRoots { members: Vec<MemberId> },

    /// A member's sponsor was not constructed one level above it.
    #[error("member {member} is orphaned (sponsor: {sponsor:?})")]
    OrphanedMember {
        member: MemberId,
        sponsor: Option<MemberId>,
    },

    /// Insert requested under a sponsor that is not indexed.
    #[error("unknown sponsor: {0}")]
    UnknownSponsor(MemberId),

    /// Operation on a member that is not indexed.
    #[error("unknown member: {0}")]
    UnknownMember(MemberId),

    /// A member identifier appeared twice.
    #[error("member already indexed: {0}")]
    DuplicateMember(MemberId),

    /// A bucket was requested past the next sequential index.
    #[error("{category} bucket {requested} requested but next allocatable index is {next}")]
    BucketGap {
        category: Category,
        requested: u32,
        next: u32,
    },

    /// The same bucket index was discovered twice for one category.
    #[error("duplicate {category} bucket at index {index}")]
    DuplicateBucket { category: Category, index: u32 },

    /// Propagation asked to count a personal sponsorship on a childless node.
    #[error("member {0} has no direct recruits to count")]
    NoDirectRecruits(MemberId),

    /// No invite use count advanced since the last observation.
    #[error("no consumed invite found for the latest join")]
    NoConsumedInvite,

    /// The hierarchy has not been built yet.
    #[error("hierarchy has not been built")]
    NotBuilt,

    /// The external attribute store failed.
    #[error("attribute store error: {0}")]
    Store(String),

    /// A failed write could not be undone; the store and the tree disagree
    /// until the next refresh.
    #[error("rollback failed after {cause}: {rollback}")]
    RollbackFailed { cause: String, rollback: String },
}
