//! Downline Sponsorship Tree
//!
//! In-memory model of a referral hierarchy whose durable state lives in an
//! external attribute store as per-member category buckets.
//!
//! # Model
//!
//! Every member has a sponsor, except the single root at BFS level 0. For
//! each member four counters are tracked as buckets:
//! - **BFS**: depth from the root
//! - **Downline**: transitive recruits
//! - **Personally Sponsored**: direct recruits
//! - **Instructed**: an independently adjusted counter
//!
//! # Operations
//!
//! - [`HierarchyTree::rebuild`] reconstructs the tree level by level from
//!   flat member records.
//! - [`HierarchyTree::insert`] attaches one recruit under its sponsor.
//! - [`propagate_counters`] walks from the sponsor to the root: every
//!   ancestor's downline moves up by one, only the sponsor's personal count
//!   moves.
//! - [`adjust_instructed`] moves one member's Instructed value by one.
//!
//! [`Registry`] ties these together with the store, the [`CategoryIndex`]
//! and the [`InviteTracker`].
//!
//! # Example
//!
//! ```
//! use downline_tree::{MemoryStore, Registry};
//!
//! let mut store = MemoryStore::new();
//! store.add_member("owner", "Owner");
//! store.add_member("ada", "Ada");
//!
//! let mut registry = Registry::new(store);
//! registry.seed_root(&"owner".into()).unwrap();
//! registry.place("ada".into(), "Ada", "owner".into()).unwrap();
//!
//! let tree = registry.tree().unwrap();
//! assert_eq!(tree.root().downline, 1);
//! assert_eq!(tree.get(&"ada".into()).unwrap().level, 1);
//! ```

mod category;
mod error;
mod instructed;
mod invites;
mod member;
mod memory;
mod propagate;
mod registry;
mod snapshot;
mod store;
mod tree;

pub use category::{BucketHandle, Category, CategoryIndex};
pub use error::{Error, Result};
pub use instructed::{adjust_instructed, AdjustOutcome, Adjustment, Refusal};
pub use invites::{InviteRecord, InviteTracker};
pub use member::{MemberId, MemberRecord};
pub use memory::MemoryStore;
pub use propagate::{propagate_counters, BucketMove};
pub use registry::{Placement, RefreshSummary, Registry};
pub use snapshot::{
    render_outline, Leaderboard, LeaderboardRow, MemberRef, NodeSnapshot, TreeSnapshot,
};
pub use store::AttributeStore;
pub use tree::{Ancestors, HierarchyNode, HierarchyTree, Inconsistency, NodeId};

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Each entry picks a sponsor among the members placed so far.
    fn sponsor_picks() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(any::<usize>(), 0..40)
    }

    fn grow(picks: &[usize]) -> Registry<MemoryStore> {
        let mut store = MemoryStore::new();
        store.add_member("m0", "M0");
        let mut registry = Registry::new(store);
        registry.seed_root(&"m0".into()).unwrap();

        for (i, pick) in picks.iter().enumerate() {
            let member = format!("m{}", i + 1);
            let sponsor = format!("m{}", pick % (i + 1));
            registry.store_mut().add_member(member.as_str(), member.to_uppercase());
            registry
                .place(member.as_str().into(), &member.to_uppercase(), sponsor.into())
                .unwrap();
        }
        registry
    }

    proptest! {
        #[test]
        fn incremental_growth_keeps_invariants(picks in sponsor_picks()) {
            let registry = grow(&picks);
            let tree = registry.tree().unwrap();

            prop_assert_eq!(tree.len(), picks.len() + 1);
            prop_assert!(tree.check_invariants().is_empty());
            for (id, node) in tree.iter() {
                prop_assert_eq!(node.downline, tree.subtree_size(id));
                if let Some(parent) = node.parent() {
                    prop_assert_eq!(node.level, tree.node(parent).level + 1);
                }
            }
        }

        #[test]
        fn store_buckets_match_tree_counters(picks in sponsor_picks()) {
            let registry = grow(&picks);
            let tree = registry.tree().unwrap();

            for (_, node) in tree.iter() {
                let counted = [Category::Bfs, Category::Downline, Category::PersonallySponsored];
                for category in counted {
                    prop_assert_eq!(
                        registry.store().values(&node.member, category),
                        vec![node.value(category)]
                    );
                }
            }
        }

        #[test]
        fn refresh_reproduces_incremental_tree(picks in sponsor_picks()) {
            let mut registry = grow(&picks);
            let incremental = registry.snapshot().unwrap();

            registry.refresh(None).unwrap();
            let rebuilt = registry.snapshot().unwrap();
            registry.refresh(None).unwrap();

            prop_assert_eq!(&incremental.nodes.len(), &rebuilt.nodes.len());
            for node in &incremental.nodes {
                let other = rebuilt.get(&node.id).unwrap();
                prop_assert_eq!(node.level, other.level);
                prop_assert_eq!(node.downline, other.downline);
                prop_assert_eq!(node.personally_sponsored, other.personally_sponsored);
                prop_assert_eq!(&node.sponsor, &other.sponsor);
            }
            prop_assert_eq!(registry.snapshot().unwrap(), rebuilt);
        }
    }
}
