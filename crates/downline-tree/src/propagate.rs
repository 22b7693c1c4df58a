//! Upward counter propagation after a recruit is attached.

use crate::category::{Category, CategoryIndex};
use crate::error::{Error, Result};
use crate::member::MemberId;
use crate::store::AttributeStore;
use crate::tree::{HierarchyTree, NodeId};
use serde::Serialize;

/// A single bucket reassignment: `member` moves from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketMove {
    pub member: MemberId,
    pub category: Category,
    pub from: u32,
    pub to: u32,
}

impl BucketMove {
    /// Remove the old bucket and add the new one in the store.
    ///
    /// If adding the new bucket fails the old one is put back, so the
    /// member holds exactly one of the two afterwards.
    pub fn apply<S: AttributeStore + ?Sized>(
        &self,
        categories: &mut CategoryIndex,
        store: &mut S,
    ) -> Result<()> {
        let old = categories.get_or_create(store, self.category, self.from)?;
        let new = categories.get_or_create(store, self.category, self.to)?;
        store.unassign_bucket(&self.member, &old)?;
        if let Err(e) = store.assign_bucket(&self.member, &new) {
            return match store.assign_bucket(&self.member, &old) {
                Ok(()) => Err(e),
                Err(undo) => Err(Error::RollbackFailed {
                    cause: e.to_string(),
                    rollback: undo.to_string(),
                }),
            };
        }
        Ok(())
    }

    /// The move that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            member: self.member.clone(),
            category: self.category,
            from: self.to,
            to: self.from,
        }
    }
}

/// Apply `moves` in order. On failure the moves already applied are undone
/// in reverse order before the error is returned.
pub(crate) fn apply_all<S: AttributeStore + ?Sized>(
    moves: &[BucketMove],
    categories: &mut CategoryIndex,
    store: &mut S,
) -> Result<()> {
    for (applied, bucket_move) in moves.iter().enumerate() {
        let e = match bucket_move.apply(categories, store) {
            Ok(()) => continue,
            Err(e @ Error::RollbackFailed { .. }) => return Err(e),
            Err(e) => e,
        };

        for done in moves[..applied].iter().rev() {
            if let Err(undo) = done.inverse().apply(categories, store) {
                tracing::error!("Could not undo {:?}: {}", done, undo);
                return Err(Error::RollbackFailed {
                    cause: e.to_string(),
                    rollback: undo.to_string(),
                });
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Walk from `start` to the root, bumping every downline by one.
///
/// Only `start` has its personal-sponsorship bucket moved, and only when
/// `count_personal` is set: that count moves from `children - 1` to
/// `children`. Every move is applied to the store before any in-memory
/// counter changes. A store failure undoes the moves already applied and
/// leaves the tree counters as they were.
pub fn propagate_counters<S: AttributeStore + ?Sized>(
    tree: &mut HierarchyTree,
    categories: &mut CategoryIndex,
    store: &mut S,
    start: NodeId,
    count_personal: bool,
) -> Result<Vec<BucketMove>> {
    let chain: Vec<NodeId> = tree.ancestors(start).collect();
    let mut moves = Vec::with_capacity(chain.len() + 1);

    for (position, &id) in chain.iter().enumerate() {
        let node = tree.node(id);
        moves.push(BucketMove {
            member: node.member.clone(),
            category: Category::Downline,
            from: node.downline,
            to: node.downline + 1,
        });

        if position == 0 && count_personal {
            let sponsored = node.personally_sponsored();
            let previous = sponsored
                .checked_sub(1)
                .ok_or_else(|| Error::NoDirectRecruits(node.member.clone()))?;
            moves.push(BucketMove {
                member: node.member.clone(),
                category: Category::PersonallySponsored,
                from: previous,
                to: sponsored,
            });
        }
    }

    apply_all(&moves, categories, store)?;

    for id in chain {
        tree.node_mut(id).downline += 1;
    }

    tracing::debug!(
        "Propagated {} bucket moves from {}",
        moves.len(),
        tree.node(start).member
    );
    Ok(moves)
}
