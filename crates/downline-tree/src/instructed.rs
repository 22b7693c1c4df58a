//! Single-member adjustment of the Instructed counter.

use crate::category::{Category, CategoryIndex};
use crate::error::{Error, Result};
use crate::member::MemberId;
use crate::propagate::BucketMove;
use crate::store::AttributeStore;
use crate::tree::HierarchyTree;
use serde::Serialize;
use std::fmt;

/// Direction of an Instructed adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Increment,
    Decrement,
}

/// Why an adjustment was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Refusal {
    /// Increment requested while the counter is below 1.
    IncrementNotPermitted,
    /// Decrement requested while the counter is below 1.
    NothingToDecrement,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::IncrementNotPermitted => {
                f.write_str("You do not have permission to increment instructed!")
            }
            Refusal::NothingToDecrement => {
                f.write_str("You do not have any instructed to decrement!")
            }
        }
    }
}

/// Result of an adjustment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdjustOutcome {
    Applied { previous: u32, current: u32 },
    Refused { reason: Refusal },
}

/// Move a member's Instructed value up or down by one.
///
/// Both directions require the current value to be at least 1. A refused
/// request touches neither the store nor the tree.
pub fn adjust_instructed<S: AttributeStore + ?Sized>(
    tree: &mut HierarchyTree,
    categories: &mut CategoryIndex,
    store: &mut S,
    member: &MemberId,
    adjustment: Adjustment,
) -> Result<AdjustOutcome> {
    let id = tree
        .find(member)
        .ok_or_else(|| Error::UnknownMember(member.clone()))?;
    let previous = tree.node(id).instructed;

    if previous < 1 {
        let reason = match adjustment {
            Adjustment::Increment => Refusal::IncrementNotPermitted,
            Adjustment::Decrement => Refusal::NothingToDecrement,
        };
        tracing::warn!("Refused {:?} of instructed for {}: {}", adjustment, member, reason);
        return Ok(AdjustOutcome::Refused { reason });
    }

    let current = match adjustment {
        Adjustment::Increment => previous + 1,
        Adjustment::Decrement => previous - 1,
    };

    BucketMove {
        member: member.clone(),
        category: Category::Instructed,
        from: previous,
        to: current,
    }
    .apply(categories, store)?;

    tree.node_mut(id).instructed = current;
    tracing::info!("Instructed for {} moved from {} to {}", member, previous, current);
    Ok(AdjustOutcome::Applied { previous, current })
}
