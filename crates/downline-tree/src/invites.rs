//! Invite-code tracking used to resolve the sponsor of a new member.

use crate::error::{Error, Result};
use crate::member::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last observed state of one invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub code: String,
    /// Member who created the invite.
    pub sponsor: MemberId,
    pub uses: u32,
}

impl InviteRecord {
    pub fn new(code: impl Into<String>, sponsor: impl Into<MemberId>, uses: u32) -> Self {
        Self {
            code: code.into(),
            sponsor: sponsor.into(),
            uses,
        }
    }
}

/// Cache of invite use counts.
#[derive(Debug, Clone, Default)]
pub struct InviteTracker {
    invites: HashMap<String, InviteRecord>,
}

impl InviteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with a fresh snapshot.
    pub fn seed(&mut self, invites: impl IntoIterator<Item = InviteRecord>) {
        self.invites = invites
            .into_iter()
            .map(|invite| (invite.code.clone(), invite))
            .collect();
    }

    /// Record a newly created invite.
    pub fn observe(&mut self, invite: InviteRecord) {
        tracing::info!("Invite {} has been created", invite.code);
        self.invites.insert(invite.code.clone(), invite);
    }

    /// Find the invite consumed by the latest join.
    ///
    /// The first code in `current` whose use count is above the cached
    /// count wins; codes never seen before count from zero. The cache is
    /// not touched.
    pub fn find_consumed(&self, current: &[InviteRecord]) -> Result<MemberId> {
        current
            .iter()
            .find(|invite| {
                let cached = self.invites.get(&invite.code).map_or(0, |c| c.uses);
                invite.uses > cached
            })
            .map(|invite| invite.sponsor.clone())
            .ok_or(Error::NoConsumedInvite)
    }

    /// Update the cache with every record in `current`.
    pub fn absorb(&mut self, current: &[InviteRecord]) {
        for invite in current {
            self.invites.insert(invite.code.clone(), invite.clone());
        }
    }

    /// [`find_consumed`](Self::find_consumed), then [`absorb`](Self::absorb)
    /// `current` whatever the outcome.
    pub fn resolve_latest_join(&mut self, current: &[InviteRecord]) -> Result<MemberId> {
        let consumed = self.find_consumed(current);
        self.absorb(current);
        consumed
    }

    /// Every cached record, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &InviteRecord> {
        self.invites.values()
    }

    pub fn get(&self, code: &str) -> Option<&InviteRecord> {
        self.invites.get(code)
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_code_with_increased_uses() {
        let mut tracker = InviteTracker::new();
        tracker.seed(vec![
            InviteRecord::new("aaa", "alice", 2),
            InviteRecord::new("bbb", "bob", 0),
        ]);

        let sponsor = tracker
            .resolve_latest_join(&[
                InviteRecord::new("aaa", "alice", 2),
                InviteRecord::new("bbb", "bob", 1),
            ])
            .unwrap();

        assert_eq!(sponsor, MemberId::from("bob"));
        assert_eq!(tracker.get("bbb").unwrap().uses, 1);
    }

    #[test]
    fn unchanged_counts_resolve_nothing() {
        let mut tracker = InviteTracker::new();
        tracker.seed(vec![InviteRecord::new("aaa", "alice", 2)]);

        let err = tracker
            .resolve_latest_join(&[InviteRecord::new("aaa", "alice", 2)])
            .unwrap_err();
        assert_eq!(err, Error::NoConsumedInvite);
    }

    #[test]
    fn unseen_code_with_uses_counts() {
        let mut tracker = InviteTracker::new();
        let sponsor = tracker
            .resolve_latest_join(&[InviteRecord::new("new", "carol", 1)])
            .unwrap();
        assert_eq!(sponsor, MemberId::from("carol"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn observed_invite_starts_at_its_count() {
        let mut tracker = InviteTracker::new();
        tracker.observe(InviteRecord::new("ccc", "carol", 0));

        assert!(tracker
            .resolve_latest_join(&[InviteRecord::new("ccc", "carol", 0)])
            .is_err());
        let sponsor = tracker
            .resolve_latest_join(&[InviteRecord::new("ccc", "carol", 1)])
            .unwrap();
        assert_eq!(sponsor, MemberId::from("carol"));
    }

    #[test]
    fn find_consumed_leaves_cache_alone() {
        let mut tracker = InviteTracker::new();
        tracker.seed(vec![InviteRecord::new("aaa", "alice", 2)]);

        let current = [InviteRecord::new("aaa", "alice", 3)];
        assert_eq!(tracker.find_consumed(&current).unwrap(), MemberId::from("alice"));
        assert_eq!(tracker.get("aaa").unwrap().uses, 2);

        tracker.absorb(&current);
        assert_eq!(tracker.get("aaa").unwrap().uses, 3);
    }
}
