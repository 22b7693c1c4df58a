//! Process-scoped hierarchy state.
//!
//! [`Registry`] owns the attribute store, the tree, the category index and
//! the invite cache. Every public method is one top-level operation; hosts
//! that receive events concurrently wrap the registry in a single lock.

use crate::category::{BucketHandle, Category, CategoryIndex};
use crate::error::{Error, Result};
use crate::instructed::{adjust_instructed, AdjustOutcome, Adjustment};
use crate::invites::{InviteRecord, InviteTracker};
use crate::member::MemberId;
use crate::propagate::{propagate_counters, BucketMove};
use crate::snapshot::{render_outline, Leaderboard, TreeSnapshot};
use crate::store::AttributeStore;
use crate::tree::HierarchyTree;
use serde::Serialize;

/// Summary of a completed refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub members: usize,
    pub buckets: usize,
    pub invites: usize,
    pub inconsistencies: usize,
}

/// Summary of a placed recruit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub member: MemberId,
    pub sponsor: MemberId,
    pub level: u32,
    pub moves: Vec<BucketMove>,
}

/// Sponsorship hierarchy bound to an attribute store.
#[derive(Debug)]
pub struct Registry<S> {
    store: S,
    tree: Option<HierarchyTree>,
    categories: CategoryIndex,
    invites: InviteTracker,
}

impl<S: AttributeStore> Registry<S> {
    /// Create an unbuilt registry over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            tree: None,
            categories: CategoryIndex::new(),
            invites: InviteTracker::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The installed tree, if a refresh has succeeded.
    pub fn tree(&self) -> Option<&HierarchyTree> {
        self.tree.as_ref()
    }

    pub fn categories(&self) -> &CategoryIndex {
        &self.categories
    }

    pub fn invites(&self) -> &InviteTracker {
        &self.invites
    }

    /// Rebuild everything from the store.
    ///
    /// The new tree and category index are built aside and installed
    /// together; on failure the previous state stays in place. `invites`
    /// replaces the invite cache when given; `None` keeps the cache.
    pub fn refresh(&mut self, invites: Option<Vec<InviteRecord>>) -> Result<RefreshSummary> {
        let buckets = self.store.list_buckets()?;
        let bucket_count = buckets.len();
        let categories = CategoryIndex::from_existing(buckets)?;
        let tree = HierarchyTree::rebuild(self.store.fetch_all_members()?)?;

        let inconsistencies = tree.check_invariants();
        for inconsistency in &inconsistencies {
            tracing::warn!("Hierarchy inconsistency: {:?}", inconsistency);
        }
        tracing::debug!("Hierarchy:\n{}", render_outline(&tree));

        if let Some(invites) = invites {
            self.invites.seed(invites);
        }
        self.categories = categories;
        self.tree = Some(tree);

        let summary = RefreshSummary {
            members: self.tree.as_ref().map_or(0, HierarchyTree::len),
            buckets: bucket_count,
            invites: self.invites.len(),
            inconsistencies: inconsistencies.len(),
        };
        tracing::info!(
            "Refreshed hierarchy: {} members, {} buckets, {} invites",
            summary.members,
            summary.buckets,
            summary.invites
        );
        Ok(summary)
    }

    /// Make `member` the level-0 root of an empty community.
    ///
    /// Refused without touching the store when any stored member already
    /// holds BFS level 0, or when `member` is not in the store.
    pub fn seed_root(&mut self, member: &MemberId) -> Result<RefreshSummary> {
        let stored = self.store.fetch_all_members()?;
        let mut roots: Vec<MemberId> = stored
            .iter()
            .filter(|record| record.level() == Some(0))
            .map(|record| record.id.clone())
            .collect();
        if let Some(tree) = &self.tree {
            if !roots.contains(&tree.root().member) {
                roots.push(tree.root().member.clone());
            }
        }
        if !roots.is_empty() {
            roots.push(member.clone());
            return Err(Error::MultipleRoots { members: roots });
        }
        if !stored.iter().any(|record| &record.id == member) {
            return Err(Error::UnknownMember(member.clone()));
        }

        let mut assigned = Vec::new();
        for category in Category::ALL {
            let written = self
                .categories
                .get_or_create(&mut self.store, category, 0)
                .and_then(|bucket| {
                    self.store.assign_bucket(member, &bucket)?;
                    Ok(bucket)
                });
            match written {
                Ok(bucket) => assigned.push(bucket),
                Err(e) => return Err(self.undo_assignments(member, &assigned, e)),
            }
        }
        tracing::info!("Seeded root member {}", member);

        self.refresh(None)
    }

    /// Record a newly created invite code.
    pub fn invite_created(&mut self, invite: InviteRecord) {
        self.invites.observe(invite);
    }

    /// Sponsor credited for the latest join, without updating the invite
    /// cache.
    pub fn resolve_sponsor(&self, current_invites: &[InviteRecord]) -> Result<MemberId> {
        self.invites.find_consumed(current_invites)
    }

    /// Check that `member` can be placed under `sponsor` and return the
    /// level it would get.
    pub fn check_placement(&self, member: &MemberId, sponsor: &MemberId) -> Result<u32> {
        let tree = self.tree.as_ref().ok_or(Error::NotBuilt)?;
        let sponsor_level = tree
            .get(sponsor)
            .ok_or_else(|| Error::UnknownSponsor(sponsor.clone()))?
            .level;
        if tree.find(member).is_some() {
            return Err(Error::DuplicateMember(member.clone()));
        }
        Ok(sponsor_level + 1)
    }

    /// Place a member who just joined, resolving the sponsor from the
    /// invite use counts in `current_invites`.
    ///
    /// The invite cache only takes in `current_invites` once the member is
    /// placed, so a failed join can be retried with the same snapshot.
    pub fn member_joined(
        &mut self,
        member: MemberId,
        display_name: &str,
        current_invites: &[InviteRecord],
    ) -> Result<Placement> {
        tracing::info!("New member {} has joined", display_name);
        let sponsor = self.resolve_sponsor(current_invites)?;
        let placement = self.place(member, display_name, sponsor)?;
        self.invites.absorb(current_invites);
        Ok(placement)
    }

    /// Place a member under an explicit sponsor.
    ///
    /// The member receives the zero buckets, the sponsor link and the BFS
    /// bucket one level below the sponsor; counters then propagate from the
    /// sponsor upward. On failure every bucket written here is taken back
    /// and the tree is left as it was. If taking back fails too, the tree
    /// is dropped and the next operation needs a refresh.
    pub fn place(
        &mut self,
        member: MemberId,
        display_name: &str,
        sponsor: MemberId,
    ) -> Result<Placement> {
        let level = self.check_placement(&member, &sponsor)?;

        let mut assigned = Vec::new();
        let defaults = [
            (Category::Downline, 0),
            (Category::Instructed, 0),
            (Category::PersonallySponsored, 0),
            (Category::Bfs, level),
        ];
        for (category, index) in defaults {
            let written = self
                .categories
                .get_or_create(&mut self.store, category, index)
                .and_then(|bucket| {
                    self.store.assign_bucket(&member, &bucket)?;
                    Ok(bucket)
                });
            match written {
                Ok(bucket) => assigned.push(bucket),
                Err(e) => return Err(self.undo_assignments(&member, &assigned, e)),
            }
        }
        if let Err(e) = self.store.set_sponsor(&member, &sponsor) {
            return Err(self.undo_assignments(&member, &assigned, e));
        }

        let moves = match self.attach(&member, display_name, &sponsor) {
            Ok(moves) => moves,
            Err(e) => return Err(self.undo_assignments(&member, &assigned, e)),
        };

        tracing::info!("Placed {} under {} at level {}", member, sponsor, level);
        Ok(Placement {
            member,
            sponsor,
            level,
            moves,
        })
    }

    /// Insert the node and propagate from its sponsor, detaching the node
    /// again if propagation fails.
    fn attach(
        &mut self,
        member: &MemberId,
        display_name: &str,
        sponsor: &MemberId,
    ) -> Result<Vec<BucketMove>> {
        let tree = self.tree.as_mut().ok_or(Error::NotBuilt)?;
        let node = tree.insert(member.clone(), display_name, sponsor)?;
        let sponsor_node = tree
            .node(node)
            .parent()
            .ok_or_else(|| Error::UnknownSponsor(sponsor.clone()))?;

        let propagated = propagate_counters(
            tree,
            &mut self.categories,
            &mut self.store,
            sponsor_node,
            true,
        );
        match propagated {
            Ok(moves) => Ok(moves),
            Err(e) => {
                tree.detach_last(node);
                if matches!(e, Error::RollbackFailed { .. }) {
                    self.tree = None;
                }
                Err(e)
            }
        }
    }

    /// Take back buckets written for `member` and hand back the error to
    /// report.
    fn undo_assignments(
        &mut self,
        member: &MemberId,
        assigned: &[BucketHandle],
        cause: Error,
    ) -> Error {
        for bucket in assigned.iter().rev() {
            if let Err(undo) = self.store.unassign_bucket(member, bucket) {
                tracing::error!(
                    "Could not take {} back from {}: {}; refresh required",
                    bucket.name(),
                    member,
                    undo
                );
                self.tree = None;
                return Error::RollbackFailed {
                    cause: cause.to_string(),
                    rollback: undo.to_string(),
                };
            }
        }
        cause
    }

    /// Move a member's Instructed counter by one.
    pub fn adjust_instructed(
        &mut self,
        member: &MemberId,
        adjustment: Adjustment,
    ) -> Result<AdjustOutcome> {
        let Self {
            store,
            tree,
            categories,
            ..
        } = self;
        let tree = tree.as_mut().ok_or(Error::NotBuilt)?;
        adjust_instructed(tree, categories, store, member, adjustment)
    }

    pub fn snapshot(&self) -> Result<TreeSnapshot> {
        self.tree
            .as_ref()
            .map(TreeSnapshot::capture)
            .ok_or(Error::NotBuilt)
    }

    pub fn leaderboard(&self, category: Category) -> Result<Leaderboard> {
        self.tree
            .as_ref()
            .map(|tree| Leaderboard::capture(tree, category))
            .ok_or(Error::NotBuilt)
    }

    pub fn outline(&self) -> Result<String> {
        self.tree.as_ref().map(render_outline).ok_or(Error::NotBuilt)
    }
}
