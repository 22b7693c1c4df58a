//! The in-memory sponsorship tree.
//!
//! Nodes live in an arena owned by [`HierarchyTree`]. Children are owned
//! downward through the arena; the parent link is a plain [`NodeId`] used
//! only for upward walks.

use crate::category::Category;
use crate::error::{Error, Result};
use crate::member::{MemberId, MemberRecord};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Position of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// One member's position in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub member: MemberId,
    pub display_name: String,
    /// Distance from the root.
    pub level: u32,
    /// Transitive recruits below this node.
    pub downline: u32,
    pub instructed: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl HierarchyNode {
    /// The sponsor's node; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direct recruits in the order they were sponsored.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Count of direct recruits.
    pub fn personally_sponsored(&self) -> u32 {
        self.children.len() as u32
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Current value for a category.
    pub fn value(&self, category: Category) -> u32 {
        match category {
            Category::Bfs => self.level,
            Category::Downline => self.downline,
            Category::Instructed => self.instructed,
            Category::PersonallySponsored => self.personally_sponsored(),
        }
    }
}

/// A tree-wide invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// `level != parent.level + 1`, or a root not at level 0.
    Level {
        member: MemberId,
        level: u32,
        expected: u32,
    },
    /// The downline counter disagrees with the subtree size.
    Downline {
        member: MemberId,
        recorded: u32,
        actual: u32,
    },
    /// The member index does not point back at the node.
    Index { member: MemberId },
}

/// Sponsorship tree keyed by member identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyTree {
    nodes: Vec<HierarchyNode>,
    index: HashMap<MemberId, NodeId>,
}

impl HierarchyTree {
    const ROOT: NodeId = NodeId(0);

    /// Reconstruct the tree from flat member records.
    ///
    /// Members are partitioned by BFS level and attached level by level, so
    /// every sponsor is constructed before its recruits. Members with no BFS
    /// value are not placed.
    pub fn rebuild(members: impl IntoIterator<Item = MemberRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut by_level: BTreeMap<u32, Vec<MemberRecord>> = BTreeMap::new();

        for member in members {
            if !seen.insert(member.id.clone()) {
                return Err(Error::DuplicateMember(member.id));
            }
            match member.level() {
                Some(level) => by_level.entry(level).or_default().push(member),
                None => tracing::warn!("Skipping member {} with no BFS level", member.id),
            }
        }

        let mut roots = by_level.remove(&0).unwrap_or_default();
        if roots.len() > 1 {
            return Err(Error::MultipleRoots {
                members: roots.into_iter().map(|m| m.id).collect(),
            });
        }
        let root = roots.pop().ok_or(Error::MissingRoot)?;

        let mut tree = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        tree.attach(None, &root, 0);

        for (level, members) in by_level {
            for member in members {
                let parent = member
                    .sponsor
                    .as_ref()
                    .and_then(|sponsor| tree.find(sponsor))
                    .filter(|&parent| tree.node(parent).level + 1 == level)
                    .ok_or_else(|| Error::OrphanedMember {
                        member: member.id.clone(),
                        sponsor: member.sponsor.clone(),
                    })?;
                tree.attach(Some(parent), &member, level);
            }
        }

        Ok(tree)
    }

    fn attach(&mut self, parent: Option<NodeId>, record: &MemberRecord, level: u32) -> NodeId {
        self.push_node(
            parent,
            HierarchyNode {
                member: record.id.clone(),
                display_name: record.display_name.clone(),
                level,
                downline: record.attribute(Category::Downline).unwrap_or(0),
                instructed: record.attribute(Category::Instructed).unwrap_or(0),
                parent,
                children: Vec::new(),
            },
        )
    }

    fn push_node(&mut self, parent: Option<NodeId>, node: HierarchyNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(node.member.clone(), id);
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Attach a new member under an indexed sponsor at `sponsor.level + 1`.
    pub fn insert(
        &mut self,
        member: MemberId,
        display_name: impl Into<String>,
        sponsor: &MemberId,
    ) -> Result<NodeId> {
        let parent = self
            .find(sponsor)
            .ok_or_else(|| Error::UnknownSponsor(sponsor.clone()))?;
        if self.index.contains_key(&member) {
            return Err(Error::DuplicateMember(member));
        }

        let level = self.node(parent).level + 1;
        Ok(self.push_node(
            Some(parent),
            HierarchyNode {
                member,
                display_name: display_name.into(),
                level,
                downline: 0,
                instructed: 0,
                parent: Some(parent),
                children: Vec::new(),
            },
        ))
    }

    pub fn root_id(&self) -> NodeId {
        Self::ROOT
    }

    pub fn root(&self) -> &HierarchyNode {
        self.node(Self::ROOT)
    }

    /// Node by arena position. Ids are only handed out by this tree.
    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut HierarchyNode {
        &mut self.nodes[id.0]
    }

    /// Undo the most recent [`insert`](Self::insert).
    ///
    /// Only the last node in the arena can be detached, and only while it
    /// has no recruits; anything else returns `None` and leaves the tree
    /// untouched.
    pub(crate) fn detach_last(&mut self, id: NodeId) -> Option<HierarchyNode> {
        if id.0 + 1 != self.nodes.len() || id == Self::ROOT {
            return None;
        }
        if !self.nodes[id.0].children.is_empty() {
            return None;
        }

        let node = self.nodes.pop()?;
        self.index.remove(&node.member);
        if let Some(parent) = node.parent {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
        Some(node)
    }

    /// Arena position of a member.
    pub fn find(&self, member: &MemberId) -> Option<NodeId> {
        self.index.get(member).copied()
    }

    /// Node of a member.
    pub fn get(&self, member: &MemberId) -> Option<&HierarchyNode> {
        self.find(member).map(|id| self.node(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in construction order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &HierarchyNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Walk from `start` up to the root, `start` included.
    pub fn ancestors(&self, start: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(start),
        }
    }

    /// Node ids in breadth-first order from the root.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        order.push(Self::ROOT);
        let mut cursor = 0;
        while cursor < order.len() {
            let id = order[cursor];
            order.extend_from_slice(&self.node(id).children);
            cursor += 1;
        }
        order
    }

    /// Number of nodes below `id`, excluding `id` itself.
    pub fn subtree_size(&self, id: NodeId) -> u32 {
        let mut stack = self.node(id).children.clone();
        let mut count = 0;
        while let Some(next) = stack.pop() {
            count += 1;
            stack.extend_from_slice(&self.node(next).children);
        }
        count
    }

    /// Every violated structural invariant.
    pub fn check_invariants(&self) -> Vec<Inconsistency> {
        let mut found = Vec::new();

        for (id, node) in self.iter() {
            if self.find(&node.member) != Some(id) {
                found.push(Inconsistency::Index {
                    member: node.member.clone(),
                });
            }

            let expected = node.parent.map_or(0, |p| self.node(p).level + 1);
            if node.level != expected {
                found.push(Inconsistency::Level {
                    member: node.member.clone(),
                    level: node.level,
                    expected,
                });
            }

            let actual = self.subtree_size(id);
            if node.downline != actual {
                found.push(Inconsistency::Downline {
                    member: node.member.clone(),
                    recorded: node.downline,
                    actual,
                });
            }
        }

        found
    }
}

/// Upward walk produced by [`HierarchyTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a HierarchyTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}
