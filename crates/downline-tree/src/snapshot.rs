//! Serializable views of the tree for presentation.

use crate::category::Category;
use crate::member::MemberId;
use crate::tree::{HierarchyNode, HierarchyTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node as seen by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: MemberId,
    pub display_name: String,
    pub level: u32,
    pub downline: u32,
    pub personally_sponsored: u32,
    pub instructed: u32,
    pub sponsor: Option<MemberId>,
    pub children: Vec<MemberId>,
}

impl NodeSnapshot {
    fn from_node(tree: &HierarchyTree, node: &HierarchyNode) -> Self {
        Self {
            id: node.member.clone(),
            display_name: node.display_name.clone(),
            level: node.level,
            downline: node.downline,
            personally_sponsored: node.personally_sponsored(),
            instructed: node.instructed,
            sponsor: node.parent().map(|p| tree.node(p).member.clone()),
            children: node
                .children()
                .iter()
                .map(|&c| tree.node(c).member.clone())
                .collect(),
        }
    }

    /// Current value for a category.
    pub fn value(&self, category: Category) -> u32 {
        match category {
            Category::Bfs => self.level,
            Category::Downline => self.downline,
            Category::Instructed => self.instructed,
            Category::PersonallySponsored => self.personally_sponsored,
        }
    }
}

/// The whole tree in breadth-first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSnapshot {
    pub root: MemberId,
    pub nodes: Vec<NodeSnapshot>,
}

impl TreeSnapshot {
    pub fn capture(tree: &HierarchyTree) -> Self {
        Self {
            root: tree.root().member.clone(),
            nodes: tree
                .breadth_first()
                .into_iter()
                .map(|id| NodeSnapshot::from_node(tree, tree.node(id)))
                .collect(),
        }
    }

    pub fn get(&self, member: &MemberId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| &n.id == member)
    }
}

/// Reference to a member on a leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub id: MemberId,
    pub display_name: String,
}

/// All members holding one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub value: u32,
    pub members: Vec<MemberRef>,
}

/// Members grouped by value for one category, highest value first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub category: Category,
    pub rows: Vec<LeaderboardRow>,
}

impl Leaderboard {
    pub fn capture(tree: &HierarchyTree, category: Category) -> Self {
        let mut grouped: BTreeMap<u32, Vec<MemberRef>> = BTreeMap::new();
        for (_, node) in tree.iter() {
            grouped.entry(node.value(category)).or_default().push(MemberRef {
                id: node.member.clone(),
                display_name: node.display_name.clone(),
            });
        }

        let rows = grouped
            .into_iter()
            .rev()
            .map(|(value, mut members)| {
                members.sort_by(|a, b| {
                    a.display_name
                        .cmp(&b.display_name)
                        .then_with(|| a.id.cmp(&b.id))
                });
                LeaderboardRow { value, members }
            })
            .collect();

        Self { category, rows }
    }

    /// Plain-text lines, e.g. `"Downline 3: Ada, Grace"`.
    pub fn lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                let names: Vec<&str> = row
                    .members
                    .iter()
                    .map(|m| m.display_name.as_str())
                    .collect();
                format!("{} {}: {}", self.category.label(), row.value, names.join(", "))
            })
            .collect()
    }
}

/// Depth-first text outline of the tree.
///
/// Each member gets a header line with its sponsor, level and downline,
/// followed by its direct recruits when it has any.
pub fn render_outline(tree: &HierarchyTree) -> String {
    let mut out = String::new();
    let mut stack = vec![tree.root_id()];

    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let parent = node
            .parent()
            .map_or("None", |p| tree.node(p).display_name.as_str());
        out.push_str(&format!(
            "Member: {}, Parent: {} ({}), Downline: {}\n",
            node.display_name, parent, node.level, node.downline
        ));

        if node.children().is_empty() {
            continue;
        }

        out.push_str(&format!(
            "Personally Sponsored {}:\n",
            node.personally_sponsored()
        ));
        for &child in node.children() {
            let child = tree.node(child);
            out.push_str(&format!(
                "- {} (Downline: {})\n",
                child.display_name, child.downline
            ));
        }
        out.push('\n');

        stack.extend(node.children().iter().rev());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberRecord;

    fn tree() -> HierarchyTree {
        HierarchyTree::rebuild(vec![
            MemberRecord::new("r", "Root")
                .with_attribute(Category::Bfs, 0)
                .with_attribute(Category::Downline, 3),
            MemberRecord::new("a", "Ada")
                .with_attribute(Category::Bfs, 1)
                .with_attribute(Category::Downline, 1)
                .with_attribute(Category::Instructed, 2)
                .with_sponsor("r"),
            MemberRecord::new("g", "Grace")
                .with_attribute(Category::Bfs, 1)
                .with_sponsor("r"),
            MemberRecord::new("l", "Linus")
                .with_attribute(Category::Bfs, 2)
                .with_sponsor("a"),
        ])
        .unwrap()
    }

    #[test]
    fn snapshot_is_breadth_first() {
        let snapshot = TreeSnapshot::capture(&tree());
        let ids: Vec<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["r", "a", "g", "l"]);
        assert_eq!(snapshot.root, MemberId::from("r"));

        let ada = snapshot.get(&"a".into()).unwrap();
        assert_eq!(ada.sponsor, Some(MemberId::from("r")));
        assert_eq!(ada.children, vec![MemberId::from("l")]);
        assert_eq!(ada.value(Category::Instructed), 2);
    }

    #[test]
    fn leaderboard_groups_and_sorts_descending() {
        let board = Leaderboard::capture(&tree(), Category::Downline);
        let values: Vec<u32> = board.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3, 1, 0]);

        let zero: Vec<&str> = board.rows[2]
            .members
            .iter()
            .map(|m| m.display_name.as_str())
            .collect();
        assert_eq!(zero, vec!["Grace", "Linus"]);
        assert_eq!(board.lines()[0], "Downline 3: Root");
    }

    #[test]
    fn personally_sponsored_board_uses_children() {
        let board = Leaderboard::capture(&tree(), Category::PersonallySponsored);
        assert_eq!(board.rows[0].value, 2);
        assert_eq!(board.rows[0].members[0].display_name, "Root");
    }

    #[test]
    fn outline_lists_recruits() {
        let outline = render_outline(&tree());
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines[0], "Member: Root, Parent: None (0), Downline: 3");
        assert_eq!(lines[1], "Personally Sponsored 2:");
        assert_eq!(lines[2], "- Ada (Downline: 1)");
        assert_eq!(lines[3], "- Grace (Downline: 0)");
        assert_eq!(lines[5], "Member: Ada, Parent: Root (1), Downline: 1");
    }
}
