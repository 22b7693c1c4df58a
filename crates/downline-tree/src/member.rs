//! Member identity and the flat attribute record read from the store.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable external identifier of a member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One member as seen by the attribute store.
///
/// Attribute values are absent when the member holds no bucket of that
/// category. The sponsor is absent for the root and for members that were
/// never linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub display_name: String,
    pub attributes: BTreeMap<Category, u32>,
    pub sponsor: Option<MemberId>,
}

impl MemberRecord {
    /// Create a record with no attributes and no sponsor.
    pub fn new(id: impl Into<MemberId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            attributes: BTreeMap::new(),
            sponsor: None,
        }
    }

    /// Set an attribute value.
    pub fn with_attribute(mut self, category: Category, value: u32) -> Self {
        self.attributes.insert(category, value);
        self
    }

    /// Set the sponsor link.
    pub fn with_sponsor(mut self, sponsor: impl Into<MemberId>) -> Self {
        self.sponsor = Some(sponsor.into());
        self
    }

    /// Value held for a category, if any.
    pub fn attribute(&self, category: Category) -> Option<u32> {
        self.attributes.get(&category).copied()
    }

    pub fn level(&self) -> Option<u32> {
        self.attribute(Category::Bfs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_attributes() {
        let record = MemberRecord::new("42", "Ada")
            .with_attribute(Category::Bfs, 2)
            .with_attribute(Category::Downline, 7)
            .with_sponsor("7");

        assert_eq!(record.level(), Some(2));
        assert_eq!(record.attribute(Category::Downline), Some(7));
        assert_eq!(record.attribute(Category::Instructed), None);
        assert_eq!(record.sponsor, Some(MemberId::from("7")));
    }

    #[test]
    fn member_id_display() {
        assert_eq!(MemberId::from("abc").to_string(), "abc");
        assert_eq!(MemberId::new(String::from("x")).as_str(), "x");
    }
}
