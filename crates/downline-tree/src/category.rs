//! Attribute categories and the per-category bucket index.
//!
//! A bucket is the external representation of "member holds value V for
//! category C". Buckets within a category are allocated lazily and
//! sequentially, so the allocated index set is always the prefix
//! `[0, len)`.

use crate::error::{Error, Result};
use crate::store::AttributeStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four counter categories tracked per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Depth from the root.
    Bfs,
    /// Transitive recruits.
    Downline,
    /// Independently adjusted counter.
    Instructed,
    /// Direct recruits.
    PersonallySponsored,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bfs,
        Category::Downline,
        Category::Instructed,
        Category::PersonallySponsored,
    ];

    /// Human-readable label, used as the bucket name prefix.
    pub const fn label(self) -> &'static str {
        match self {
            Category::Bfs => "BFS",
            Category::Downline => "Downline",
            Category::Instructed => "Instructed",
            Category::PersonallySponsored => "Personally Sponsored",
        }
    }

    /// Stable lowercase key, used in storage keys and URLs.
    pub const fn slug(self) -> &'static str {
        match self {
            Category::Bfs => "bfs",
            Category::Downline => "downline",
            Category::Instructed => "instructed",
            Category::PersonallySponsored => "personally_sponsored",
        }
    }

    /// Parse a slug or label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.slug().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s))
    }

    const fn position(self) -> usize {
        match self {
            Category::Bfs => 0,
            Category::Downline => 1,
            Category::Instructed => 2,
            Category::PersonallySponsored => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle to one externally materialized bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketHandle {
    /// External identifier assigned by the store.
    pub id: String,
    pub category: Category,
    pub index: u32,
}

impl BucketHandle {
    pub fn new(id: impl Into<String>, category: Category, index: u32) -> Self {
        Self {
            id: id.into(),
            category,
            index,
        }
    }

    /// Display name, e.g. `"Downline 3"`.
    pub fn name(&self) -> String {
        format!("{} {}", self.category.label(), self.index)
    }
}

/// Dense, sorted bucket handles for every category.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    buckets: [Vec<BucketHandle>; 4],
}

impl CategoryIndex {
    /// Create an index with every category initialized and empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from buckets discovered in the store.
    pub fn from_existing(existing: impl IntoIterator<Item = BucketHandle>) -> Result<Self> {
        let mut grouped: [Vec<BucketHandle>; 4] = Default::default();
        for bucket in existing {
            grouped[bucket.category.position()].push(bucket);
        }

        let mut index = Self::new();
        for (category, buckets) in Category::ALL.into_iter().zip(grouped) {
            index.rebuild_from_existing(category, buckets)?;
        }
        Ok(index)
    }

    /// Replace one category's buckets, sorted ascending by index.
    ///
    /// The sorted set must be exactly `[0, n)`; gaps and duplicates are
    /// data-consistency errors and leave the category unchanged.
    pub fn rebuild_from_existing(
        &mut self,
        category: Category,
        mut existing: Vec<BucketHandle>,
    ) -> Result<()> {
        existing.sort_by_key(|b| b.index);

        for (position, bucket) in existing.iter().enumerate() {
            let expected = position as u32;
            if bucket.index < expected {
                return Err(Error::DuplicateBucket {
                    category,
                    index: bucket.index,
                });
            }
            if bucket.index > expected {
                return Err(Error::BucketGap {
                    category,
                    requested: bucket.index,
                    next: expected,
                });
            }
        }

        self.buckets[category.position()] = existing;
        Ok(())
    }

    /// Existing bucket for `(category, index)`, if allocated.
    pub fn get(&self, category: Category, index: u32) -> Option<&BucketHandle> {
        self.buckets[category.position()].get(index as usize)
    }

    /// Return the bucket for `(category, index)`, allocating it in the
    /// store when `index` is exactly one past the highest allocated index.
    pub fn get_or_create<S: AttributeStore + ?Sized>(
        &mut self,
        store: &mut S,
        category: Category,
        index: u32,
    ) -> Result<BucketHandle> {
        let next = self.allocated(category);
        if index < next {
            return Ok(self.buckets[category.position()][index as usize].clone());
        }
        if index > next {
            return Err(Error::BucketGap {
                category,
                requested: index,
                next,
            });
        }

        let handle = store.create_bucket(category, index)?;
        tracing::info!("Allocated bucket {}", handle.name());
        self.buckets[category.position()].push(handle.clone());
        Ok(handle)
    }

    /// Number of allocated buckets in a category.
    pub fn allocated(&self, category: Category) -> u32 {
        self.buckets[category.position()].len() as u32
    }

    /// All allocated buckets of a category in index order.
    pub fn buckets(&self, category: Category) -> &[BucketHandle] {
        &self.buckets[category.position()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn handle(category: Category, index: u32) -> BucketHandle {
        BucketHandle::new(format!("{}-{}", category.slug(), index), category, index)
    }

    #[test]
    fn parse_accepts_slug_and_label() {
        assert_eq!(Category::parse("downline"), Some(Category::Downline));
        assert_eq!(
            Category::parse("Personally Sponsored"),
            Some(Category::PersonallySponsored)
        );
        assert_eq!(Category::parse("BFS"), Some(Category::Bfs));
        assert_eq!(Category::parse("parent"), None);
    }

    #[test]
    fn bucket_name_uses_label() {
        assert_eq!(handle(Category::PersonallySponsored, 3).name(), "Personally Sponsored 3");
    }

    #[test]
    fn rebuild_sorts_by_index() {
        let mut index = CategoryIndex::new();
        index
            .rebuild_from_existing(
                Category::Downline,
                vec![
                    handle(Category::Downline, 2),
                    handle(Category::Downline, 0),
                    handle(Category::Downline, 1),
                ],
            )
            .unwrap();

        let indices: Vec<u32> = index
            .buckets(Category::Downline)
            .iter()
            .map(|b| b.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn rebuild_rejects_gap() {
        let mut index = CategoryIndex::new();
        let err = index
            .rebuild_from_existing(
                Category::Instructed,
                vec![handle(Category::Instructed, 0), handle(Category::Instructed, 2)],
            )
            .unwrap_err();

        assert_eq!(
            err,
            Error::BucketGap {
                category: Category::Instructed,
                requested: 2,
                next: 1
            }
        );
        assert_eq!(index.allocated(Category::Instructed), 0);
    }

    #[test]
    fn rebuild_rejects_duplicate() {
        let mut index = CategoryIndex::new();
        let err = index
            .rebuild_from_existing(
                Category::Bfs,
                vec![handle(Category::Bfs, 0), handle(Category::Bfs, 0)],
            )
            .unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateBucket {
                category: Category::Bfs,
                index: 0
            }
        );
    }

    #[test]
    fn get_or_create_returns_existing() {
        let mut store = MemoryStore::new();
        let mut index = CategoryIndex::new();
        let first = index.get_or_create(&mut store, Category::Downline, 0).unwrap();
        let again = index.get_or_create(&mut store, Category::Downline, 0).unwrap();

        assert_eq!(first, again);
        assert_eq!(store.buckets().len(), 1);
    }

    #[test]
    fn sequential_growth_succeeds() {
        let mut store = MemoryStore::new();
        let mut index = CategoryIndex::new();
        for i in 0..4 {
            index.get_or_create(&mut store, Category::Instructed, i).unwrap();
        }

        index.get_or_create(&mut store, Category::Instructed, 4).unwrap();
        let five = index.get_or_create(&mut store, Category::Instructed, 5).unwrap();

        assert_eq!(five.index, 5);
        assert_eq!(index.allocated(Category::Instructed), 6);
    }

    #[test]
    fn skipping_an_index_fails_fast() {
        let mut store = MemoryStore::new();
        let mut index = CategoryIndex::new();
        for i in 0..4 {
            index.get_or_create(&mut store, Category::Instructed, i).unwrap();
        }

        let err = index.get_or_create(&mut store, Category::Instructed, 5).unwrap_err();
        assert_eq!(
            err,
            Error::BucketGap {
                category: Category::Instructed,
                requested: 5,
                next: 4
            }
        );
        assert_eq!(index.allocated(Category::Instructed), 4);
        assert!(index.get(Category::Instructed, 4).is_none());
    }

    #[test]
    fn categories_are_independent() {
        let mut store = MemoryStore::new();
        let mut index = CategoryIndex::new();
        index.get_or_create(&mut store, Category::Bfs, 0).unwrap();
        index.get_or_create(&mut store, Category::Bfs, 1).unwrap();

        assert_eq!(index.allocated(Category::Bfs), 2);
        assert_eq!(index.allocated(Category::Downline), 0);
    }

    #[test]
    fn from_existing_groups_by_category() {
        let index = CategoryIndex::from_existing(vec![
            handle(Category::Downline, 1),
            handle(Category::Bfs, 0),
            handle(Category::Downline, 0),
        ])
        .unwrap();

        assert_eq!(index.allocated(Category::Downline), 2);
        assert_eq!(index.allocated(Category::Bfs), 1);
        assert_eq!(index.allocated(Category::PersonallySponsored), 0);
    }
}
