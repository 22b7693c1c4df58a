//! Persistent attribute store using RocksDB.
//!
//! Key layout:
//! - `member:{id}` → [`StoredMember`] (JSON)
//! - `bucket:{category}:{index}` → [`BucketHandle`] (JSON, index zero-padded)

use crate::error::{Error, Result};
use downline_tree::{AttributeStore, BucketHandle, Category, MemberId, MemberRecord};
use rocksdb::{Options, DB};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A member as persisted: identity, sponsor link and held buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMember {
    pub id: MemberId,
    pub display_name: String,
    pub sponsor: Option<MemberId>,
    pub buckets: Vec<BucketHandle>,
}

impl StoredMember {
    fn new(id: MemberId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            sponsor: None,
            buckets: Vec::new(),
        }
    }

    fn to_record(&self) -> MemberRecord {
        let mut record = MemberRecord::new(self.id.clone(), self.display_name.clone());
        for bucket in &self.buckets {
            let value = record.attributes.entry(bucket.category).or_insert(bucket.index);
            *value = (*value).max(bucket.index);
        }
        record.sponsor = self.sponsor.clone();
        record
    }
}

/// Storage backend for Downline data.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn member_key(id: &MemberId) -> String {
        format!("member:{}", id)
    }

    fn bucket_key(category: Category, index: u32) -> String {
        format!("bucket:{}:{:010}", category.slug(), index)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        let mut items = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                items.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }

        Ok(items)
    }

    // --- Members ---

    /// Register a member, keeping any buckets they already hold.
    pub fn add_member(&self, id: &MemberId, display_name: &str) -> Result<StoredMember> {
        let member = match self.get_member(id)? {
            Some(mut existing) => {
                existing.display_name = display_name.to_string();
                existing
            }
            None => StoredMember::new(id.clone(), display_name.to_string()),
        };
        self.put_json(&Self::member_key(id), &member)?;
        Ok(member)
    }

    /// Get a member by ID.
    pub fn get_member(&self, id: &MemberId) -> Result<Option<StoredMember>> {
        self.get_json(&Self::member_key(id))
    }

    /// List all members in key order.
    pub fn list_members(&self) -> Result<Vec<StoredMember>> {
        self.scan(b"member:")
    }

    fn update_member(&self, id: &MemberId, update: impl FnOnce(&mut StoredMember)) -> Result<()> {
        let mut member = self
            .get_member(id)?
            .ok_or_else(|| Error::NotFound(format!("member {}", id)))?;
        update(&mut member);
        self.put_json(&Self::member_key(id), &member)
    }

    // --- Buckets ---

    /// Get a bucket by category and index.
    pub fn get_bucket(&self, category: Category, index: u32) -> Result<Option<BucketHandle>> {
        self.get_json(&Self::bucket_key(category, index))
    }

    /// List every bucket, grouped by category and ordered by index.
    pub fn list_bucket_handles(&self) -> Result<Vec<BucketHandle>> {
        self.scan(b"bucket:")
    }
}

impl AttributeStore for Storage {
    fn fetch_all_members(&self) -> downline_tree::Result<Vec<MemberRecord>> {
        Ok(self
            .list_members()?
            .iter()
            .map(StoredMember::to_record)
            .collect())
    }

    fn list_buckets(&self) -> downline_tree::Result<Vec<BucketHandle>> {
        Ok(self.list_bucket_handles()?)
    }

    fn create_bucket(
        &mut self,
        category: Category,
        index: u32,
    ) -> downline_tree::Result<BucketHandle> {
        if let Some(existing) = self.get_bucket(category, index)? {
            return Ok(existing);
        }
        let handle = BucketHandle::new(format!("{}-{}", category.slug(), index), category, index);
        self.put_json(&Self::bucket_key(category, index), &handle)?;
        Ok(handle)
    }

    fn assign_bucket(
        &mut self,
        member: &MemberId,
        bucket: &BucketHandle,
    ) -> downline_tree::Result<()> {
        Ok(self.update_member(member, |m| {
            if !m.buckets.contains(bucket) {
                m.buckets.push(bucket.clone());
            }
        })?)
    }

    fn unassign_bucket(
        &mut self,
        member: &MemberId,
        bucket: &BucketHandle,
    ) -> downline_tree::Result<()> {
        Ok(self.update_member(member, |m| m.buckets.retain(|b| b != bucket))?)
    }

    fn set_sponsor(&mut self, member: &MemberId, sponsor: &MemberId) -> downline_tree::Result<()> {
        Ok(self.update_member(member, |m| m.sponsor = Some(sponsor.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downline_tree::Registry;
    use tempfile::tempdir;

    #[test]
    fn member_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let stored = storage.add_member(&"42".into(), "Ada").unwrap();
        let loaded = storage.get_member(&"42".into()).unwrap().unwrap();
        assert_eq!(stored, loaded);
        assert!(loaded.buckets.is_empty());
    }

    #[test]
    fn re_adding_member_keeps_buckets() {
        let dir = tempdir().unwrap();
        let mut storage = Storage::open(dir.path()).unwrap();
        let id = MemberId::from("42");

        storage.add_member(&id, "Ada").unwrap();
        let bucket = storage.create_bucket(Category::Instructed, 0).unwrap();
        storage.assign_bucket(&id, &bucket).unwrap();
        storage.add_member(&id, "Ada L.").unwrap();

        let loaded = storage.get_member(&id).unwrap().unwrap();
        assert_eq!(loaded.display_name, "Ada L.");
        assert_eq!(loaded.buckets, vec![bucket]);
    }

    #[test]
    fn buckets_list_in_index_order() {
        let dir = tempdir().unwrap();
        let mut storage = Storage::open(dir.path()).unwrap();

        for index in 0..12 {
            storage.create_bucket(Category::Downline, index).unwrap();
        }
        storage.create_bucket(Category::Bfs, 0).unwrap();

        let downline: Vec<u32> = storage
            .list_bucket_handles()
            .unwrap()
            .into_iter()
            .filter(|b| b.category == Category::Downline)
            .map(|b| b.index)
            .collect();
        assert_eq!(downline, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn assign_to_unknown_member_fails() {
        let dir = tempdir().unwrap();
        let mut storage = Storage::open(dir.path()).unwrap();
        let bucket = storage.create_bucket(Category::Bfs, 0).unwrap();

        let err = storage.assign_bucket(&"ghost".into(), &bucket).unwrap_err();
        assert!(matches!(err, downline_tree::Error::Store(_)));
    }

    #[test]
    fn fetch_reports_attributes_and_sponsor() {
        let dir = tempdir().unwrap();
        let mut storage = Storage::open(dir.path()).unwrap();
        let id = MemberId::from("7");

        storage.add_member(&id, "Grace").unwrap();
        let level = storage.create_bucket(Category::Bfs, 0).unwrap();
        storage.assign_bucket(&id, &level).unwrap();
        storage.set_sponsor(&id, &"1".into()).unwrap();

        let records = storage.fetch_all_members().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level(), Some(0));
        assert_eq!(records[0].sponsor, Some(MemberId::from("1")));
    }

    #[test]
    fn hierarchy_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let storage = Storage::open(dir.path()).unwrap();
            storage.add_member(&"r".into(), "Root").unwrap();
            storage.add_member(&"a".into(), "Ada").unwrap();

            let mut registry = Registry::new(storage);
            registry.seed_root(&"r".into()).unwrap();
            registry.place("a".into(), "Ada", "r".into()).unwrap();
        }

        let storage = Storage::open(dir.path()).unwrap();
        let mut registry = Registry::new(storage);
        registry.refresh(None).unwrap();

        let tree = registry.tree().unwrap();
        assert_eq!(tree.root().downline, 1);
        assert_eq!(tree.root().personally_sponsored(), 1);
        assert_eq!(tree.get(&"a".into()).unwrap().level, 1);
        assert!(tree.check_invariants().is_empty());
    }
}
