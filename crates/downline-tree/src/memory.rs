//! In-memory attribute store.

use crate::category::{BucketHandle, Category};
use crate::error::{Error, Result};
use crate::member::{MemberId, MemberRecord};
use crate::store::AttributeStore;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct StoredMember {
    display_name: String,
    held: BTreeSet<BucketHandle>,
    sponsor: Option<MemberId>,
}

/// Attribute store kept entirely in process memory.
///
/// Members are returned in identifier order, which keeps rebuilds
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    members: BTreeMap<MemberId, StoredMember>,
    buckets: BTreeMap<(Category, u32), BucketHandle>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member with no buckets.
    pub fn add_member(&mut self, id: impl Into<MemberId>, display_name: impl Into<String>) {
        self.members.insert(
            id.into(),
            StoredMember {
                display_name: display_name.into(),
                held: BTreeSet::new(),
                sponsor: None,
            },
        );
    }

    /// Buckets currently held by a member.
    pub fn held(&self, member: &MemberId) -> Vec<BucketHandle> {
        self.members
            .get(member)
            .map(|m| m.held.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Values a member holds for a category, ascending.
    pub fn values(&self, member: &MemberId, category: Category) -> Vec<u32> {
        let mut values: Vec<u32> = self
            .held(member)
            .into_iter()
            .filter(|b| b.category == category)
            .map(|b| b.index)
            .collect();
        values.sort_unstable();
        values
    }

    /// Every bucket created so far.
    pub fn buckets(&self) -> Vec<BucketHandle> {
        self.buckets.values().cloned().collect()
    }

    fn member_mut(&mut self, member: &MemberId) -> Result<&mut StoredMember> {
        self.members
            .get_mut(member)
            .ok_or_else(|| Error::Store(format!("member not found: {}", member)))
    }
}

impl AttributeStore for MemoryStore {
    fn fetch_all_members(&self) -> Result<Vec<MemberRecord>> {
        Ok(self
            .members
            .iter()
            .map(|(id, stored)| {
                let mut record = MemberRecord::new(id.clone(), stored.display_name.clone());
                // Highest value wins if a category is held more than once.
                for bucket in &stored.held {
                    let value = record.attributes.entry(bucket.category).or_insert(bucket.index);
                    *value = (*value).max(bucket.index);
                }
                record.sponsor = stored.sponsor.clone();
                record
            })
            .collect())
    }

    fn list_buckets(&self) -> Result<Vec<BucketHandle>> {
        Ok(self.buckets())
    }

    fn create_bucket(&mut self, category: Category, index: u32) -> Result<BucketHandle> {
        let handle = self
            .buckets
            .entry((category, index))
            .or_insert_with(|| {
                BucketHandle::new(format!("{}-{}", category.slug(), index), category, index)
            });
        Ok(handle.clone())
    }

    fn assign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()> {
        self.member_mut(member)?.held.insert(bucket.clone());
        Ok(())
    }

    fn unassign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()> {
        self.member_mut(member)?.held.remove(bucket);
        Ok(())
    }

    fn set_sponsor(&mut self, member: &MemberId, sponsor: &MemberId) -> Result<()> {
        self.member_mut(member)?.sponsor = Some(sponsor.clone());
        Ok(())
    }
}

/// A [`MemoryStore`] that fails exactly one bucket assignment, counted
/// from one.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    fail_on_assign: usize,
    assigns: usize,
}

#[cfg(test)]
impl FlakyStore {
    pub fn new(inner: MemoryStore, fail_on_assign: usize) -> Self {
        Self {
            inner,
            fail_on_assign,
            assigns: 0,
        }
    }
}

#[cfg(test)]
impl AttributeStore for FlakyStore {
    fn fetch_all_members(&self) -> Result<Vec<MemberRecord>> {
        self.inner.fetch_all_members()
    }

    fn list_buckets(&self) -> Result<Vec<BucketHandle>> {
        self.inner.list_buckets()
    }

    fn create_bucket(&mut self, category: Category, index: u32) -> Result<BucketHandle> {
        self.inner.create_bucket(category, index)
    }

    fn assign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()> {
        self.assigns += 1;
        if self.assigns == self.fail_on_assign {
            return Err(Error::Store("down".to_string()));
        }
        self.inner.assign_bucket(member, bucket)
    }

    fn unassign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()> {
        self.inner.unassign_bucket(member, bucket)
    }

    fn set_sponsor(&mut self, member: &MemberId, sponsor: &MemberId) -> Result<()> {
        self.inner.set_sponsor(member, sponsor)
    }
}
