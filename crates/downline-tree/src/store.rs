//! The attribute store seam.
//!
//! All durability lives behind this trait: the hierarchy is rebuilt from
//! [`AttributeStore::fetch_all_members`] and every counter change is
//! materialized as a bucket reassignment.

use crate::category::{BucketHandle, Category};
use crate::error::Result;
use crate::member::{MemberId, MemberRecord};

/// External store of per-member categorical attributes.
pub trait AttributeStore {
    /// Every member with their current attribute values and sponsor link.
    fn fetch_all_members(&self) -> Result<Vec<MemberRecord>>;

    /// Every bucket that currently exists, in any order.
    fn list_buckets(&self) -> Result<Vec<BucketHandle>>;

    /// Materialize a bucket for `(category, index)`.
    fn create_bucket(&mut self, category: Category, index: u32) -> Result<BucketHandle>;

    /// Give a member a bucket.
    fn assign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()>;

    /// Take a bucket away from a member.
    fn unassign_bucket(&mut self, member: &MemberId, bucket: &BucketHandle) -> Result<()>;

    /// Record who sponsored a member.
    fn set_sponsor(&mut self, member: &MemberId, sponsor: &MemberId) -> Result<()>;
}
