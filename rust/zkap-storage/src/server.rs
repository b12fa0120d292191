use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use zkap_common::{ShareNumber, StorageIndex};
use zkap_pass::Pass;

use crate::{
    Allocation, AuthorizationError, ReadRange, ReadResult, Secret, Secrets, ServerVersion,
    ShareStat, ShareType, ShareWriteShape,
};

/// The remote surface of a pass-authorized storage server.
///
/// Operations that consume storage take the caller's passes as their first
/// argument. A transport adapts incoming calls onto this trait; the
/// [`AuthorizationGate`](crate::AuthorizationGate) implements it over a
/// [`StorageBackend`](crate::StorageBackend).
#[async_trait]
pub trait AuthorizedStorageServer: Send + Sync {
    /// Describe the server. Free.
    async fn get_version(&self) -> Result<ServerVersion, AuthorizationError>;

    /// Allocate immutable buckets, paid for with `passes`.
    async fn allocate_buckets(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, AuthorizationError>;

    /// Fill an allocated bucket. Free, the allocation was already paid for.
    async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), AuthorizationError>;

    /// Read immutable shares. Free.
    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, AuthorizationError>;

    /// Add a lease, accompanied by `passes`.
    async fn add_lease(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), AuthorizationError>;

    /// Renew a lease, accompanied by `passes`.
    async fn renew_lease(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), AuthorizationError>;

    /// Report a corrupt share. Free.
    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), AuthorizationError>;

    /// Test-and-write a mutable slot, paid for with `passes` when the write
    /// is not covered by an active lease.
    async fn slot_testv_and_readv_and_writev(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
    ) -> Result<(bool, ReadResult), AuthorizationError>;

    /// Read mutable shares. Free.
    async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, AuthorizationError>;

    /// Size and lease information for shares. Free.
    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, AuthorizationError>;
}
