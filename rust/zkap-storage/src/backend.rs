use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use zkap_common::{ShareNumber, StorageIndex};

use crate::{
    Allocation, ReadRange, Secret, Secrets, ServerVersion, ShareStat, ShareType, ShareWriteShape,
    StorageError,
};

mod memory;
pub use memory::*;

mod measure;
pub use measure::*;

/// How long a lease lasts from the moment it is created or renewed.
pub const LEASE_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24 * 31);

/// A lease keeping shares at a storage index alive until `expiration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    /// The secret that renews this lease.
    pub renew_secret: Secret,
    /// The secret that cancels this lease.
    pub cancel_secret: Secret,
    /// When the lease runs out.
    pub expiration: SystemTime,
}

/// The data read from each share, one entry per requested range.
pub type ReadResult = BTreeMap<ShareNumber, Vec<Vec<u8>>>;

/// A [StorageBackend] is the storage engine behind the authorization gate.
/// It knows nothing about passes; every call it receives has already been
/// authorized.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Describe the engine.
    async fn get_version(&self) -> Result<ServerVersion, StorageError>;

    /// Allocate buckets of `allocated_size` bytes for each requested share
    /// that is not already held, and add a lease covering the storage index.
    async fn allocate_buckets(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, StorageError>;

    /// Write `data` at `offset` into an allocated bucket.
    async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StorageError>;

    /// The contents of every immutable share held at `storage_index`.
    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, StorageError>;

    /// Add a lease to the shares at `storage_index`, or renew the lease that
    /// already carries `renew_secret`.
    async fn add_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), StorageError>;

    /// Renew the lease that carries `renew_secret`.
    async fn renew_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), StorageError>;

    /// Record a client's report that a share looks corrupt.
    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), StorageError>;

    /// Evaluate the test vectors of `shape` and, only if all of them hold,
    /// apply its writes. Reads are taken before any write. With
    /// `renew_leases`, a lease using the secrets in `secrets` is added or
    /// renewed in the same step.
    async fn slot_testv_and_readv_and_writev(
        &self,
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
        renew_leases: bool,
    ) -> Result<(bool, ReadResult), StorageError>;

    /// Read ranges from the mutable shares at `storage_index`. An empty
    /// `shares` reads from every share.
    async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, StorageError>;

    /// Size and lease expiration of every share at each storage index.
    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, StorageError>;

    /// The leases on the mutable slot at `storage_index`.
    async fn slot_leases(&self, storage_index: &StorageIndex) -> Result<Vec<Lease>, StorageError>;

    /// Whether any lease on the slot at `storage_index` expires strictly
    /// after `now`.
    async fn has_active_lease(
        &self,
        storage_index: &StorageIndex,
        now: SystemTime,
    ) -> Result<bool, StorageError> {
        Ok(self
            .slot_leases(storage_index)
            .await?
            .iter()
            .any(|lease| lease.expiration > now))
    }
}

#[async_trait]
impl<T> StorageBackend for Arc<T>
where
    T: StorageBackend + ?Sized,
{
    async fn get_version(&self) -> Result<ServerVersion, StorageError> {
        T::get_version(self).await
    }

    async fn allocate_buckets(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, StorageError> {
        T::allocate_buckets(
            self,
            storage_index,
            renew_secret,
            cancel_secret,
            sharenums,
            allocated_size,
        )
        .await
    }

    async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        T::write_bucket(self, storage_index, share, offset, data).await
    }

    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, StorageError> {
        T::get_buckets(self, storage_index).await
    }

    async fn add_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), StorageError> {
        T::add_lease(self, storage_index, renew_secret, cancel_secret).await
    }

    async fn renew_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), StorageError> {
        T::renew_lease(self, storage_index, renew_secret).await
    }

    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), StorageError> {
        T::advise_corrupt_share(self, share_type, storage_index, share, reason).await
    }

    async fn slot_testv_and_readv_and_writev(
        &self,
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
        renew_leases: bool,
    ) -> Result<(bool, ReadResult), StorageError> {
        T::slot_testv_and_readv_and_writev(
            self,
            storage_index,
            secrets,
            shape,
            read_vector,
            renew_leases,
        )
        .await
    }

    async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, StorageError> {
        T::slot_readv(self, storage_index, shares, read_vector).await
    }

    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, StorageError> {
        T::stat_shares(self, storage_indexes).await
    }

    async fn slot_leases(&self, storage_index: &StorageIndex) -> Result<Vec<Lease>, StorageError> {
        T::slot_leases(self, storage_index).await
    }

    async fn has_active_lease(
        &self,
        storage_index: &StorageIndex,
        now: SystemTime,
    ) -> Result<bool, StorageError> {
        T::has_active_lease(self, storage_index, now).await
    }
}
