use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use async_trait::async_trait;
use zkap_common::{ShareNumber, StorageIndex};

use crate::{
    Allocation, Lease, ReadRange, ReadResult, Secret, Secrets, ServerVersion, ShareStat,
    ShareType, ShareWriteShape, StorageBackend, StorageError,
};

#[derive(Default)]
struct Counters {
    allocations: AtomicUsize,
    lease_updates: AtomicUsize,
    slot_writes: AtomicUsize,
}

/// A [MeasuredStorageBackend] acts as a proxy over a [StorageBackend] that
/// counts the operations which cost passes, so it can be shown which calls
/// the gate actually forwarded.
#[derive(Clone)]
pub struct MeasuredStorageBackend<Backend>
where
    Backend: StorageBackend,
{
    counters: Arc<Counters>,
    backend: Backend,
}

impl<Backend> MeasuredStorageBackend<Backend>
where
    Backend: StorageBackend,
{
    /// Wrap `backend` so that the calls it receives may be counted.
    pub fn new(backend: Backend) -> Self {
        Self {
            counters: Arc::default(),
            backend,
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Backend {
        &self.backend
    }

    /// The number of forwarded `allocate_buckets` calls.
    pub fn allocations(&self) -> usize {
        self.counters.allocations.load(Ordering::Relaxed)
    }

    /// The number of forwarded `add_lease` and `renew_lease` calls.
    pub fn lease_updates(&self) -> usize {
        self.counters.lease_updates.load(Ordering::Relaxed)
    }

    /// The number of forwarded `slot_testv_and_readv_and_writev` calls.
    pub fn slot_writes(&self) -> usize {
        self.counters.slot_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<Backend> StorageBackend for MeasuredStorageBackend<Backend>
where
    Backend: StorageBackend,
{
    async fn get_version(&self) -> Result<ServerVersion, StorageError> {
        self.backend.get_version().await
    }

    async fn allocate_buckets(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, StorageError> {
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        self.backend
            .allocate_buckets(
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
        self.backend
            .write_bucket(storage_index, share, offset, data)
            .await
    }

    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, StorageError> {
        self.backend.get_buckets(storage_index).await
    }

    async fn add_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), StorageError> {
        self.counters.lease_updates.fetch_add(1, Ordering::Relaxed);
        self.backend
            .add_lease(storage_index, renew_secret, cancel_secret)
            .await
    }

    async fn renew_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), StorageError> {
        self.counters.lease_updates.fetch_add(1, Ordering::Relaxed);
        self.backend.renew_lease(storage_index, renew_secret).await
    }

    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), StorageError> {
        self.backend
            .advise_corrupt_share(share_type, storage_index, share, reason)
            .await
    }

    async fn slot_testv_and_readv_and_writev(
        &self,
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
        renew_leases: bool,
    ) -> Result<(bool, ReadResult), StorageError> {
        self.counters.slot_writes.fetch_add(1, Ordering::Relaxed);
        self.backend
            .slot_testv_and_readv_and_writev(
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
        self.backend
            .slot_readv(storage_index, shares, read_vector)
            .await
    }

    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, StorageError> {
        self.backend.stat_shares(storage_indexes).await
    }

    async fn slot_leases(&self, storage_index: &StorageIndex) -> Result<Vec<Lease>, StorageError> {
        self.backend.slot_leases(storage_index).await
    }

    async fn has_active_lease(
        &self,
        storage_index: &StorageIndex,
        now: SystemTime,
    ) -> Result<bool, StorageError> {
        self.backend.has_active_lease(storage_index, now).await
    }
}
