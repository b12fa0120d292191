use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU64,
    sync::Arc,
};

use zkap_common::{Clock, ShareNumber, StorageIndex, SystemClock};
use zkap_spending::SpendingController;
use zkap_storage::{
    Allocation, AuthorizedStorageServer, BYTES_PER_PASS, ReadRange, ReadResult, Secret, Secrets,
    ServerVersion, ShareStat, ShareType, ShareWriteShape, add_lease_message,
    allocate_buckets_message, renew_lease_message, required_for_allocation, required_for_bytes,
    required_for_mutable_write, slot_testv_and_readv_and_writev_message,
};

use crate::{ClientConfig, ClientError, call_with_passes, call_with_passes_with_manual_spend};

/// Calls an [AuthorizedStorageServer], paying for each operation with passes
/// drawn from a [SpendingController].
pub struct AuthorizedStorageClient<Server>
where
    Server: AuthorizedStorageServer,
{
    server: Server,
    controller: SpendingController,
    bytes_per_pass: NonZeroU64,
    clock: Arc<dyn Clock>,
}

impl<Server> AuthorizedStorageClient<Server>
where
    Server: AuthorizedStorageServer,
{
    /// Creates a client that pays [BYTES_PER_PASS] per pass.
    pub fn new(server: Server, controller: SpendingController) -> Self {
        Self {
            server,
            controller,
            bytes_per_pass: BYTES_PER_PASS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates a client priced by `config`.
    pub fn from_config(
        server: Server,
        controller: SpendingController,
        config: &ClientConfig,
    ) -> Self {
        Self::new(server, controller).with_pass_value(config.pass_value)
    }

    /// Sets the number of bytes one pass pays for. Must match the server.
    pub fn with_pass_value(mut self, bytes_per_pass: NonZeroU64) -> Self {
        self.bytes_per_pass = bytes_per_pass;
        self
    }

    /// Sets the clock lease expirations are compared against.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// The server this client calls.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// The number of bytes one pass pays for.
    pub fn pass_value(&self) -> NonZeroU64 {
        self.bytes_per_pass
    }

    /// Describes the server. Free.
    pub async fn get_version(&self) -> Result<ServerVersion, ClientError> {
        Ok(self.server.get_version().await?)
    }

    /// Allocates immutable buckets.
    ///
    /// The passes are spent only if the server allocated at least one
    /// bucket; if it already held every share they are returned to the
    /// inventory.
    pub async fn allocate_buckets(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, ClientError> {
        let message = allocate_buckets_message(storage_index);
        let required = required_for_allocation(self.bytes_per_pass, sharenums, allocated_size);

        call_with_passes_with_manual_spend(
            required,
            |count| self.controller.get(&message, count),
            |passes| async move {
                self.server
                    .allocate_buckets(
                        &passes,
                        storage_index,
                        renew_secret,
                        cancel_secret,
                        sharenums,
                        allocated_size,
                    )
                    .await
            },
            |allocation, group| {
                if allocation.allocated.is_empty() {
                    group.reset()
                } else {
                    group.mark_spent()
                }
            },
        )
        .await
    }

    /// Fills an allocated bucket. Free, the allocation was paid for.
    pub async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ClientError> {
        Ok(self
            .server
            .write_bucket(storage_index, share, offset, data)
            .await?)
    }

    /// Reads the immutable shares at `storage_index`. Free.
    pub async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, ClientError> {
        Ok(self.server.get_buckets(storage_index).await?)
    }

    /// The passes a lease on `storage_index` costs: enough to cover its
    /// largest share.
    async fn lease_price(&self, storage_index: &StorageIndex) -> Result<u64, ClientError> {
        let largest = self
            .server
            .stat_shares(std::slice::from_ref(storage_index))
            .await?
            .into_iter()
            .flat_map(|stats| stats.into_values())
            .map(|stat| stat.size)
            .max()
            .unwrap_or(0);
        Ok(required_for_bytes(self.bytes_per_pass, largest))
    }

    /// Adds a lease, paying for the largest share stored at `storage_index`.
    pub async fn add_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), ClientError> {
        let message = add_lease_message(storage_index);
        let required = self.lease_price(storage_index).await?;

        call_with_passes(
            required,
            |count| self.controller.get(&message, count),
            |passes| async move {
                self.server
                    .add_lease(&passes, storage_index, renew_secret, cancel_secret)
                    .await
            },
        )
        .await
    }

    /// Renews a lease, paying for the largest share stored at
    /// `storage_index`.
    pub async fn renew_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), ClientError> {
        let message = renew_lease_message(storage_index);
        let required = self.lease_price(storage_index).await?;

        call_with_passes(
            required,
            |count| self.controller.get(&message, count),
            |passes| async move {
                self.server
                    .renew_lease(&passes, storage_index, renew_secret)
                    .await
            },
        )
        .await
    }

    /// Reports a corrupt share. Free.
    pub async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), ClientError> {
        Ok(self
            .server
            .advise_corrupt_share(share_type, storage_index, share, reason)
            .await?)
    }

    /// The passes a mutable write costs: nothing without writes or while a
    /// lease on the slot is active. Leases on immutable shares at the same
    /// index do not cover the slot.
    async fn mutable_write_price(
        &self,
        storage_index: &StorageIndex,
        shape: &ShareWriteShape,
    ) -> Result<u64, ClientError> {
        let Ok(required) = required_for_mutable_write(self.bytes_per_pass, shape) else {
            return Ok(0);
        };

        let now = self.clock.now();
        let leased = self
            .server
            .stat_shares(std::slice::from_ref(storage_index))
            .await?
            .iter()
            .flat_map(|stats| stats.values())
            .filter(|stat| stat.share_type == ShareType::Mutable)
            .any(|stat| stat.lease_expiration > now);

        Ok(if leased { 0 } else { required })
    }

    /// Tests, reads and writes a mutable slot.
    pub async fn slot_testv_and_readv_and_writev(
        &self,
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
    ) -> Result<(bool, ReadResult), ClientError> {
        let message = slot_testv_and_readv_and_writev_message(storage_index);
        let required = self.mutable_write_price(storage_index, shape).await?;

        call_with_passes(
            required,
            |count| self.controller.get(&message, count),
            |passes| async move {
                self.server
                    .slot_testv_and_readv_and_writev(
                        &passes,
                        storage_index,
                        secrets,
                        shape,
                        read_vector,
                    )
                    .await
            },
        )
        .await
    }

    /// Reads mutable shares. Free.
    pub async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, ClientError> {
        Ok(self
            .server
            .slot_readv(storage_index, shares, read_vector)
            .await?)
    }

    /// Size and lease information for the shares at each index. Free.
    pub async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, ClientError> {
        Ok(self.server.stat_shares(storage_indexes).await?)
    }
}
