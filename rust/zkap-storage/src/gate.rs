use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU64,
    sync::Arc,
};

use async_trait::async_trait;
use zkap_common::{Clock, ShareNumber, StorageIndex, SystemClock};
use zkap_pass::{Pass, PublicKey, SigningKey, filter_valid};

use crate::{
    Allocation, AuthorizationError, AuthorizedStorageServer, BYTES_PER_PASS, ConfigError,
    NullSpender, OperationKind, ReadRange, ReadResult, Secret, Secrets, ServerConfig,
    ServerVersion, ShareStat, ShareType, ShareWriteShape, Spender, StorageBackend,
    required_for_allocation, required_for_mutable_write,
};

/// Sits in front of a [StorageBackend] and refuses operations that consume
/// storage unless they carry enough valid passes.
///
/// Each call is a single check-then-forward decision. The gate holds no locks
/// of its own; the backend serializes its state.
pub struct AuthorizationGate<Backend>
where
    Backend: StorageBackend,
{
    backend: Backend,
    signing_key: SigningKey,
    public_key: PublicKey,
    bytes_per_pass: NonZeroU64,
    clock: Arc<dyn Clock>,
    spender: Arc<dyn Spender>,
}

impl<Backend> AuthorizationGate<Backend>
where
    Backend: StorageBackend,
{
    /// Creates a gate that checks passes against `signing_key`, charging
    /// [BYTES_PER_PASS] per pass by the system clock and recording nothing.
    pub fn new(backend: Backend, signing_key: SigningKey) -> Self {
        Self {
            backend,
            public_key: signing_key.public_key(),
            signing_key,
            bytes_per_pass: BYTES_PER_PASS,
            clock: Arc::new(SystemClock),
            spender: Arc::new(NullSpender),
        }
    }

    /// Creates a gate from server configuration, reading the signing key it
    /// names.
    pub fn from_config(backend: Backend, config: &ServerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(backend, config.load_signing_key()?).with_pass_value(config.pass_value))
    }

    /// Charges `bytes_per_pass` bytes per pass.
    pub fn with_pass_value(mut self, bytes_per_pass: NonZeroU64) -> Self {
        self.bytes_per_pass = bytes_per_pass;
        self
    }

    /// Reads lease times from `clock`.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Reports accepted passes to `spender`.
    pub fn with_spender<S>(mut self, spender: S) -> Self
    where
        S: Spender + 'static,
    {
        self.spender = Arc::new(spender);
        self
    }

    /// The storage engine behind this gate.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The public key of the issuer whose passes are accepted.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The number of bytes one pass pays for.
    pub fn pass_value(&self) -> NonZeroU64 {
        self.bytes_per_pass
    }

    fn validate<'a>(
        &self,
        operation: OperationKind,
        storage_index: &StorageIndex,
        passes: &'a [Pass],
    ) -> Vec<&'a Pass> {
        let valid = filter_valid(&self.signing_key, &operation.message(storage_index), passes);
        tracing::debug!(
            %operation,
            %storage_index,
            presented = passes.len(),
            valid = valid.len(),
            "validated passes"
        );
        valid
    }

    fn check_quantity(
        operation: OperationKind,
        storage_index: &StorageIndex,
        valid: &[&Pass],
        required_count: u64,
    ) -> Result<(), AuthorizationError> {
        let valid_count = valid.len() as u64;
        if valid_count < required_count {
            tracing::info!(
                %operation,
                %storage_index,
                valid_count,
                required_count,
                "insufficient passes"
            );
            return Err(AuthorizationError::InsufficientPasses {
                valid_count,
                required_count,
            });
        }
        Ok(())
    }

    fn record_spent(&self, passes: &[&Pass], count: u64) {
        let spent = passes
            .iter()
            .take(usize::try_from(count).unwrap_or(usize::MAX))
            .map(|pass| (*pass).clone())
            .collect::<Vec<_>>();
        if spent.is_empty() {
            return;
        }
        if let Err(error) = self.spender.mark_as_spent(&self.public_key, &spent) {
            tracing::warn!(%error, count = spent.len(), "failed to record spent passes");
        }
    }
}

#[async_trait]
impl<Backend> AuthorizedStorageServer for AuthorizationGate<Backend>
where
    Backend: StorageBackend,
{
    async fn get_version(&self) -> Result<ServerVersion, AuthorizationError> {
        Ok(self.backend.get_version().await?)
    }

    async fn allocate_buckets(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, AuthorizationError> {
        let operation = OperationKind::AllocateBuckets;
        let valid = self.validate(operation, storage_index, passes);
        let required = required_for_allocation(self.bytes_per_pass, sharenums, allocated_size);
        Self::check_quantity(operation, storage_index, &valid, required)?;

        let allocation = self
            .backend
            .allocate_buckets(
                storage_index,
                renew_secret,
                cancel_secret,
                sharenums,
                allocated_size,
            )
            .await?;

        if !allocation.allocated.is_empty() {
            self.record_spent(&valid, required);
        }
        Ok(allocation)
    }

    async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), AuthorizationError> {
        Ok(self
            .backend
            .write_bucket(storage_index, share, offset, data)
            .await?)
    }

    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, AuthorizationError> {
        Ok(self.backend.get_buckets(storage_index).await?)
    }

    async fn add_lease(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), AuthorizationError> {
        let valid = self.validate(OperationKind::AddLease, storage_index, passes);
        self.backend
            .add_lease(storage_index, renew_secret, cancel_secret)
            .await?;
        self.record_spent(&valid, valid.len() as u64);
        Ok(())
    }

    async fn renew_lease(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), AuthorizationError> {
        let valid = self.validate(OperationKind::RenewLease, storage_index, passes);
        self.backend.renew_lease(storage_index, renew_secret).await?;
        self.record_spent(&valid, valid.len() as u64);
        Ok(())
    }

    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), AuthorizationError> {
        Ok(self
            .backend
            .advise_corrupt_share(share_type, storage_index, share, reason)
            .await?)
    }

    async fn slot_testv_and_readv_and_writev(
        &self,
        passes: &[Pass],
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
    ) -> Result<(bool, ReadResult), AuthorizationError> {
        // A shape without writes has no price and cannot create storage.
        let Ok(required) = required_for_mutable_write(self.bytes_per_pass, shape) else {
            return Ok(self
                .backend
                .slot_testv_and_readv_and_writev(storage_index, secrets, shape, read_vector, false)
                .await?);
        };

        if self
            .backend
            .has_active_lease(storage_index, self.clock.now())
            .await?
        {
            return Ok(self
                .backend
                .slot_testv_and_readv_and_writev(storage_index, secrets, shape, read_vector, false)
                .await?);
        }

        let operation = OperationKind::SlotTestvAndReadvAndWritev;
        let valid = self.validate(operation, storage_index, passes);
        Self::check_quantity(operation, storage_index, &valid, required)?;

        let result = self
            .backend
            .slot_testv_and_readv_and_writev(storage_index, secrets, shape, read_vector, true)
            .await?;
        self.record_spent(&valid, required);
        Ok(result)
    }

    async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, AuthorizationError> {
        Ok(self
            .backend
            .slot_readv(storage_index, shares, read_vector)
            .await?)
    }

    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, AuthorizationError> {
        Ok(self.backend.stat_shares(storage_indexes).await?)
    }
}
