use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::SystemTime,
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use zkap_common::{Clock, ShareNumber, StorageIndex, SystemClock, UNIX_EPOCH};

use crate::{
    Allocation, LEASE_INTERVAL, Lease, ReadRange, ReadResult, Secret, Secrets, ServerVersion,
    ShareStat, ShareType, ShareWriteShape, StorageBackend, StorageError, TestVector, has_writes,
};

/// The largest immutable share a [MemoryStorageBackend] accepts by default.
pub const DEFAULT_MAXIMUM_SHARE_SIZE: u64 = 1 << 32;

/// The largest mutable share a [MemoryStorageBackend] accepts by default.
pub const DEFAULT_MAXIMUM_MUTABLE_SHARE_SIZE: u64 = 1 << 30;

/// A client's report that a share looks corrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionAdvisory {
    /// Whether the share is immutable or mutable.
    pub share_type: ShareType,
    /// Where the share lives.
    pub storage_index: StorageIndex,
    /// Which share it is.
    pub share: ShareNumber,
    /// What the client saw.
    pub reason: String,
}

#[derive(Debug, Clone)]
struct Bucket {
    allocated_size: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct BucketSet {
    buckets: BTreeMap<ShareNumber, Bucket>,
    leases: Vec<Lease>,
}

#[derive(Debug)]
struct Slot {
    write_enabler: Secret,
    shares: BTreeMap<ShareNumber, Vec<u8>>,
    leases: Vec<Lease>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<StorageIndex, BucketSet>,
    slots: HashMap<StorageIndex, Slot>,
    advisories: Vec<CorruptionAdvisory>,
}

/// A [StorageBackend] where all shares and leases are kept in memory and
/// never persisted. Clones share the same state.
#[derive(Clone)]
pub struct MemoryStorageBackend {
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
    maximum_immutable_share_size: u64,
    maximum_mutable_share_size: u64,
}

impl MemoryStorageBackend {
    /// Creates an empty engine that reads lease times from `clock`.
    pub fn new<C>(clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self {
            state: Arc::default(),
            clock: Arc::new(clock),
            maximum_immutable_share_size: DEFAULT_MAXIMUM_SHARE_SIZE,
            maximum_mutable_share_size: DEFAULT_MAXIMUM_MUTABLE_SHARE_SIZE,
        }
    }

    /// Limits the size of immutable shares this engine will allocate.
    pub fn with_maximum_share_size(mut self, maximum: u64) -> Self {
        self.maximum_immutable_share_size = maximum;
        self
    }

    /// Limits how far a write may grow a mutable share.
    pub fn with_maximum_mutable_share_size(mut self, maximum: u64) -> Self {
        self.maximum_mutable_share_size = maximum;
        self
    }

    /// Every corruption advisory received so far.
    pub async fn advisories(&self) -> Vec<CorruptionAdvisory> {
        self.state.read().await.advisories.clone()
    }

    fn lease_expiration(&self) -> SystemTime {
        self.clock.now() + LEASE_INTERVAL
    }
}

impl Default for MemoryStorageBackend {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

fn add_or_renew(leases: &mut Vec<Lease>, renew_secret: Secret, cancel_secret: Secret, expiration: SystemTime) {
    match leases
        .iter_mut()
        .find(|lease| lease.renew_secret == renew_secret)
    {
        Some(lease) => lease.expiration = expiration,
        None => leases.push(Lease {
            renew_secret,
            cancel_secret,
            expiration,
        }),
    }
}

fn renew(leases: &mut [Lease], renew_secret: &Secret, expiration: SystemTime) -> bool {
    match leases
        .iter_mut()
        .find(|lease| &lease.renew_secret == renew_secret)
    {
        Some(lease) => {
            lease.expiration = expiration;
            true
        }
        None => false,
    }
}

fn latest_expiration(leases: &[Lease]) -> SystemTime {
    leases
        .iter()
        .map(|lease| lease.expiration)
        .max()
        .unwrap_or(UNIX_EPOCH)
}

fn to_usize(value: u64) -> Result<usize, StorageError> {
    usize::try_from(value).map_err(|_| StorageError::Backend(format!("offset {value} out of range")))
}

fn read_range(data: &[u8], offset: u64, length: u64) -> &[u8] {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
    let end = start
        .saturating_add(usize::try_from(length).unwrap_or(usize::MAX))
        .min(data.len());
    &data[start..end]
}

fn test_holds(data: &[u8], test: &TestVector) -> bool {
    read_range(data, test.offset, test.specimen.len() as u64) == test.specimen.as_slice()
}

/// A slot write that has been checked against the engine's limits.
struct PlannedWrite<'a> {
    share: ShareNumber,
    start: usize,
    data: &'a [u8],
}

/// Checks every fragment of `shape` before anything is written, so a write
/// that fails leaves the slot untouched.
fn plan_writes(shape: &ShareWriteShape, maximum: u64) -> Result<Vec<PlannedWrite<'_>>, StorageError> {
    let mut planned = Vec::new();
    for (share, vectors) in shape {
        for fragment in &vectors.write {
            let end = fragment
                .offset
                .checked_add(fragment.data.len() as u64)
                .filter(|end| *end <= maximum)
                .ok_or(StorageError::SlotTooLarge {
                    end: fragment.end(),
                    maximum,
                })?;
            let end = to_usize(end)?;
            planned.push(PlannedWrite {
                share: *share,
                start: end - fragment.data.len(),
                data: &fragment.data,
            });
        }
    }
    Ok(planned)
}

fn write_at(data: &mut Vec<u8>, start: usize, fragment: &[u8]) {
    let end = start + fragment.len();
    if data.len() < end {
        data.resize(end, 0);
    }
    data[start..end].copy_from_slice(fragment);
}

fn read_shares(
    shares: &BTreeMap<ShareNumber, Vec<u8>>,
    wanted: &[ShareNumber],
    read_vector: &[ReadRange],
) -> ReadResult {
    shares
        .iter()
        .filter(|(share, _)| wanted.is_empty() || wanted.contains(share))
        .map(|(share, data)| {
            let reads = read_vector
                .iter()
                .map(|range| read_range(data, range.offset, range.length).to_vec())
                .collect();
            (*share, reads)
        })
        .collect()
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn get_version(&self) -> Result<ServerVersion, StorageError> {
        Ok(ServerVersion {
            application_version: format!("zkap-storage/{}", env!("CARGO_PKG_VERSION")),
            maximum_immutable_share_size: self.maximum_immutable_share_size,
            maximum_mutable_share_size: self.maximum_mutable_share_size,
        })
    }

    async fn allocate_buckets(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
        sharenums: &BTreeSet<ShareNumber>,
        allocated_size: u64,
    ) -> Result<Allocation, StorageError> {
        if allocated_size > self.maximum_immutable_share_size {
            return Err(StorageError::ShareTooLarge {
                allocated_size,
                maximum: self.maximum_immutable_share_size,
            });
        }

        let expiration = self.lease_expiration();
        let mut state = self.state.write().await;
        let set = state.buckets.entry(*storage_index).or_default();

        let mut allocation = Allocation::default();
        for share in sharenums {
            if set.buckets.contains_key(share) {
                allocation.already_have.insert(*share);
            } else {
                set.buckets.insert(
                    *share,
                    Bucket {
                        allocated_size,
                        data: Vec::new(),
                    },
                );
                allocation.allocated.insert(*share);
            }
        }
        add_or_renew(&mut set.leases, renew_secret, cancel_secret, expiration);

        Ok(allocation)
    }

    async fn write_bucket(
        &self,
        storage_index: &StorageIndex,
        share: ShareNumber,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let bucket = state
            .buckets
            .get_mut(storage_index)
            .and_then(|set| set.buckets.get_mut(&share))
            .ok_or(StorageError::UnknownBucket {
                storage_index: *storage_index,
                share,
            })?;

        let end = offset.saturating_add(data.len() as u64);
        if end > bucket.allocated_size {
            return Err(StorageError::BucketOverflow {
                end,
                allocated_size: bucket.allocated_size,
            });
        }
        write_at(&mut bucket.data, to_usize(offset)?, data);
        Ok(())
    }

    async fn get_buckets(
        &self,
        storage_index: &StorageIndex,
    ) -> Result<BTreeMap<ShareNumber, Vec<u8>>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .buckets
            .get(storage_index)
            .map(|set| {
                set.buckets
                    .iter()
                    .map(|(share, bucket)| (*share, bucket.data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
        cancel_secret: Secret,
    ) -> Result<(), StorageError> {
        let expiration = self.lease_expiration();
        let mut state = self.state.write().await;
        if let Some(set) = state.buckets.get_mut(storage_index) {
            add_or_renew(&mut set.leases, renew_secret, cancel_secret, expiration);
        }
        if let Some(slot) = state.slots.get_mut(storage_index) {
            add_or_renew(&mut slot.leases, renew_secret, cancel_secret, expiration);
        }
        Ok(())
    }

    async fn renew_lease(
        &self,
        storage_index: &StorageIndex,
        renew_secret: Secret,
    ) -> Result<(), StorageError> {
        let expiration = self.lease_expiration();
        let mut state = self.state.write().await;
        let mut renewed = false;
        if let Some(set) = state.buckets.get_mut(storage_index) {
            renewed |= renew(&mut set.leases, &renew_secret, expiration);
        }
        if let Some(slot) = state.slots.get_mut(storage_index) {
            renewed |= renew(&mut slot.leases, &renew_secret, expiration);
        }

        if renewed {
            Ok(())
        } else {
            Err(StorageError::NoSuchLease(*storage_index))
        }
    }

    async fn advise_corrupt_share(
        &self,
        share_type: ShareType,
        storage_index: &StorageIndex,
        share: ShareNumber,
        reason: &str,
    ) -> Result<(), StorageError> {
        tracing::info!(%storage_index, share, ?share_type, reason, "corrupt share advisory");
        self.state.write().await.advisories.push(CorruptionAdvisory {
            share_type,
            storage_index: *storage_index,
            share,
            reason: reason.to_owned(),
        });
        Ok(())
    }

    async fn slot_testv_and_readv_and_writev(
        &self,
        storage_index: &StorageIndex,
        secrets: &Secrets,
        shape: &ShareWriteShape,
        read_vector: &[ReadRange],
        renew_leases: bool,
    ) -> Result<(bool, ReadResult), StorageError> {
        let expiration = self.lease_expiration();
        let mut state = self.state.write().await;

        let existing = state.slots.get(storage_index);
        if let Some(slot) = existing {
            if slot.write_enabler != secrets.write_enabler {
                return Err(StorageError::WriteEnablerMismatch(*storage_index));
            }
        }

        let empty = BTreeMap::new();
        let shares = existing.map(|slot| &slot.shares).unwrap_or(&empty);
        let reads = read_shares(shares, &[], read_vector);
        let passed = shape.iter().all(|(share, vectors)| {
            let data = shares.get(share).map(Vec::as_slice).unwrap_or_default();
            vectors.test.iter().all(|test| test_holds(data, test))
        });
        if !passed {
            return Ok((false, reads));
        }

        if existing.is_none() && !has_writes(shape) {
            return Ok((true, reads));
        }

        let planned = plan_writes(shape, self.maximum_mutable_share_size)?;

        let slot = state.slots.entry(*storage_index).or_insert_with(|| Slot {
            write_enabler: secrets.write_enabler,
            shares: BTreeMap::new(),
            leases: Vec::new(),
        });

        for write in planned {
            write_at(slot.shares.entry(write.share).or_default(), write.start, write.data);
        }
        for (share, vectors) in shape {
            match vectors.new_length {
                Some(0) => {
                    slot.shares.remove(share);
                }
                Some(new_length) => {
                    if let (Some(data), Ok(new_length)) =
                        (slot.shares.get_mut(share), usize::try_from(new_length))
                    {
                        data.truncate(new_length);
                    }
                }
                None => {}
            }
        }

        if renew_leases {
            tracing::debug!(%storage_index, "implicit lease");
            add_or_renew(
                &mut slot.leases,
                secrets.renew_secret,
                secrets.cancel_secret,
                expiration,
            );
        }

        Ok((true, reads))
    }

    async fn slot_readv(
        &self,
        storage_index: &StorageIndex,
        shares: &[ShareNumber],
        read_vector: &[ReadRange],
    ) -> Result<ReadResult, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .slots
            .get(storage_index)
            .map(|slot| read_shares(&slot.shares, shares, read_vector))
            .unwrap_or_default())
    }

    async fn stat_shares(
        &self,
        storage_indexes: &[StorageIndex],
    ) -> Result<Vec<BTreeMap<ShareNumber, ShareStat>>, StorageError> {
        let state = self.state.read().await;
        Ok(storage_indexes
            .iter()
            .map(|storage_index| {
                let mut stats = BTreeMap::new();
                if let Some(set) = state.buckets.get(storage_index) {
                    let lease_expiration = latest_expiration(&set.leases);
                    for (share, bucket) in &set.buckets {
                        stats.insert(
                            *share,
                            ShareStat {
                                share_type: ShareType::Immutable,
                                size: bucket.allocated_size,
                                lease_expiration,
                            },
                        );
                    }
                }
                if let Some(slot) = state.slots.get(storage_index) {
                    let lease_expiration = latest_expiration(&slot.leases);
                    for (share, data) in &slot.shares {
                        stats.insert(
                            *share,
                            ShareStat {
                                share_type: ShareType::Mutable,
                                size: data.len() as u64,
                                lease_expiration,
                            },
                        );
                    }
                }
                stats
            })
            .collect())
    }

    async fn slot_leases(&self, storage_index: &StorageIndex) -> Result<Vec<Lease>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .slots
            .get(storage_index)
            .map(|slot| slot.leases.clone())
            .unwrap_or_default())
    }
}
