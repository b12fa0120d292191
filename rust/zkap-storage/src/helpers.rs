//! Fixtures for exercising the gate over the in-memory engine.

use std::num::NonZeroU64;

use zkap_common::{ManualClock, ShareNumber};
use zkap_pass::SigningKey;

use crate::{
    AuthorizationGate, MeasuredStorageBackend, MemoryStorageBackend, RecordingSpender, Secrets,
    ShareWriteShape, TestWriteVectors, WriteVector,
};

/// The gate type the fixtures build: a measured in-memory engine behind it.
pub type MemoryGate = AuthorizationGate<MeasuredStorageBackend<MemoryStorageBackend>>;

/// Fixed secrets for mutable writes.
pub fn fixed_secrets() -> Secrets {
    Secrets {
        write_enabler: [1; 32],
        renew_secret: [2; 32],
        cancel_secret: [3; 32],
    }
}

/// A shape that writes `length` bytes at `offset` into `share`.
pub fn single_write_shape(share: ShareNumber, offset: u64, length: usize) -> ShareWriteShape {
    ShareWriteShape::from([(
        share,
        TestWriteVectors {
            write: vec![WriteVector {
                offset,
                data: vec![0xaa; length],
            }],
            ..Default::default()
        },
    )])
}

/// A gate over a fresh in-memory engine, sharing `clock` with the engine and
/// reporting to `spender`.
pub fn memory_gate(
    signing_key: SigningKey,
    bytes_per_pass: NonZeroU64,
    clock: ManualClock,
    spender: RecordingSpender,
) -> MemoryGate {
    let backend = MeasuredStorageBackend::new(MemoryStorageBackend::new(clock.clone()));
    AuthorizationGate::new(backend, signing_key)
        .with_pass_value(bytes_per_pass)
        .with_clock(clock)
        .with_spender(spender)
}
