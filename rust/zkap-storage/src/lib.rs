#![warn(missing_docs)]

//! Server-side enforcement of pass-authorized storage.
//!
//! The [AuthorizationGate] wraps a [StorageBackend]. Before it forwards an
//! operation that consumes storage it computes, from the shape of the request
//! alone, how many passes the operation costs (see [required_for_allocation]
//! and [required_for_mutable_write]) and counts how many of the presented
//! passes are valid for the request's binding message. Too few valid passes
//! and the operation fails with [AuthorizationError::InsufficientPasses]
//! without reaching the backend.
//!
//! Reads, corruption advisories and share stats are free. Mutable writes are
//! free while the slot holds an active lease; otherwise paying for the write
//! also creates a lease.

mod error;
pub use error::*;

mod accounting;
pub use accounting::*;

mod message;
pub use message::*;

mod shape;
pub use shape::*;

mod backend;
pub use backend::*;

mod spender;
pub use spender::*;

mod server;
pub use server::*;

mod gate;
pub use gate::*;

mod config;
pub use config::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
