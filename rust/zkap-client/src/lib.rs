#![warn(missing_docs)]

//! A storage client that pays for operations with passes.
//!
//! [AuthorizedStorageClient] works out how many passes each operation costs,
//! draws them from a [SpendingController](zkap_spending::SpendingController)
//! bound to the operation's message and settles them by the server's answer.
//! [call_with_passes] is the same draw-call-settle loop for any operation.

mod error;
pub use error::*;

mod call;
pub use call::*;

mod client;
pub use client::*;

mod config;
pub use config::*;
