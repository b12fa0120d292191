#![warn(missing_docs)]

//! This crate constitutes a library of light weight helpers that are shared
//! by the server and client halves of pass-authorized storage. Their chief
//! quality is that they have virtually zero dependencies.

mod time;
pub use time::*;

mod storage_index;
pub use storage_index::*;
