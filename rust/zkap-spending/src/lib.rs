#![warn(missing_docs)]

//! Client-side control over the lifecycle of passes.
//!
//! A [SpendingController] draws tokens from a [TokenInventory] and turns them
//! into a [PassGroup] bound to one request message. Whoever holds the group
//! must settle it exactly once:
//!
//! ```rust
//! use zkap_pass::{SigningKey, TokenPreimage};
//! use zkap_spending::{MemoryTokenInventory, SpendingController};
//!
//! let key = SigningKey::random();
//! let inventory = MemoryTokenInventory::with_tokens(
//!     (0..2).map(|_| key.rederive_unblinded_token(&TokenPreimage::random())),
//! );
//! let controller = SpendingController::new(inventory.clone());
//!
//! let group = controller.get("add_lease AAAAAAAAAAAAAAAAAAAAAA==", 2).unwrap();
//! // ...present group.passes() to the server, then:
//! group.reset().unwrap();
//!
//! assert_eq!(inventory.available().len(), 2);
//! ```

mod error;
pub use error::*;

mod inventory;
pub use inventory::*;

mod group;
pub use group::*;

mod controller;
pub use controller::*;
