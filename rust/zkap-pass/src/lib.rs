#![warn(missing_docs)]

//! Ristretto token primitives and the pass wire codec.
//!
//! A client holds [`UnblindedToken`]s obtained from an issuer. To authorize a
//! request it turns each token into a [`Pass`] bound to the request's message
//! with [`tokens_to_passes`]. A server holding the issuer's [`SigningKey`]
//! checks those passes with [`is_valid`] or [`filter_valid`]:
//!
//! ```rust
//! use zkap_pass::{SigningKey, TokenPreimage, filter_valid, tokens_to_passes};
//!
//! let key = SigningKey::random();
//! let token = key.rederive_unblinded_token(&TokenPreimage::random());
//! let passes = tokens_to_passes("add_lease AAAAAAAAAAAAAAAAAAAAAA==", &[token]);
//!
//! assert_eq!(filter_valid(&key, "add_lease AAAAAAAAAAAAAAAAAAAAAA==", &passes).len(), 1);
//! assert!(filter_valid(&key, "renew_lease AAAAAAAAAAAAAAAAAAAAAA==", &passes).is_empty());
//! ```

mod error;
pub use error::*;

mod key;
pub use key::*;

mod token;
pub use token::*;

mod pass;
pub use pass::*;

mod validate;
pub use validate::*;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;
