//! Test helpers that skip issuance: tokens are derived straight from a
//! signing key, which is exactly what a cooperating issuer would hand back.

use crate::{Pass, SigningKey, TokenPreimage, UnblindedToken, tokens_to_passes};

/// Derives `count` unblinded tokens for `signing_key` from random preimages.
pub fn random_unblinded_tokens(signing_key: &SigningKey, count: usize) -> Vec<UnblindedToken> {
    (0..count)
        .map(|_| signing_key.rederive_unblinded_token(&TokenPreimage::random()))
        .collect()
}

/// Produces `count` passes for `message` that `signing_key` will accept.
pub fn make_passes(signing_key: &SigningKey, message: &str, count: usize) -> Vec<Pass> {
    tokens_to_passes(message, &random_unblinded_tokens(signing_key, count))
}

/// Produces `count` well-formed passes for `message` that no server holding
/// a different key will accept.
pub fn make_invalid_passes(message: &str, count: usize) -> Vec<Pass> {
    make_passes(&SigningKey::random(), message, count)
}
