use std::fmt::{Debug, Formatter};

use base64::{Engine, engine::general_purpose::STANDARD};
use curve25519_dalek::{RistrettoPoint, ristretto::CompressedRistretto};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha512};

use crate::KeyDecodeError;

type HmacSha512 = Hmac<Sha512>;

/// The number of bytes in a [`TokenPreimage`].
pub const TOKEN_PREIMAGE_LENGTH: usize = 64;

/// The number of bytes in an encoded [`UnblindedToken`].
pub const UNBLINDED_TOKEN_LENGTH: usize = TOKEN_PREIMAGE_LENGTH + 32;

/// The number of bytes in a [`VerificationSignature`].
pub const VERIFICATION_SIGNATURE_LENGTH: usize = 64;

const DERIVE_KEY_DOMAIN: &[u8] = b"hash_derive_key";

/// The random value a client commits to before issuance. It travels in the
/// clear inside every pass so the server can rederive the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenPreimage([u8; TOKEN_PREIMAGE_LENGTH]);

impl TokenPreimage {
    /// Generates a fresh preimage from the operating system's RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; TOKEN_PREIMAGE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps raw preimage bytes.
    pub const fn from_bytes(bytes: [u8; TOKEN_PREIMAGE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw preimage bytes.
    pub const fn as_bytes(&self) -> &[u8; TOKEN_PREIMAGE_LENGTH] {
        &self.0
    }

    /// Encodes the preimage as standard base64.
    pub fn encode_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Maps the preimage onto the Ristretto group.
    pub(crate) fn to_point(&self) -> RistrettoPoint {
        let digest = Sha512::digest(self.0);
        let mut uniform = [0u8; 64];
        uniform.copy_from_slice(&digest);
        RistrettoPoint::from_uniform_bytes(&uniform)
    }
}

impl Debug for TokenPreimage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TokenPreimage")
            .field(&self.encode_base64())
            .finish()
    }
}

/// Proof of a voucher redemption: a preimage together with the issuer's
/// signature over it.
///
/// Equality and hashing are by key material, so an inventory can use
/// unblinded tokens as keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UnblindedToken {
    preimage: TokenPreimage,
    point: [u8; 32],
}

impl UnblindedToken {
    pub(crate) fn from_parts(preimage: TokenPreimage, point: CompressedRistretto) -> Self {
        Self {
            preimage,
            point: point.to_bytes(),
        }
    }

    /// The preimage this token was issued for.
    pub fn preimage(&self) -> &TokenPreimage {
        &self.preimage
    }

    /// Derives the key used to sign request-binding messages with this token.
    pub fn derive_verification_key(&self) -> VerificationKey {
        let mut hash = Sha512::new();
        hash.update(DERIVE_KEY_DOMAIN);
        hash.update(self.preimage.as_bytes());
        hash.update(self.point);
        let mut key = [0u8; 64];
        key.copy_from_slice(&hash.finalize());
        VerificationKey(key)
    }

    /// The 96 byte encoding: preimage followed by the compressed point.
    pub fn to_bytes(&self) -> [u8; UNBLINDED_TOKEN_LENGTH] {
        let mut bytes = [0u8; UNBLINDED_TOKEN_LENGTH];
        bytes[..TOKEN_PREIMAGE_LENGTH].copy_from_slice(self.preimage.as_bytes());
        bytes[TOKEN_PREIMAGE_LENGTH..].copy_from_slice(&self.point);
        bytes
    }

    /// Encodes the token as standard base64 (128 characters).
    pub fn encode_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decodes a token from standard base64, checking that the point half is
    /// a valid Ristretto encoding.
    pub fn decode_base64(text: &str) -> Result<Self, KeyDecodeError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|error| KeyDecodeError::Base64(error.to_string()))?;
        if bytes.len() != UNBLINDED_TOKEN_LENGTH {
            return Err(KeyDecodeError::Length {
                expected: UNBLINDED_TOKEN_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut preimage = [0u8; TOKEN_PREIMAGE_LENGTH];
        preimage.copy_from_slice(&bytes[..TOKEN_PREIMAGE_LENGTH]);
        let point = CompressedRistretto::from_slice(&bytes[TOKEN_PREIMAGE_LENGTH..])
            .map_err(|_| KeyDecodeError::NonCanonical)?;
        point.decompress().ok_or(KeyDecodeError::NonCanonical)?;
        Ok(Self::from_parts(TokenPreimage(preimage), point))
    }
}

impl Debug for UnblindedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UnblindedToken")
            .field(&self.encode_base64())
            .finish()
    }
}

/// A shared MAC key derived from an [`UnblindedToken`]. Both the client and
/// (after rederiving the token) the server can compute it.
#[derive(Clone)]
pub struct VerificationKey([u8; 64]);

impl VerificationKey {
    #[allow(clippy::expect_used)]
    fn mac(&self) -> HmacSha512 {
        HmacSha512::new_from_slice(&self.0).expect("HMAC accepts keys of any length")
    }

    /// Signs `message` with this key.
    pub fn sign(&self, message: &[u8]) -> VerificationSignature {
        let mut mac = self.mac();
        mac.update(message);
        let mut signature = [0u8; VERIFICATION_SIGNATURE_LENGTH];
        signature.copy_from_slice(&mac.finalize().into_bytes());
        VerificationSignature(signature)
    }

    /// Checks, in constant time, that `signature` signs `message` under this
    /// key.
    pub fn verify(&self, message: &[u8], signature: &VerificationSignature) -> bool {
        let mut mac = self.mac();
        mac.update(message);
        mac.verify_slice(&signature.0).is_ok()
    }
}

impl Debug for VerificationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey").finish_non_exhaustive()
    }
}

/// A MAC over a request-binding message.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VerificationSignature([u8; VERIFICATION_SIGNATURE_LENGTH]);

impl VerificationSignature {
    /// Wraps raw signature bytes.
    pub const fn from_bytes(bytes: [u8; VERIFICATION_SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw signature bytes.
    pub const fn as_bytes(&self) -> &[u8; VERIFICATION_SIGNATURE_LENGTH] {
        &self.0
    }

    /// Encodes the signature as standard base64.
    pub fn encode_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl Debug for VerificationSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VerificationSignature")
            .field(&self.encode_base64())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SigningKey;

    #[test]
    fn it_rederives_the_same_token_for_the_same_preimage() {
        let key = SigningKey::random();
        let preimage = TokenPreimage::random();

        assert_eq!(
            key.rederive_unblinded_token(&preimage),
            key.rederive_unblinded_token(&preimage)
        );
    }

    #[test]
    fn it_rederives_different_tokens_under_different_keys() {
        let preimage = TokenPreimage::random();
        let one = SigningKey::random().rederive_unblinded_token(&preimage);
        let two = SigningKey::random().rederive_unblinded_token(&preimage);

        assert_eq!(one.preimage(), two.preimage());
        assert_ne!(one, two);
    }

    #[test]
    fn it_encodes_unblinded_tokens_as_128_base64_characters() -> anyhow::Result<()> {
        let token = SigningKey::random().rederive_unblinded_token(&TokenPreimage::random());
        let text = token.encode_base64();

        assert_eq!(text.len(), 128);
        assert_eq!(UnblindedToken::decode_base64(&text)?, token);
        Ok(())
    }

    #[test]
    fn it_rejects_tokens_with_an_invalid_point() {
        let mut bytes = [0u8; UNBLINDED_TOKEN_LENGTH];
        bytes[TOKEN_PREIMAGE_LENGTH..].copy_from_slice(&[0xff; 32]);

        let result = UnblindedToken::decode_base64(&STANDARD.encode(bytes));
        assert_eq!(result.err(), Some(KeyDecodeError::NonCanonical));
    }

    #[test]
    fn it_verifies_only_the_signed_message() {
        let token = SigningKey::random().rederive_unblinded_token(&TokenPreimage::random());
        let key = token.derive_verification_key();
        let signature = key.sign(b"allocate_buckets AAAA");

        assert!(key.verify(b"allocate_buckets AAAA", &signature));
        assert!(!key.verify(b"add_lease AAAA", &signature));
    }
}
