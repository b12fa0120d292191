use std::fmt::{Debug, Formatter};

use base64::{Engine, engine::general_purpose::STANDARD};
use curve25519_dalek::{RistrettoPoint, Scalar, ristretto::CompressedRistretto};
use rand::{RngCore, rngs::OsRng};

use crate::{KeyDecodeError, TokenPreimage, UnblindedToken};

/// The number of bytes in an encoded [`SigningKey`].
pub const SIGNING_KEY_LENGTH: usize = 32;

/// The number of bytes in an encoded [`PublicKey`].
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// The issuer's secret Ristretto scalar.
///
/// The storage server holds the same key as the issuer so that it can
/// rederive the unblinded token behind any pass it is shown.
#[derive(Clone)]
pub struct SigningKey {
    scalar: Scalar,
}

impl SigningKey {
    /// Generates a fresh key from the operating system's RNG.
    pub fn random() -> Self {
        let mut wide = [0u8; 64];
        OsRng.fill_bytes(&mut wide);
        Self {
            scalar: Scalar::from_bytes_mod_order_wide(&wide),
        }
    }

    /// Builds a key from its canonical 32 byte encoding.
    pub fn from_bytes(bytes: [u8; SIGNING_KEY_LENGTH]) -> Result<Self, KeyDecodeError> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .map(|scalar| Self { scalar })
            .ok_or(KeyDecodeError::NonCanonical)
    }

    /// The canonical 32 byte encoding of this key.
    pub fn to_bytes(&self) -> [u8; SIGNING_KEY_LENGTH] {
        self.scalar.to_bytes()
    }

    /// Decodes a key from standard base64.
    pub fn decode_base64(text: &str) -> Result<Self, KeyDecodeError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|error| KeyDecodeError::Base64(error.to_string()))?;
        let actual = bytes.len();
        let bytes = <[u8; SIGNING_KEY_LENGTH]>::try_from(bytes).map_err(|_| {
            KeyDecodeError::Length {
                expected: SIGNING_KEY_LENGTH,
                actual,
            }
        })?;
        Self::from_bytes(bytes)
    }

    /// Encodes this key as standard base64.
    pub fn encode_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// The public half of this key, announced to clients.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_signing_key(self)
    }

    /// Recomputes the unblinded token the issuer would have produced for
    /// `preimage`.
    pub fn rederive_unblinded_token(&self, preimage: &TokenPreimage) -> UnblindedToken {
        let point = self.scalar * preimage.to_point();
        UnblindedToken::from_parts(preimage.clone(), point.compress())
    }
}

impl Debug for SigningKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

/// The public counterpart of a [`SigningKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    /// Derives the public key of `signing_key`.
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        Self(
            RistrettoPoint::mul_base(&signing_key.scalar)
                .compress()
                .to_bytes(),
        )
    }

    /// Decodes a public key from standard base64, checking that it is a
    /// valid Ristretto point.
    pub fn decode_base64(text: &str) -> Result<Self, KeyDecodeError> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|error| KeyDecodeError::Base64(error.to_string()))?;
        let actual = bytes.len();
        let bytes = <[u8; PUBLIC_KEY_LENGTH]>::try_from(bytes).map_err(|_| {
            KeyDecodeError::Length {
                expected: PUBLIC_KEY_LENGTH,
                actual,
            }
        })?;
        CompressedRistretto(bytes)
            .decompress()
            .ok_or(KeyDecodeError::NonCanonical)?;
        Ok(Self(bytes))
    }

    /// Encodes this key as standard base64.
    pub fn encode_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&self.encode_base64())
            .finish()
    }
}
