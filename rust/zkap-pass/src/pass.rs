use std::fmt::{Debug, Formatter};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    PassDecodeError, TOKEN_PREIMAGE_LENGTH, TokenPreimage, UnblindedToken,
    VERIFICATION_SIGNATURE_LENGTH, VerificationSignature,
};

const DELIMITER: u8 = b' ';

/// A single-use proof of authorization, bound to one request message.
///
/// The wire form is `base64(preimage) + " " + base64(signature)`. A [`Pass`]
/// holds those bytes opaquely; nothing about them is trusted until they have
/// been decoded and checked against a signing key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pass(Vec<u8>);

impl Pass {
    /// Assembles the wire form of a pass from its parts.
    pub fn new(preimage: &TokenPreimage, signature: &VerificationSignature) -> Self {
        let mut bytes = preimage.encode_base64().into_bytes();
        bytes.push(DELIMITER);
        bytes.extend_from_slice(signature.encode_base64().as_bytes());
        Self(bytes)
    }

    /// The wire bytes of this pass.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the pass, returning its wire bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Splits the pass into its preimage and signature.
    ///
    /// Fails unless there is exactly one delimiter and both halves decode to
    /// the right number of bytes.
    pub fn decode(&self) -> Result<(TokenPreimage, VerificationSignature), PassDecodeError> {
        let parts = self.0.split(|byte| *byte == DELIMITER).collect::<Vec<_>>();
        let [preimage, signature] = parts.as_slice() else {
            return Err(PassDecodeError::Delimiter(parts.len().saturating_sub(1)));
        };

        let preimage = decode_part::<TOKEN_PREIMAGE_LENGTH>("preimage", preimage)?;
        let signature = decode_part::<VERIFICATION_SIGNATURE_LENGTH>("signature", signature)?;

        Ok((
            TokenPreimage::from_bytes(preimage),
            VerificationSignature::from_bytes(signature),
        ))
    }
}

fn decode_part<const LENGTH: usize>(
    part: &'static str,
    encoded: &[u8],
) -> Result<[u8; LENGTH], PassDecodeError> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|error| PassDecodeError::Base64 {
            part,
            reason: error.to_string(),
        })?;
    let actual = decoded.len();
    <[u8; LENGTH]>::try_from(decoded).map_err(|_| PassDecodeError::Length {
        part,
        expected: LENGTH,
        actual,
    })
}

impl From<Vec<u8>> for Pass {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Pass {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Pass {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Pass {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Pass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pass")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

/// Signs `message` with each token, yielding one pass per token in the same
/// order.
pub fn tokens_to_passes(message: &str, tokens: &[UnblindedToken]) -> Vec<Pass> {
    tokens
        .iter()
        .map(|token| {
            let signature = token
                .derive_verification_key()
                .sign(message.as_bytes());
            Pass::new(token.preimage(), &signature)
        })
        .collect()
}
