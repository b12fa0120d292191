use thiserror::Error;

/// Raised when an encoded pass does not have the expected shape.
///
/// The server never surfaces this to a remote peer: a malformed pass is
/// simply not valid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PassDecodeError {
    /// The pass does not consist of exactly two space separated parts.
    #[error("Pass must contain exactly one delimiter, found {0}")]
    Delimiter(usize),

    /// One half of the pass is not valid base64.
    #[error("Failed to decode base64 {part}: {reason}")]
    Base64 {
        /// Which half of the pass failed to decode.
        part: &'static str,
        /// The decoder's description of the failure.
        reason: String,
    },

    /// One half of the pass decoded to the wrong number of bytes.
    #[error("Decoded {part} must be {expected} bytes, got {actual}")]
    Length {
        /// Which half of the pass had the wrong length.
        part: &'static str,
        /// The required length.
        expected: usize,
        /// The decoded length.
        actual: usize,
    },
}

/// Raised when key or token material cannot be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    /// The base64 text could not be decoded.
    #[error("Failed to decode base64 key material: {0}")]
    Base64(String),

    /// The decoded material had the wrong length.
    #[error("Key material must be {expected} bytes, got {actual}")]
    Length {
        /// The required length.
        expected: usize,
        /// The decoded length.
        actual: usize,
    },

    /// The bytes are not a canonical scalar or a valid curve point.
    #[error("Key material is not a canonical encoding")]
    NonCanonical,
}
