//! Error types for macaroon construction and verification.

use thiserror::Error;

/// Errors raised while building, attenuating or (de)serializing a macaroon.
///
/// These are local and never retried.
#[derive(Debug, Error)]
pub enum MacaroonError {
    /// A required argument was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sealing a third-party caveat key failed.
    #[error("Encryption failed")]
    EncryptionFailed,

    /// The operating system RNG was unavailable.
    #[error("RNG error: {0}")]
    Rng(String),

    /// A serialized macaroon could not be decoded.
    #[error("Failed to decode macaroon: {0}")]
    DecodeFailed(String),

    /// A macaroon could not be serialized.
    #[error("Failed to encode macaroon: {0}")]
    EncodeFailed(String),

    /// Discharging kept producing new third-party caveats.
    #[error("More than {0} discharges required")]
    TooManyDischarges(usize),
}

impl MacaroonError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Reasons a macaroon failed verification.
///
/// Verification either succeeds or yields exactly one of these; nothing is
/// swallowed and nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The first-party checker rejected a caveat.
    #[error("caveat {identifier:?} not satisfied: {reason}")]
    CaveatNotSatisfied {
        /// The rejected caveat identifier
        identifier: String,
        /// Reason reported by the checker
        reason: String,
    },

    /// A third-party caveat's verification id could not be opened with the
    /// signature chain state at that caveat.
    #[error("decryption failed")]
    DecryptionFailed,

    /// No discharge was supplied for a third-party caveat.
    #[error("cannot find discharge macaroon for caveat {0:?}")]
    DischargeNotFound(String),

    /// A discharge satisfied more than one caveat, or took part in a cycle.
    #[error("discharge macaroon {0:?} was used more than once")]
    DischargeUsedMoreThanOnce(String),

    /// A supplied discharge was never needed.
    #[error("discharge macaroon {0:?} was not used")]
    DischargeNotUsed(String),

    /// The recomputed signature chain does not match the macaroon.
    #[error("signature mismatch after caveat verification")]
    SignatureMismatch,
}
