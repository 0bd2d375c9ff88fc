use bakery_macaroon::MacaroonError;
use thiserror::Error;

use crate::{Response, TransportError};

/// Errors surfaced by the bakery to its callers.
#[derive(Debug, Error)]
pub enum BakeryError {
    /// A third-party discharge could not be obtained or decoded
    #[error("discharge failed: {0}")]
    DischargeFailed(String),

    /// The visit/wait flow ended in an error or ran out of attempts
    #[error("cannot interact: {0}")]
    InteractionFailed(String),

    /// A challenge arrived on a bakery created with
    /// [`crate::Bakery::without_discharge`]; the raw response is kept
    #[error("discharge required but disabled")]
    DischargeDisabled {
        /// The challenge response, untouched
        response: Response,
    },

    /// The method name is not one the bakery can send
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// The service refused to set its auth cookie
    #[error("Setting the auth cookie failed with HTTP {status}")]
    CookieRejected {
        /// Status of the refusal
        status: u16,
    },

    /// The transport failed; passed through untouched
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backing store failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A macaroon could not be built, encoded or decoded
    #[error(transparent)]
    Macaroon(#[from] MacaroonError),
}

/// Errors raised by a [`crate::KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed
    #[error("Storage backend error: {0}")]
    Backend(String),
}
