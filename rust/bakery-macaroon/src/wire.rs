//! JSON wire format and serialized macaroon blobs.
//!
//! A macaroon travels as
//! `{"location", "identifier", "signature": <hex>, "caveats": [{"cid", "vid"?, "cl"?}]}`
//! with `vid` in URL-safe unpadded base64. A blob, used both as the stored
//! value for a service and as the `Macaroons` header, is the standard base64
//! encoding of a JSON array of macaroons.

use bakery_common::{decode_standard, encode_standard};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Caveat, Macaroon, MacaroonError, crypto::KEY_LENGTH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMacaroon {
    #[serde(default)]
    location: String,
    identifier: String,
    signature: String,
    #[serde(default)]
    caveats: Vec<Caveat>,
}

impl From<Macaroon> for WireMacaroon {
    fn from(macaroon: Macaroon) -> Self {
        Self {
            signature: hex::encode(macaroon.signature),
            location: macaroon.location,
            identifier: macaroon.identifier,
            caveats: macaroon.caveats,
        }
    }
}

impl TryFrom<WireMacaroon> for Macaroon {
    type Error = MacaroonError;

    fn try_from(wire: WireMacaroon) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&wire.signature)
            .map_err(|error| MacaroonError::DecodeFailed(format!("invalid signature: {error}")))?;
        let signature: [u8; KEY_LENGTH] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            MacaroonError::DecodeFailed(format!(
                "invalid signature length: expected {KEY_LENGTH}, got {}",
                bytes.len()
            ))
        })?;

        Macaroon::from_parts(wire.identifier, wire.location, signature, wire.caveats)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Macaroon>),
    One(Box<Macaroon>),
}

impl Macaroon {
    /// Export as a JSON object in the wire format.
    pub fn export(&self) -> Result<Value, MacaroonError> {
        serde_json::to_value(self).map_err(|error| MacaroonError::EncodeFailed(error.to_string()))
    }
}

/// Reconstruct macaroons from a wire-format JSON object or array of objects.
pub fn import_macaroons(value: Value) -> Result<Vec<Macaroon>, MacaroonError> {
    let decoded: OneOrMany = serde_json::from_value(value)
        .map_err(|error| MacaroonError::DecodeFailed(error.to_string()))?;

    Ok(match decoded {
        OneOrMany::Many(macaroons) => macaroons,
        OneOrMany::One(macaroon) => vec![*macaroon],
    })
}

/// Encode macaroons as an opaque blob for storage or the `Macaroons` header.
pub fn serialize_macaroons(macaroons: &[Macaroon]) -> Result<String, MacaroonError> {
    let json =
        serde_json::to_vec(macaroons).map_err(|error| MacaroonError::EncodeFailed(error.to_string()))?;
    Ok(encode_standard(&json))
}

/// Decode a blob produced by [`serialize_macaroons`].
pub fn deserialize_macaroons(blob: &str) -> Result<Vec<Macaroon>, MacaroonError> {
    let json = decode_standard(blob.trim())
        .map_err(|error| MacaroonError::DecodeFailed(error.to_string()))?;
    let value: Value = serde_json::from_slice(&json)
        .map_err(|error| MacaroonError::DecodeFailed(error.to_string()))?;
    import_macaroons(value)
}
