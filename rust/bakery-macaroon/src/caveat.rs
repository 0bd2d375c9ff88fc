use serde::{Deserialize, Serialize};

/// A restriction attached to a macaroon.
///
/// A caveat without a verification id is first-party and is checked by the
/// verifier itself. One with a verification id is third-party and must be
/// satisfied by a discharge macaroon whose identifier equals the caveat
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caveat {
    /// The caveat identifier (`cid`)
    #[serde(rename = "cid")]
    pub identifier: String,

    /// Sealed discharge root key (`vid`), present only for third-party caveats
    #[serde(
        rename = "vid",
        default,
        skip_serializing_if = "Option::is_none",
        with = "verification_id"
    )]
    pub verification_id: Option<Vec<u8>>,

    /// Where a discharge can be obtained (`cl`), third-party caveats only
    #[serde(rename = "cl", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Caveat {
    /// A caveat checked locally by the verifier.
    pub fn first_party(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            verification_id: None,
            location: None,
        }
    }

    /// Whether the caveat needs a discharge macaroon.
    pub fn is_third_party(&self) -> bool {
        self.verification_id.is_some()
    }
}

mod verification_id {
    use bakery_common::{decode_lenient, encode_url_safe};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&encode_url_safe(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(encoded) if encoded.is_empty() => Ok(None),
            Some(encoded) => decode_lenient(&encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
