use serde::{Deserialize, Serialize};

use crate::{
    Caveat, MacaroonError,
    crypto::{self, Signature},
    wire::WireMacaroon,
};

/// A bearer capability token: an identifier, an advisory location and an
/// ordered list of caveats, all covered by a chained HMAC signature.
///
/// `Macaroon` is a value. Attenuating it ([`Macaroon::add_first_party_caveat`],
/// [`Macaroon::add_third_party_caveat`]) or binding it ([`Macaroon::bind`])
/// consumes the macaroon and returns the successor with its re-derived
/// signature, so the signature always matches the caveat chain it covers.
/// Clone first to keep the original around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireMacaroon", try_from = "WireMacaroon")]
pub struct Macaroon {
    pub(crate) location: String,
    pub(crate) identifier: String,
    pub(crate) signature: Signature,
    pub(crate) caveats: Vec<Caveat>,
}

impl Macaroon {
    /// Mint a new macaroon from a secret root key.
    ///
    /// # Errors
    ///
    /// Returns [`MacaroonError::InvalidArgument`] when the root key,
    /// identifier or location is empty.
    pub fn new(
        root_key: &[u8],
        identifier: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        let identifier = identifier.into();
        let location = location.into();

        if root_key.is_empty() {
            return Err(MacaroonError::invalid_argument("root key must not be empty"));
        }
        if identifier.is_empty() {
            return Err(MacaroonError::invalid_argument("identifier must not be empty"));
        }
        if location.is_empty() {
            return Err(MacaroonError::invalid_argument("location must not be empty"));
        }

        let signature = crypto::keyed_hash(&crypto::derive_key(root_key), identifier.as_bytes());

        Ok(Self {
            location,
            identifier,
            signature,
            caveats: Vec::new(),
        })
    }

    /// Reassemble a macaroon from a known signature, skipping key derivation.
    ///
    /// Nothing is checked beyond a non-empty identifier; a macaroon assembled
    /// from inconsistent parts simply fails [`Macaroon::verify`].
    pub fn from_parts(
        identifier: impl Into<String>,
        location: impl Into<String>,
        signature: Signature,
        caveats: Vec<Caveat>,
    ) -> Result<Self, MacaroonError> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return Err(MacaroonError::invalid_argument("identifier must not be empty"));
        }

        Ok(Self {
            location: location.into(),
            identifier,
            signature,
            caveats,
        })
    }

    /// The advisory location of the target service.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The macaroon identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The current signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The caveats in the order they were added.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Caveats that need a discharge macaroon.
    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|caveat| caveat.is_third_party())
    }

    /// Append a caveat and fold it into the signature chain.
    ///
    /// Without a verification id the caveat is first-party and `location` is
    /// ignored. With one, `location` is required.
    pub fn add_caveat(
        mut self,
        caveat_id: impl Into<String>,
        verification_id: Option<Vec<u8>>,
        location: Option<String>,
    ) -> Result<Self, MacaroonError> {
        let identifier = caveat_id.into();
        if identifier.is_empty() {
            return Err(MacaroonError::invalid_argument("caveat id must not be empty"));
        }

        let location = match &verification_id {
            None => None,
            Some(verification_id) if verification_id.is_empty() => {
                return Err(MacaroonError::invalid_argument(
                    "verification id must not be empty",
                ));
            }
            Some(_) => match location {
                Some(location) if !location.is_empty() => Some(location),
                _ => {
                    return Err(MacaroonError::invalid_argument(
                        "third-party caveat requires a location",
                    ));
                }
            },
        };

        self.signature = crypto::keyed_hash2(
            &self.signature,
            verification_id.as_deref(),
            identifier.as_bytes(),
        );
        self.caveats.push(Caveat {
            identifier,
            verification_id,
            location,
        });

        Ok(self)
    }

    /// Append a caveat the verifier checks locally.
    pub fn add_first_party_caveat(
        self,
        caveat_id: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        self.add_caveat(caveat_id, None, None)
    }

    /// Append a caveat that must be discharged by the service at `location`.
    ///
    /// `root_key` is the discharge root key the third party will mint its
    /// discharge macaroon with. It is sealed under the current signature, so
    /// only a verifier replaying this exact chain can recover it.
    pub fn add_third_party_caveat(
        self,
        root_key: &[u8],
        caveat_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, MacaroonError> {
        if root_key.is_empty() {
            return Err(MacaroonError::invalid_argument("root key must not be empty"));
        }
        let verification_id = crypto::encrypt(&self.signature, &crypto::derive_key(root_key))?;
        self.add_caveat(caveat_id, Some(verification_id), Some(location.into()))
    }

    /// Bind this (discharge) macaroon to the signature of the macaroon it
    /// will be presented with. Binding to its own signature is a no-op.
    pub fn bind(mut self, parent_signature: &Signature) -> Self {
        self.signature = crypto::bind_for_request(parent_signature, &self.signature);
        self
    }

    /// The signature as lowercase hex, as it appears on the wire.
    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KEY_LENGTH, keyed_hash, keyed_hash2};

    const ROOT_KEY: &[u8] = b"this is our super secret key; only we should know it";

    #[test]
    fn it_requires_identifier_location_and_root_key() {
        assert!(matches!(
            Macaroon::new(ROOT_KEY, "", "here"),
            Err(MacaroonError::InvalidArgument(_))
        ));
        assert!(matches!(
            Macaroon::new(ROOT_KEY, "id", ""),
            Err(MacaroonError::InvalidArgument(_))
        ));
        assert!(matches!(
            Macaroon::new(&[], "id", "here"),
            Err(MacaroonError::InvalidArgument(_))
        ));
    }

    #[test]
    fn it_produces_the_reference_signature_for_a_zero_key() {
        let macaroon = Macaroon::new(&[0u8; KEY_LENGTH], "test", "here").unwrap();
        assert_eq!(
            macaroon.signature_hex(),
            "586f2e8fd0a8aac61afb5c64c44def4a028aaf69b1603407ff569c0aed921cbb"
        );
    }

    #[test]
    fn it_chains_first_party_caveats_into_the_signature() {
        let macaroon = Macaroon::new(&[0u8; KEY_LENGTH], "test", "here").unwrap();
        let before = *macaroon.signature();

        let macaroon = macaroon
            .add_first_party_caveat("account = 3735928559")
            .unwrap();

        assert_eq!(macaroon.signature(), &keyed_hash(&before, b"account = 3735928559"));
        assert_eq!(
            macaroon.signature_hex(),
            "f662c2ac38c4f3192c460830e3a0236525ea412b1b36b45f38ac70e4433c904a"
        );
        assert_eq!(macaroon.caveats(), &[Caveat::first_party("account = 3735928559")]);
    }

    #[test]
    fn it_chains_third_party_caveats_over_their_verification_id() {
        let macaroon = Macaroon::new(ROOT_KEY, "id", "here").unwrap();
        let before = *macaroon.signature();

        let macaroon = macaroon
            .add_third_party_caveat(b"caveat key", "user = bob", "https://auth.example.com")
            .unwrap();

        let caveat = &macaroon.caveats()[0];
        assert!(caveat.is_third_party());
        assert_eq!(caveat.location.as_deref(), Some("https://auth.example.com"));

        let vid = caveat.verification_id.as_deref().unwrap();
        assert_eq!(
            macaroon.signature(),
            &keyed_hash2(&before, Some(vid), b"user = bob")
        );
        assert_eq!(
            crypto::decrypt(&before, vid).unwrap(),
            crypto::derive_key(b"caveat key")
        );
    }

    #[test]
    fn it_rejects_malformed_caveats() {
        let macaroon = Macaroon::new(ROOT_KEY, "id", "here").unwrap();

        assert!(macaroon.clone().add_first_party_caveat("").is_err());
        assert!(
            macaroon
                .clone()
                .add_caveat("cav", Some(vec![1, 2, 3]), None)
                .is_err()
        );
        assert!(
            macaroon
                .clone()
                .add_caveat("cav", Some(vec![]), Some("loc".into()))
                .is_err()
        );
        assert!(
            macaroon
                .add_third_party_caveat(&[], "cav", "https://auth.example.com")
                .is_err()
        );
    }

    #[test]
    fn it_leaves_clones_independent() {
        let original = Macaroon::new(ROOT_KEY, "id", "here").unwrap();
        let attenuated = original
            .clone()
            .add_first_party_caveat("time < 2030")
            .unwrap();

        assert!(original.caveats().is_empty());
        assert_eq!(attenuated.caveats().len(), 1);
        assert_ne!(original.signature(), attenuated.signature());
    }

    #[test]
    fn it_binds_only_to_a_different_signature() {
        let root = Macaroon::new(ROOT_KEY, "root", "here").unwrap();
        let discharge = Macaroon::new(b"other key", "discharge", "there").unwrap();

        let same = root.clone().bind(root.signature());
        assert_eq!(same.signature(), root.signature());

        let bound = discharge.clone().bind(root.signature());
        assert_ne!(bound.signature(), discharge.signature());
        assert_eq!(
            bound.signature(),
            &crypto::bind_for_request(root.signature(), discharge.signature())
        );
    }
}
