//! Macaroon verification.
//!
//! Verification replays the signature chain from the root key:
//!
//! 1. Derive the MAC key from the root key and hash the identifier.
//! 2. For each caveat in order, either ask the first-party checker about it or
//!    recover the discharge key from its verification id and recursively
//!    verify the matching discharge macaroon. Then fold the caveat into the
//!    running signature.
//! 3. Bind the final signature to the root signature and compare.
//! 4. At the top level, require that every discharge was used exactly once.
//!
//! A discharge's use counter is incremented *before* recursing into it, which
//! is what stops discharges that reference each other from recursing forever.

use tracing::debug;

use crate::{
    Macaroon, VerificationError,
    crypto::{self, Signature},
};

impl Macaroon {
    /// Verify this macaroon against its root key and a set of discharges.
    ///
    /// `check` is called with the identifier of every first-party caveat,
    /// including those on discharges; `Err(reason)` rejects the caveat.
    /// Every discharge in `discharges` must already be bound to this
    /// macaroon's signature and must satisfy exactly one third-party caveat.
    pub fn verify<F>(
        &self,
        root_key: &[u8],
        check: F,
        discharges: &[Macaroon],
    ) -> Result<(), VerificationError>
    where
        F: Fn(&str) -> Result<(), String>,
    {
        let mut verification = Verification {
            root_signature: &self.signature,
            check: &check,
            discharges,
            used: vec![0; discharges.len()],
        };

        verification.verify(self, &crypto::derive_key(root_key))?;

        if let Some(index) = verification.used.iter().position(|count| *count == 0) {
            return Err(VerificationError::DischargeNotUsed(
                discharges[index].identifier.clone(),
            ));
        }

        Ok(())
    }
}

struct Verification<'a, F> {
    root_signature: &'a Signature,
    check: &'a F,
    discharges: &'a [Macaroon],
    used: Vec<usize>,
}

impl<F> Verification<'_, F>
where
    F: Fn(&str) -> Result<(), String>,
{
    fn verify(&mut self, macaroon: &Macaroon, key: &Signature) -> Result<(), VerificationError> {
        let mut caveat_signature = crypto::keyed_hash(key, macaroon.identifier.as_bytes());

        for caveat in &macaroon.caveats {
            match &caveat.verification_id {
                None => {
                    (self.check)(&caveat.identifier).map_err(|reason| {
                        VerificationError::CaveatNotSatisfied {
                            identifier: caveat.identifier.clone(),
                            reason,
                        }
                    })?;
                }
                Some(verification_id) => {
                    let discharge_key: Signature =
                        crypto::decrypt(&caveat_signature, verification_id)
                            .and_then(|key| key.try_into().ok())
                            .ok_or(VerificationError::DecryptionFailed)?;

                    let discharges = self.discharges;
                    let index = discharges
                        .iter()
                        .position(|discharge| discharge.identifier == caveat.identifier)
                        .ok_or_else(|| {
                            VerificationError::DischargeNotFound(caveat.identifier.clone())
                        })?;

                    self.used[index] += 1;
                    if self.used[index] > 1 {
                        return Err(VerificationError::DischargeUsedMoreThanOnce(
                            caveat.identifier.clone(),
                        ));
                    }

                    debug!(caveat = %caveat.identifier, "Verifying discharge macaroon");
                    self.verify(&discharges[index], &discharge_key)?;
                }
            }

            caveat_signature = crypto::keyed_hash2(
                &caveat_signature,
                caveat.verification_id.as_deref(),
                caveat.identifier.as_bytes(),
            );
        }

        let bound = crypto::bind_for_request(self.root_signature, &caveat_signature);
        if !crypto::signatures_equal(&bound, &macaroon.signature) {
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(())
    }
}
