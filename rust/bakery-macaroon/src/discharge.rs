use std::collections::VecDeque;

use async_trait::async_trait;
use bakery_common::{ConditionalSend, ConditionalSync};
use tracing::{debug, warn};

use crate::{Caveat, Macaroon, MacaroonError};

/// Upper bound on the discharges gathered for a single macaroon, nested ones
/// included.
pub const MAX_DISCHARGES: usize = 64;

/// Something that can obtain a discharge macaroon for a third-party caveat,
/// usually by asking the service at the caveat's location.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait AcquireDischarge: ConditionalSync {
    /// The error produced when a discharge cannot be obtained
    type Error: ConditionalSend;

    /// Obtain a discharge for `caveat`, which appeared on a macaroon whose
    /// location is `first_party_location`.
    async fn acquire_discharge(
        &self,
        first_party_location: &str,
        caveat: &Caveat,
    ) -> Result<Macaroon, Self::Error>;
}

/// Gather every discharge `macaroon` needs.
///
/// Third-party caveats on `macaroon` are discharged first, then any
/// third-party caveats carried by the discharges themselves, until nothing is
/// left. The result is `macaroon` followed by every discharge bound to its
/// signature, ready to be presented together. The first failure aborts the
/// whole gathering, as does needing more than [`MAX_DISCHARGES`] discharges.
pub async fn discharge_all<A>(macaroon: &Macaroon, acquirer: &A) -> Result<Vec<Macaroon>, A::Error>
where
    A: AcquireDischarge,
    A::Error: From<MacaroonError>,
{
    let mut pending: VecDeque<(String, Caveat)> = macaroon
        .third_party_caveats()
        .map(|caveat| (macaroon.location.clone(), caveat.clone()))
        .collect();
    let mut discharges = Vec::new();

    while let Some((first_party_location, caveat)) = pending.pop_front() {
        if discharges.len() >= MAX_DISCHARGES {
            warn!(limit = MAX_DISCHARGES, "Giving up on discharging");
            return Err(MacaroonError::TooManyDischarges(MAX_DISCHARGES).into());
        }
        debug!(
            caveat = %caveat.identifier,
            location = caveat.location.as_deref().unwrap_or_default(),
            "Acquiring discharge"
        );
        let discharge = acquirer
            .acquire_discharge(&first_party_location, &caveat)
            .await?;

        pending.extend(
            discharge
                .third_party_caveats()
                .map(|caveat| (discharge.location.clone(), caveat.clone())),
        );
        discharges.push(discharge);
    }

    let root_signature = macaroon.signature;
    let mut macaroons = Vec::with_capacity(discharges.len() + 1);
    macaroons.push(macaroon.clone());
    macaroons.extend(
        discharges
            .into_iter()
            .map(|discharge| discharge.bind(&root_signature)),
    );

    Ok(macaroons)
}
