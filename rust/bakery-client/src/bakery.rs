//! The client side of the bakery protocol.
//!
//! A [`Bakery`] attaches stored macaroons to outgoing requests and answers
//! the two challenges a bakery-aware service can send back:
//!
//! - `macaroon discharge required`: every third-party caveat of the offered
//!   macaroon is discharged (recursively), the bound set is stored for the
//!   service and the request is sent again.
//! - `interaction required`: the user is sent to the visit URL and the wait
//!   URL is polled until the interaction settles, then the request is sent
//!   again.
//!
//! A request is retried at most once. Anything else a service answers is
//! handed back untouched.

use std::sync::Arc;

use async_trait::async_trait;
use bakery_macaroon::{
    AcquireDischarge, Caveat, Macaroon, discharge_all, import_macaroons, serialize_macaroons,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::{
    BakeryConfig, BakeryError, BakeryStorage, Challenge, ChallengeCode, ChallengeInfo, Headers,
    KeyValueStore, Method, OpenInBrowser, Request, Response, Transport, Visitor,
    protocol::{
        CONTENT_TYPE_HEADER, MACAROONS_HEADER, MAX_INTERACTION_ATTEMPTS, PROTOCOL_VERSION,
        PROTOCOL_VERSION_HEADER, bakery_headers, requires_credentials,
    },
};

/// Sends requests on behalf of a user, obtaining and presenting the
/// macaroons the target services ask for.
pub struct Bakery<T, S> {
    transport: Arc<T>,
    storage: Arc<BakeryStorage<S>>,
    visitor: Arc<dyn Visitor>,
    discharge: bool,
}

impl<T, S> Clone for Bakery<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            storage: self.storage.clone(),
            visitor: self.visitor.clone(),
            discharge: self.discharge,
        }
    }
}

impl<T, S> Bakery<T, S>
where
    T: Transport,
    S: KeyValueStore,
{
    /// A bakery that answers challenges and opens interaction pages with
    /// [`OpenInBrowser`].
    pub fn new(transport: T, storage: BakeryStorage<S>) -> Self {
        Self {
            transport: Arc::new(transport),
            storage: Arc::new(storage),
            visitor: Arc::new(OpenInBrowser),
            discharge: true,
        }
    }

    /// Build a bakery from configuration, storing macaroons in `store`.
    pub fn from_config(config: BakeryConfig, transport: T, store: S) -> Self {
        let mut bakery = Self::new(transport, BakeryStorage::new(store, config.services));
        bakery.discharge = config.discharge;
        bakery
    }

    /// Replace the hook that shows interaction pages to the user.
    pub fn with_visitor(mut self, visitor: impl Visitor + 'static) -> Self {
        self.visitor = Arc::new(visitor);
        self
    }

    /// A bakery sharing this one's transport, storage and visitor that never
    /// answers challenges. Challenged requests fail with
    /// [`BakeryError::DischargeDisabled`] carrying the raw response.
    pub fn without_discharge(&self) -> Self {
        Self {
            discharge: false,
            ..self.clone()
        }
    }

    /// The macaroon storage.
    pub fn storage(&self) -> &BakeryStorage<S> {
        &self.storage
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request, answering a discharge or interaction challenge and
    /// retrying once if the service responds with one.
    ///
    /// `method` is matched case-insensitively. Responses that are not
    /// challenges, including the response to the retry, are returned as they
    /// are.
    pub async fn send_request(
        &self,
        url: &str,
        method: &str,
        headers: Headers,
        body: Option<String>,
    ) -> Result<Response, BakeryError> {
        let method: Method = method.parse()?;
        let response = self
            .dispatch(url, method, headers.clone(), body.clone())
            .await?;

        let Some(challenge) = Challenge::from_response(&response) else {
            return Ok(response);
        };

        match &challenge.code {
            ChallengeCode::Other(_) => return Ok(response),
            _ if !self.discharge => {
                info!(url, code = ?challenge.code, "Challenge received with discharge disabled");
                return Err(BakeryError::DischargeDisabled { response });
            }
            ChallengeCode::DischargeRequired => {
                info!(url, "Discharge required");
                let macaroon = challenge
                    .info
                    .macaroon()
                    .map_err(|error| BakeryError::DischargeFailed(error.to_string()))?
                    .ok_or_else(|| {
                        BakeryError::DischargeFailed("challenge carries no macaroon".into())
                    })?;
                self.discharge_and_store(url, &macaroon).await?;
            }
            ChallengeCode::InteractionRequired => {
                info!(url, "Interaction required");
                if let Some(macaroon) = self.interact(&challenge.info).await? {
                    self.discharge_and_store(url, &macaroon).await?;
                }
            }
        }

        debug!(url, %method, "Retrying request");
        self.dispatch(url, method, headers, body).await
    }

    /// `GET url`
    pub async fn get(&self, url: &str) -> Result<Response, BakeryError> {
        self.send_request(url, Method::Get.as_str(), Headers::new(), None)
            .await
    }

    /// `POST url` with `body`
    pub async fn post(&self, url: &str, body: impl Into<String>) -> Result<Response, BakeryError> {
        self.send_request(url, Method::Post.as_str(), Headers::new(), Some(body.into()))
            .await
    }

    /// `PUT url` with `body`
    pub async fn put(&self, url: &str, body: impl Into<String>) -> Result<Response, BakeryError> {
        self.send_request(url, Method::Put.as_str(), Headers::new(), Some(body.into()))
            .await
    }

    /// `PATCH url` with `body`
    pub async fn patch(&self, url: &str, body: impl Into<String>) -> Result<Response, BakeryError> {
        self.send_request(url, Method::Patch.as_str(), Headers::new(), Some(body.into()))
            .await
    }

    /// `DELETE url`
    pub async fn delete(&self, url: &str) -> Result<Response, BakeryError> {
        self.send_request(url, Method::Delete.as_str(), Headers::new(), None)
            .await
    }

    /// Discharge every third-party caveat of `macaroon`, including those
    /// introduced by the discharges themselves.
    ///
    /// Returns `macaroon` followed by its discharges, each bound to it. Any
    /// failure to obtain a discharge is reported as
    /// [`BakeryError::DischargeFailed`] unless an interaction failed first.
    pub async fn discharge(&self, macaroon: &Macaroon) -> Result<Vec<Macaroon>, BakeryError> {
        discharge_all(macaroon, self).await.map_err(|error| {
            warn!(%error, identifier = macaroon.identifier(), "Discharge failed");
            match error {
                BakeryError::DischargeFailed(_) | BakeryError::InteractionFailed(_) => error,
                error => BakeryError::DischargeFailed(error.to_string()),
            }
        })
    }

    /// Ask the service at the caveat's location for a discharge macaroon by
    /// posting `id=<caveat id>&location=<first party location>` to its
    /// `/discharge` endpoint.
    ///
    /// If the third party wants the user to interact first, the macaroon
    /// returned by its wait endpoint is the discharge.
    pub async fn third_party_discharge(
        &self,
        first_party_location: &str,
        caveat: &Caveat,
    ) -> Result<Macaroon, BakeryError> {
        let location = caveat.location.as_deref().ok_or_else(|| {
            BakeryError::DischargeFailed(format!(
                "caveat {:?} has no third-party location",
                caveat.identifier
            ))
        })?;
        let url = format!("{}/discharge", location.trim_end_matches('/'));
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("id", &caveat.identifier)
            .append_pair("location", first_party_location)
            .finish();

        let mut headers = Headers::new();
        headers.insert(
            CONTENT_TYPE_HEADER.into(),
            "application/x-www-form-urlencoded".into(),
        );

        debug!(url, caveat = %caveat.identifier, "Requesting discharge");
        let response = self
            .dispatch(&url, Method::Post, headers, Some(body))
            .await
            .map_err(|error| BakeryError::DischargeFailed(error.to_string()))?;

        if response.is_success() {
            return decode_discharge(&response.body);
        }

        match Challenge::from_response(&response) {
            Some(challenge) if challenge.code == ChallengeCode::InteractionRequired => {
                info!(url, "Third party requires interaction");
                self.interact(&challenge.info).await?.ok_or_else(|| {
                    BakeryError::DischargeFailed(
                        "interaction completed without a discharge macaroon".into(),
                    )
                })
            }
            Some(challenge) => Err(BakeryError::DischargeFailed(challenge.reason())),
            None => Err(BakeryError::DischargeFailed(format!(
                "{url} responded with HTTP {}",
                response.status
            ))),
        }
    }

    /// Send the user to the visit URL, then poll the wait URL until it
    /// answers.
    ///
    /// The wait URL is polled at most [`MAX_INTERACTION_ATTEMPTS`] times.
    /// Failing to get any response is a reason to poll again; the first
    /// response is final. It fails the interaction if its body carries an
    /// error (`Message` or `Code`), whatever its status. Otherwise the
    /// interaction is complete and the macaroon it carries (if any) is
    /// returned.
    pub async fn interact(&self, info: &ChallengeInfo) -> Result<Option<Macaroon>, BakeryError> {
        let visit_url = info
            .visit_url
            .as_deref()
            .ok_or_else(|| BakeryError::InteractionFailed("no visit URL in challenge".into()))?;
        let wait_url = info
            .wait_url
            .as_deref()
            .ok_or_else(|| BakeryError::InteractionFailed("no wait URL in challenge".into()))?;

        info!(visit_url, "Visiting interaction page");
        self.visitor.visit(visit_url).await?;

        for attempt in 1..=MAX_INTERACTION_ATTEMPTS {
            let mut headers = bakery_headers();
            headers.insert(CONTENT_TYPE_HEADER.into(), "application/json".into());

            let request = Request {
                method: Method::Get,
                url: wait_url.to_string(),
                headers,
                body: None,
                credentials: requires_credentials(Method::Get, wait_url),
            };

            match self.transport.send(request).await {
                Ok(response) if response.status != 0 => {
                    return wait_outcome(response).inspect_err(|error| {
                        warn!(%error, wait_url, "Interaction failed");
                    });
                }
                Ok(_) => debug!(attempt, wait_url, "Wait endpoint gave no response"),
                Err(error) => debug!(attempt, wait_url, %error, "Wait endpoint unreachable"),
            }
        }

        warn!(wait_url, "Interaction timed out");
        Err(BakeryError::InteractionFailed(format!(
            "no response from {wait_url} after {MAX_INTERACTION_ATTEMPTS} attempts"
        )))
    }

    async fn discharge_and_store(&self, url: &str, macaroon: &Macaroon) -> Result<(), BakeryError> {
        let macaroons = self.discharge(macaroon).await?;
        self.storage
            .set(url, serialize_macaroons(&macaroons)?)
            .await
    }

    async fn dispatch(
        &self,
        url: &str,
        method: Method,
        mut headers: Headers,
        body: Option<String>,
    ) -> Result<Response, BakeryError> {
        headers.insert(PROTOCOL_VERSION_HEADER.into(), PROTOCOL_VERSION.into());
        if let Some(macaroons) = self.storage.get(url).await? {
            headers.insert(MACAROONS_HEADER.into(), macaroons);
        }
        let credentials = requires_credentials(method, url);

        debug!(url, %method, credentials, "Sending request");
        let response = self
            .transport
            .send(Request {
                method,
                url: url.to_string(),
                headers,
                body,
                credentials,
            })
            .await?;
        debug!(url, status = response.status, "Received response");

        Ok(response)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T, S> AcquireDischarge for Bakery<T, S>
where
    T: Transport,
    S: KeyValueStore,
{
    type Error = BakeryError;

    async fn acquire_discharge(
        &self,
        first_party_location: &str,
        caveat: &Caveat,
    ) -> Result<Macaroon, BakeryError> {
        self.third_party_discharge(first_party_location, caveat)
            .await
    }
}

#[derive(Deserialize)]
struct DischargeResponse {
    #[serde(rename = "Macaroon")]
    macaroon: Value,
}

/// A discharge endpoint answers `{"Macaroon": ...}`, though a bare macaroon
/// is accepted too.
fn decode_discharge(body: &str) -> Result<Macaroon, BakeryError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|error| BakeryError::DischargeFailed(format!("malformed response: {error}")))?;

    let value = match serde_json::from_value::<DischargeResponse>(value.clone()) {
        Ok(response) => response.macaroon,
        Err(_) => value,
    };

    import_macaroons(value)
        .map_err(|error| BakeryError::DischargeFailed(error.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| BakeryError::DischargeFailed("response carries no macaroon".into()))
}

#[derive(Deserialize, Default)]
struct WaitResponse {
    #[serde(rename = "Macaroon", default)]
    macaroon: Option<Value>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Code", default)]
    code: Option<String>,
}

fn wait_outcome(response: Response) -> Result<Option<Macaroon>, BakeryError> {
    let body = response
        .may_be_json()
        .then(|| serde_json::from_str::<WaitResponse>(&response.body).ok())
        .flatten()
        .unwrap_or_default();

    if let Some(reason) = body.message.or(body.code) {
        return Err(BakeryError::InteractionFailed(reason));
    }
    if !response.is_success() {
        debug!(status = response.status, "Wait endpoint answered without an error body");
    }

    match body.macaroon {
        None => Ok(None),
        Some(value) => Ok(import_macaroons(value)
            .map_err(|error| BakeryError::InteractionFailed(error.to_string()))?
            .into_iter()
            .next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_reads_wrapped_and_bare_discharges() {
        let macaroon = Macaroon::new(b"third party", "caveat", "https://tp").unwrap();
        let exported = macaroon.export().unwrap();

        let wrapped = json!({"Macaroon": exported}).to_string();
        assert_eq!(decode_discharge(&wrapped).unwrap(), macaroon);

        let bare = exported.to_string();
        assert_eq!(decode_discharge(&bare).unwrap(), macaroon);

        assert!(matches!(
            decode_discharge("nope"),
            Err(BakeryError::DischargeFailed(_))
        ));
    }

    #[test]
    fn it_fails_interaction_on_embedded_errors() {
        let response = Response::json(200, &json!({"Code": "bad", "Message": "login denied"}));
        let error = wait_outcome(response).unwrap_err();
        assert_eq!(error.to_string(), "cannot interact: login denied");

        let response = Response::json(403, &json!({"Message": "login cancelled"}));
        let error = wait_outcome(response).unwrap_err();
        assert_eq!(error.to_string(), "cannot interact: login cancelled");
    }

    #[test]
    fn it_completes_interaction_on_errors_without_a_body() {
        let response = Response::new(500, "<html/>").with_header("Content-Type", "text/html");
        assert_eq!(wait_outcome(response).unwrap(), None);

        assert_eq!(wait_outcome(Response::new(502, "bad gateway")).unwrap(), None);
    }

    #[test]
    fn it_completes_interaction_with_or_without_a_macaroon() {
        assert_eq!(wait_outcome(Response::new(200, "")).unwrap(), None);
        assert_eq!(
            wait_outcome(Response::json(200, &json!({"Macaroon": null}))).unwrap(),
            None
        );

        let macaroon = Macaroon::new(b"key", "wait", "https://id").unwrap();
        let response = Response::json(200, &json!({"Macaroon": macaroon.export().unwrap()}));
        assert_eq!(wait_outcome(response).unwrap(), Some(macaroon));
    }
}
