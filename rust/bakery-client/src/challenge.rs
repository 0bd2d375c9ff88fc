//! Bakery challenges carried by failed responses.

use bakery_macaroon::{Macaroon, MacaroonError, import_macaroons};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    Response,
    protocol::{DISCHARGE_REQUIRED, INTERACTION_REQUIRED},
};

/// What a challenge asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ChallengeCode {
    /// Discharge the third-party caveats of `Info.Macaroon`
    DischargeRequired,
    /// Have the user visit `Info.VisitURL`, then poll `Info.WaitURL`
    InteractionRequired,
    /// Any other error code; not handled by the bakery
    Other(String),
}

impl From<String> for ChallengeCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            DISCHARGE_REQUIRED => ChallengeCode::DischargeRequired,
            INTERACTION_REQUIRED => ChallengeCode::InteractionRequired,
            _ => ChallengeCode::Other(code),
        }
    }
}

/// The `Info` object of a challenge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChallengeInfo {
    /// The macaroon to discharge, in wire format
    #[serde(rename = "Macaroon", default)]
    pub macaroon: Option<Value>,

    /// Page the user should visit
    #[serde(rename = "VisitURL", default)]
    pub visit_url: Option<String>,

    /// Endpoint that answers once the visit is complete
    #[serde(rename = "WaitURL", default)]
    pub wait_url: Option<String>,
}

impl ChallengeInfo {
    /// Decode the challenge macaroon, if one was sent.
    pub fn macaroon(&self) -> Result<Option<Macaroon>, MacaroonError> {
        match &self.macaroon {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(import_macaroons(value.clone())?.into_iter().next()),
        }
    }
}

/// A structured error from a bakery-aware service:
/// `{"Code": ..., "Message"?: ..., "Info"?: {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Challenge {
    /// The error code
    #[serde(rename = "Code")]
    pub code: ChallengeCode,

    /// Human readable description
    #[serde(rename = "Message", default)]
    pub message: Option<String>,

    /// Details needed to answer the challenge
    #[serde(rename = "Info", default)]
    pub info: ChallengeInfo,
}

impl Challenge {
    /// Extract the challenge from a failed, JSON-typed response. Successful,
    /// non-JSON, malformed or code-less responses carry no challenge.
    pub fn from_response(response: &Response) -> Option<Self> {
        if response.is_success() || !response.may_be_json() {
            return None;
        }
        serde_json::from_str(&response.body).ok()
    }

    /// The most useful description of the challenge.
    pub fn reason(&self) -> String {
        match (&self.message, &self.code) {
            (Some(message), _) => message.clone(),
            (None, ChallengeCode::Other(code)) => code.clone(),
            (None, ChallengeCode::DischargeRequired) => DISCHARGE_REQUIRED.to_string(),
            (None, ChallengeCode::InteractionRequired) => INTERACTION_REQUIRED.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_reads_a_discharge_challenge() {
        let macaroon = Macaroon::new(b"key", "id", "here").unwrap();
        let response = Response::json(
            401,
            &json!({
                "Code": "macaroon discharge required",
                "Message": "verification failed",
                "Info": {"Macaroon": macaroon.export().unwrap()}
            }),
        );

        let challenge = Challenge::from_response(&response).unwrap();
        assert_eq!(challenge.code, ChallengeCode::DischargeRequired);
        assert_eq!(challenge.reason(), "verification failed");
        assert_eq!(challenge.info.macaroon().unwrap(), Some(macaroon));
    }

    #[test]
    fn it_reads_an_interaction_challenge() {
        let response = Response::json(
            401,
            &json!({
                "Code": "interaction required",
                "Info": {"VisitURL": "https://id/visit", "WaitURL": "https://id/wait"}
            }),
        );

        let challenge = Challenge::from_response(&response).unwrap();
        assert_eq!(challenge.code, ChallengeCode::InteractionRequired);
        assert_eq!(challenge.info.visit_url.as_deref(), Some("https://id/visit"));
        assert_eq!(challenge.info.wait_url.as_deref(), Some("https://id/wait"));
        assert_eq!(challenge.info.macaroon().unwrap(), None);
    }

    #[test]
    fn it_keeps_unknown_codes() {
        let response = Response::json(403, &json!({"Code": "forbidden"}));
        let challenge = Challenge::from_response(&response).unwrap();
        assert_eq!(challenge.code, ChallengeCode::Other("forbidden".into()));
        assert_eq!(challenge.reason(), "forbidden");
    }

    #[test]
    fn it_ignores_responses_without_a_challenge() {
        let ok = Response::json(200, &json!({"Code": "interaction required"}));
        assert!(Challenge::from_response(&ok).is_none());

        let html = Response::new(500, "<html/>").with_header("Content-Type", "text/html");
        assert!(Challenge::from_response(&html).is_none());

        let garbage = Response::new(500, "not json");
        assert!(Challenge::from_response(&garbage).is_none());

        let codeless = Response::json(500, &json!({"Message": "boom"}));
        assert!(Challenge::from_response(&codeless).is_none());
    }
}
