use async_trait::async_trait;
use bakery_common::ConditionalSync;
use bakery_macaroon::Macaroon;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    BakeryError, Method, Request, Transport,
    protocol::{CONTENT_TYPE_HEADER, SET_AUTH_COOKIE_PATH, bakery_headers, requires_credentials},
};

/// Keeps a cookie-based auth channel in sync with freshly stored macaroons.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait CookieSetter: ConditionalSync {
    /// Called with the decoded macaroons every time they are stored.
    async fn set_cookie(&self, macaroons: &[Macaroon]) -> Result<(), BakeryError>;
}

/// Asks a service to set its auth cookie by sending
/// `PUT <origin>/set-auth-cookie` with `{"Macaroons": [...]}` and
/// credentials attached, so the browser keeps the cookie it sets.
pub struct AuthCookieSetter<T> {
    transport: T,
    origin: String,
}

impl<T> AuthCookieSetter<T>
where
    T: Transport,
{
    /// Set cookies for the service at `origin`.
    pub fn new(transport: T, origin: impl Into<String>) -> Self {
        Self {
            transport,
            origin: origin.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), SET_AUTH_COOKIE_PATH)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<T> CookieSetter for AuthCookieSetter<T>
where
    T: Transport,
{
    async fn set_cookie(&self, macaroons: &[Macaroon]) -> Result<(), BakeryError> {
        let exported = macaroons
            .iter()
            .map(Macaroon::export)
            .collect::<Result<Vec<Value>, _>>()?;

        let url = self.url();
        let mut headers = bakery_headers();
        headers.insert(CONTENT_TYPE_HEADER.into(), "application/json".into());

        debug!(url, "Setting auth cookie");
        let response = self
            .transport
            .send(Request {
                method: Method::Put,
                credentials: requires_credentials(Method::Put, &url),
                url,
                headers,
                body: Some(json!({ "Macaroons": exported }).to_string()),
            })
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Auth cookie was not set");
            return Err(BakeryError::CookieRejected {
                status: response.status,
            });
        }
        Ok(())
    }
}
