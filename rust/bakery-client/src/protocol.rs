//! Wire-level constants of the bakery protocol.

use url::Url;

use crate::{Headers, Method};

/// Header announcing the protocol version on every bakery request.
pub const PROTOCOL_VERSION_HEADER: &str = "Bakery-Protocol-Version";

/// The protocol version this client speaks.
pub const PROTOCOL_VERSION: &str = "1";

/// Header carrying the serialized macaroons stored for the target service.
pub const MACAROONS_HEADER: &str = "Macaroons";

#[allow(missing_docs)]
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Challenge code asking the client to discharge `Info.Macaroon`.
pub const DISCHARGE_REQUIRED: &str = "macaroon discharge required";

/// Challenge code asking the client to complete a visit/wait flow.
pub const INTERACTION_REQUIRED: &str = "interaction required";

/// How many times the wait URL is polled before interaction gives up.
pub const MAX_INTERACTION_ATTEMPTS: usize = 6;

/// Path segment of the endpoint that mirrors macaroons into a cookie.
pub const SET_AUTH_COOKIE_PATH: &str = "/set-auth-cookie";

/// Headers every bakery request starts from.
pub fn bakery_headers() -> Headers {
    Headers::from([(
        PROTOCOL_VERSION_HEADER.to_string(),
        PROTOCOL_VERSION.to_string(),
    )])
}

/// Only `PUT .../set-auth-cookie` travels with credentials (cookies)
/// attached; every other request is sent without them.
pub fn requires_credentials(method: Method, url: &str) -> bool {
    method == Method::Put && path_of(url).contains(SET_AUTH_COOKIE_PATH)
}

/// The path component of `url`, or the whole string when it does not parse.
pub(crate) fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}
