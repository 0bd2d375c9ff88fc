use async_trait::async_trait;
use bakery_common::ConditionalSync;
use tracing::info;

use crate::BakeryError;

/// Shows the user the page where an interaction (usually a login) happens.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Visitor: ConditionalSync {
    /// Present `url` to the user. Completion is observed separately by
    /// polling the wait URL, so this returns as soon as the page is shown.
    async fn visit(&self, url: &str) -> Result<(), BakeryError>;
}

/// The default [`Visitor`].
///
/// In the browser it opens the URL in a new browsing context. Elsewhere there
/// is no browser to drive, so the URL is logged for the user to open.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenInBrowser;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Visitor for OpenInBrowser {
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    async fn visit(&self, url: &str) -> Result<(), BakeryError> {
        let window = web_sys::window()
            .ok_or_else(|| BakeryError::InteractionFailed("no window to open".into()))?;
        window
            .open_with_url_and_target(url, "_blank")
            .map_err(|error| BakeryError::InteractionFailed(format!("{error:?}")))?;
        info!(url, "Opened interaction page");
        Ok(())
    }

    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    async fn visit(&self, url: &str) -> Result<(), BakeryError> {
        info!(url, "Open this URL to continue");
        Ok(())
    }
}
