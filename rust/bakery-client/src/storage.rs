//! Per-service macaroon storage.
//!
//! [`BakeryStorage`] resolves a request URL to a short service key and keeps
//! one serialized macaroon blob per key in a [`KeyValueStore`]. Entries are
//! written after a successful discharge, overwritten by later ones, and never
//! expired here.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bakery_common::ConditionalSync;
use bakery_macaroon::deserialize_macaroons;
use tracing::{debug, warn};

use crate::{BakeryError, CookieSetter, StorageError, protocol::path_of};

mod memory;
pub use memory::*;

/// Service key that every identity-service URL resolves to.
pub const IDENTITY_SERVICE: &str = "identity";

/// Service key whose macaroons are mirrored into a cookie when a
/// [`CookieSetter`] is configured.
pub const CHARMSTORE_SERVICE: &str = "charmstore";

/// A persistent string key-value store, such as browser local storage.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait KeyValueStore: ConditionalSync {
    /// Retrieve the value stored against `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Store `value` against `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    /// Forget the value stored against `key`
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Forget everything
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Maps request URLs onto service keys and stores a macaroon blob per key.
pub struct BakeryStorage<S> {
    store: S,
    services: BTreeMap<String, String>,
    cookie_setter: Option<Arc<dyn CookieSetter>>,
}

impl<S> BakeryStorage<S>
where
    S: KeyValueStore,
{
    /// Wrap `store`, resolving URLs against `services` (name -> origin URL).
    pub fn new(store: S, services: BTreeMap<String, String>) -> Self {
        Self {
            store,
            services,
            cookie_setter: None,
        }
    }

    /// Mirror every macaroon stored for the charmstore service into a cookie.
    pub fn with_cookie_setter(mut self, cookie_setter: impl CookieSetter + 'static) -> Self {
        self.cookie_setter = Some(Arc::new(cookie_setter));
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the service key for `url`.
    ///
    /// URLs whose path mentions `identity` belong to the identity service
    /// whether or not it is registered. Otherwise the longest registered
    /// origin that prefixes `url` wins. An unmatched URL is its own key.
    pub fn key_for(&self, url: &str) -> String {
        if path_of(url).contains(IDENTITY_SERVICE) {
            return IDENTITY_SERVICE.to_string();
        }

        self.services
            .iter()
            .filter(|(_, origin)| url.starts_with(origin.as_str()))
            .max_by_key(|(_, origin)| origin.len())
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| url.to_string())
    }

    /// The serialized macaroons stored for the service `url` belongs to.
    pub async fn get(&self, url: &str) -> Result<Option<String>, StorageError> {
        self.store.get(&self.key_for(url)).await
    }

    /// Store serialized macaroons for the service `url` belongs to.
    ///
    /// For the charmstore service the blob is also decoded and handed to the
    /// cookie setter, if there is one. The cookie only mirrors the stored
    /// macaroons, so a failure to set it is logged and the stored blob is kept.
    pub async fn set(&self, url: &str, macaroons: String) -> Result<(), BakeryError> {
        let key = self.key_for(url);
        debug!(service = %key, "Storing macaroons");

        if key == CHARMSTORE_SERVICE {
            if let Some(cookie_setter) = &self.cookie_setter {
                let decoded = deserialize_macaroons(&macaroons)?;
                self.store.set(&key, macaroons).await?;
                if let Err(error) = cookie_setter.set_cookie(&decoded).await {
                    warn!(
                        %error,
                        service = %key,
                        "Failed to mirror macaroons into the auth cookie"
                    );
                }
                return Ok(());
            }
        }

        self.store.set(&key, macaroons).await?;
        Ok(())
    }

    /// Forget the macaroons stored for the service `url` belongs to.
    pub async fn remove(&self, url: &str) -> Result<(), StorageError> {
        self.store.remove(&self.key_for(url)).await
    }

    /// Forget every stored macaroon.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.clear().await
    }
}
