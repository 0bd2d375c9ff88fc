#![warn(missing_docs)]

//! Client side of the macaroon bakery protocol.
//!
//! [`Bakery`] wraps a [`Transport`] and a [`BakeryStorage`]. Requests go out
//! with the macaroons stored for their service; when a service challenges a
//! request, the bakery gathers the discharges (or walks the user through an
//! interaction), stores the result and tries once more.
//!
//! ```no_run
//! # async fn example() -> Result<(), bakery_client::BakeryError> {
//! use bakery_client::{Bakery, BakeryConfig, HttpTransport, HttpTransportConfig, MemoryStore};
//!
//! let config = BakeryConfig::default()
//!     .with_service("charmstore", "https://api.example.com/charmstore");
//! let transport = HttpTransport::new(HttpTransportConfig::default())?;
//! let bakery = Bakery::from_config(config, transport, MemoryStore::default());
//!
//! let response = bakery
//!     .get("https://api.example.com/charmstore/v5/whoami")
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

mod bakery;
pub use bakery::*;

mod challenge;
pub use challenge::*;

mod config;
pub use config::*;

mod cookie;
pub use cookie::*;

mod error;
pub use error::*;

mod method;
pub use method::*;

pub mod protocol;

mod storage;
pub use storage::*;

mod transport;
pub use transport::*;

mod visit;
pub use visit::*;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;
