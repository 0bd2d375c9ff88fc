#![warn(missing_docs)]

//! Macaroons: bearer capability tokens that can be attenuated by anyone who
//! holds them and cryptographically checked by whoever minted them.
//!
//! A [`Macaroon`] carries an identifier, an advisory location and an ordered
//! list of [`Caveat`]s. Its signature is an HMAC chain seeded from a secret
//! root key and extended by every caveat, so caveats can be added but never
//! removed or altered without invalidating the token.
//!
//! Third-party caveats hand part of the decision to another service. The
//! holder gathers a discharge macaroon for each of them (see
//! [`discharge_all`]), binds the discharges to the root macaroon and presents
//! them together.
//!
//! ```rust
//! use bakery_macaroon::Macaroon;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let macaroon = Macaroon::new(b"root key", "id", "https://service.example.com")?
//!     .add_first_party_caveat("op = read")?;
//!
//! macaroon.verify(
//!     b"root key",
//!     |caveat| match caveat {
//!         "op = read" => Ok(()),
//!         other => Err(format!("unknown caveat {other}")),
//!     },
//!     &[],
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod crypto;

mod caveat;
pub use caveat::*;

mod discharge;
pub use discharge::*;

mod error;
pub use error::*;

mod macaroon;
pub use macaroon::*;

mod verify;

mod wire;
pub use wire::{deserialize_macaroons, import_macaroons, serialize_macaroons};

pub use crypto::{Signature, generate_root_key};
