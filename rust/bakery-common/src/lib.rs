#![warn(missing_docs)]

//! Light weight helpers shared by the macaroon and client crates. Nothing in
//! here knows about macaroons; it only smooths over target differences and
//! the handful of encodings the wire format needs.

mod sync;
pub use sync::*;

mod encoding;
pub use encoding::*;
