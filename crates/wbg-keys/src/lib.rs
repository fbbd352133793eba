//! Typed key-management operations on top of a [`wbg_host::GuestSession`].
//!
//! Key objects hold a guest handle or nothing. Operations take the session
//! explicitly; a key is only meaningful in the session that produced it.

mod algorithm;
mod keypair;
mod object;
mod private_key;
mod public_key;

pub use algorithm::{SignatureAlgorithm, SignatureAlgorithmParseError};
pub use keypair::KeyPair;
pub use private_key::PrivateKey;
pub use public_key::PublicKey;
