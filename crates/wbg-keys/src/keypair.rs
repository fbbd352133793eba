use wbg_contracts::{
    EXPORT_KEYPAIR_FROM_PRIVATE_KEY, EXPORT_KEYPAIR_GET_PRIVATE_KEY,
    EXPORT_KEYPAIR_GET_PUBLIC_KEY, EXPORT_KEYPAIR_NEW,
};
use wbg_host::{GuestSession, Handle, HostError};

use crate::algorithm::SignatureAlgorithm;
use crate::object::{bound, logged, require};
use crate::private_key::PrivateKey;
use crate::public_key::PublicKey;

/// A guest key pair. `KeyPair::default()` is unbound; every accessor on it
/// fails with `NotInitialized` and issues no guest call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPair {
    handle: Option<Handle>,
}

impl KeyPair {
    pub const OBJECT: &'static str = "keypair";

    /// Generates a fresh key pair inside the guest.
    pub fn new(
        session: &mut GuestSession,
        algorithm: SignatureAlgorithm,
    ) -> Result<KeyPair, HostError> {
        let handle = logged(
            EXPORT_KEYPAIR_NEW,
            session
                .call_handle(EXPORT_KEYPAIR_NEW, &[algorithm.selector()])
                .and_then(|h| bound(EXPORT_KEYPAIR_NEW, h)),
        )?;
        tracing::debug!(%algorithm, handle, "key pair generated");
        Ok(KeyPair {
            handle: Some(handle),
        })
    }

    /// Rebuilds the key pair belonging to `private_key`.
    pub fn from_private_key(
        session: &mut GuestSession,
        private_key: &PrivateKey,
    ) -> Result<KeyPair, HostError> {
        let key = require(private_key.handle(), PrivateKey::OBJECT)?;
        let handle = logged(
            EXPORT_KEYPAIR_FROM_PRIVATE_KEY,
            session
                .call_handle(EXPORT_KEYPAIR_FROM_PRIVATE_KEY, &[key])
                .and_then(|h| bound(EXPORT_KEYPAIR_FROM_PRIVATE_KEY, h)),
        )?;
        Ok(KeyPair {
            handle: Some(handle),
        })
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    pub fn public_key(&self, session: &mut GuestSession) -> Result<PublicKey, HostError> {
        let this = require(self.handle, Self::OBJECT)?;
        logged(
            EXPORT_KEYPAIR_GET_PUBLIC_KEY,
            session
                .call_handle(EXPORT_KEYPAIR_GET_PUBLIC_KEY, &[this])
                .and_then(|h| bound(EXPORT_KEYPAIR_GET_PUBLIC_KEY, h)),
        )
        .map(PublicKey::from_handle)
    }

    pub fn private_key(&self, session: &mut GuestSession) -> Result<PrivateKey, HostError> {
        let this = require(self.handle, Self::OBJECT)?;
        logged(
            EXPORT_KEYPAIR_GET_PRIVATE_KEY,
            session
                .call_handle(EXPORT_KEYPAIR_GET_PRIVATE_KEY, &[this])
                .and_then(|h| bound(EXPORT_KEYPAIR_GET_PRIVATE_KEY, h)),
        )
        .map(PrivateKey::from_handle)
    }
}
