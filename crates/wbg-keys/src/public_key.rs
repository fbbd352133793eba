use wbg_contracts::{EXPORT_PUBLICKEY_FROM_STRING, EXPORT_PUBLICKEY_TO_STRING};
use wbg_host::{GuestSession, Handle, HostError};

use crate::object::{bound, logged, require};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicKey {
    handle: Option<Handle>,
}

impl PublicKey {
    pub const OBJECT: &'static str = "public key";

    pub(crate) fn from_handle(handle: Handle) -> Self {
        PublicKey {
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    pub fn to_string(&self, session: &mut GuestSession) -> Result<String, HostError> {
        let this = require(self.handle, Self::OBJECT)?;
        logged(
            EXPORT_PUBLICKEY_TO_STRING,
            session.call_returning_string(EXPORT_PUBLICKEY_TO_STRING, &[this]),
        )
    }

    pub fn from_string(session: &mut GuestSession, text: &str) -> Result<PublicKey, HostError> {
        let handle = logged(
            EXPORT_PUBLICKEY_FROM_STRING,
            session
                .call_fallible(EXPORT_PUBLICKEY_FROM_STRING, text.as_bytes())
                .and_then(|h| bound(EXPORT_PUBLICKEY_FROM_STRING, h)),
        )?;
        Ok(PublicKey::from_handle(handle))
    }
}
