use wbg_contracts::{EXPORT_PRIVATEKEY_FROM_STRING, EXPORT_PRIVATEKEY_TO_STRING};
use wbg_host::{GuestSession, Handle, HostError};

use crate::object::{bound, logged, require};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivateKey {
    handle: Option<Handle>,
}

impl PrivateKey {
    pub const OBJECT: &'static str = "private key";

    pub(crate) fn from_handle(handle: Handle) -> Self {
        PrivateKey {
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// The guest's textual encoding of this key.
    pub fn to_string(&self, session: &mut GuestSession) -> Result<String, HostError> {
        let this = require(self.handle, Self::OBJECT)?;
        logged(
            EXPORT_PRIVATEKEY_TO_STRING,
            session.call_returning_string(EXPORT_PRIVATEKEY_TO_STRING, &[this]),
        )
    }

    /// Parses `text` inside the guest. On failure no key object exists.
    pub fn from_string(session: &mut GuestSession, text: &str) -> Result<PrivateKey, HostError> {
        let handle = logged(
            EXPORT_PRIVATEKEY_FROM_STRING,
            session
                .call_fallible(EXPORT_PRIVATEKEY_FROM_STRING, text.as_bytes())
                .and_then(|h| bound(EXPORT_PRIVATEKEY_FROM_STRING, h)),
        )?;
        Ok(PrivateKey::from_handle(handle))
    }
}
