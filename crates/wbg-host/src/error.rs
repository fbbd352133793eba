use std::collections::BTreeMap;
use std::fmt;

use crate::memory::MemoryError;

/// A failure the guest reported itself, decoded from the Handle Table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuestFailure {
    pub message: String,
    /// Populated when the guest signalled a structured error object.
    pub fields: BTreeMap<String, String>,
}

impl GuestFailure {
    pub fn message(message: impl Into<String>) -> Self {
        GuestFailure {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }
}

impl fmt::Display for GuestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for (k, v) in &self.fields {
            if k != "message" {
                write!(f, " ({k}: {v})")?;
            }
        }
        Ok(())
    }
}

/// Raised from the throw stub; unwinds the guest and is reported to the
/// caller as a guest failure, not a trap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestThrow {
    pub message: String,
}

impl fmt::Display for GuestThrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guest threw: {}", self.message)
    }
}

impl std::error::Error for GuestThrow {}

#[derive(Debug)]
pub enum HostError {
    /// The guest binary could not be read, compiled or instantiated.
    Load { stage: &'static str, message: String },
    /// An import this host cannot satisfy. Fatal at startup.
    Binding {
        namespace: String,
        name: String,
        reason: String,
    },
    MissingExport { name: String },
    /// Accessor called on an object that holds no guest handle.
    NotInitialized { object: &'static str },
    Guest {
        operation: String,
        failure: GuestFailure,
    },
    /// Guest execution faulted. The session is unusable afterwards.
    Trap { operation: String, message: String },
    SessionPoisoned { operation: String, cause: String },
    Memory {
        operation: String,
        source: MemoryError,
    },
    /// The guest wrote a record the host cannot decode.
    Protocol { operation: String, message: String },
}

impl HostError {
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, HostError::NotInitialized { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::Trap { .. } | HostError::SessionPoisoned { .. } | HostError::Binding { .. }
        )
    }

    pub fn guest_failure(&self) -> Option<&GuestFailure> {
        match self {
            HostError::Guest { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Load { stage, message } => write!(f, "{stage} guest module: {message}"),
            HostError::Binding {
                namespace,
                name,
                reason,
            } => write!(f, "cannot bind import {namespace}.{name}: {reason}"),
            HostError::MissingExport { name } => {
                write!(f, "exported function '{name}' not found")
            }
            HostError::NotInitialized { object } => write!(f, "{object} not initialized"),
            HostError::Guest { operation, failure } => write!(f, "{operation} failed: {failure}"),
            HostError::Trap { operation, message } => {
                write!(f, "{operation} trapped: {message}")
            }
            HostError::SessionPoisoned { operation, cause } => write!(
                f,
                "{operation} refused: guest session was terminated by an earlier trap ({cause})"
            ),
            HostError::Memory { operation, source } => write!(f, "{operation}: {source}"),
            HostError::Protocol { operation, message } => write!(f, "{operation}: {message}"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostError::Memory { source, .. } => Some(source),
            _ => None,
        }
    }
}
