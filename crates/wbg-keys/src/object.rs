//! Unbound/Bound bookkeeping shared by the key objects.

use wbg_host::{Handle, HostError};

/// The guest handle an accessor needs, or `NotInitialized` without touching
/// the guest.
pub(crate) fn require(handle: Option<Handle>, object: &'static str) -> Result<Handle, HostError> {
    match handle {
        Some(h) => Ok(h),
        None => {
            tracing::error!(object, "{object} not initialized");
            Err(HostError::NotInitialized { object })
        }
    }
}

/// Guest objects are boxed allocations; a zero pointer is never a valid one.
pub(crate) fn bound(operation: &str, handle: Handle) -> Result<Handle, HostError> {
    if handle == 0 {
        return Err(HostError::Protocol {
            operation: operation.to_string(),
            message: "guest returned a null object pointer".to_string(),
        });
    }
    Ok(handle)
}

/// Logs a failed guest operation with its export name and passes it through.
pub(crate) fn logged<T>(operation: &str, result: Result<T, HostError>) -> Result<T, HostError> {
    if let Err(err) = &result {
        tracing::error!(operation, error = %err, "{operation} failed");
    }
    result
}
