//! Host-side emulation of the scripting environment that wasm-bindgen guests
//! import from, plus the call protocol for talking to their exports.

pub mod config;
pub mod entropy;
pub mod env;
pub mod error;
pub mod handle_table;
pub mod marshal;
pub mod memory;
pub mod roles;
pub mod session;
pub mod stubs;
pub mod typed_array;
pub mod value;

pub use config::{HostConfig, UnknownImportPolicy};
pub use entropy::{EntropyProvider, EntropySource, OsEntropy};
pub use env::HostEnv;
pub use error::{GuestFailure, HostError};
pub use session::{GuestSession, Scratch};
pub use stubs::ImportBinding;
pub use value::{Handle, HostValue};
