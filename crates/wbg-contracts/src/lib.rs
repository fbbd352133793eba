//! Shared, version-pinned identifiers for the guest boundary.
//!
//! These constants are the single source of truth for namespace and export
//! names the host expects from a `wasm-bindgen` build of the key-management
//! library, and for schema strings that appear in machine-readable output.

pub const WBG_RUNNER_REPORT_SCHEMA_VERSION: &str = "wbg-runner.report@0.1.0";
pub const WBG_BINDING_PLAN_SCHEMA_VERSION: &str = "wbg-runner.binding-plan@0.1.0";

/// Namespace for every generator intrinsic and imported method shim.
pub const NS_PLACEHOLDER: &str = "__wbindgen_placeholder__";
/// Namespace for the reference-table intrinsics emitted by the externref pass.
pub const NS_EXTERNREF_XFORM: &str = "__wbindgen_externref_xform__";

pub const SUPPORTED_NAMESPACES: &[&str] = &[NS_PLACEHOLDER, NS_EXTERNREF_XFORM];

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_MALLOC: &str = "__wbindgen_malloc";
pub const EXPORT_FREE: &str = "__wbindgen_free";

pub const EXPORT_KEYPAIR_NEW: &str = "keypair_new";
pub const EXPORT_KEYPAIR_FROM_PRIVATE_KEY: &str = "keypair_fromPrivateKey";
pub const EXPORT_KEYPAIR_GET_PUBLIC_KEY: &str = "keypair_getPublicKey";
pub const EXPORT_KEYPAIR_GET_PRIVATE_KEY: &str = "keypair_getPrivateKey";

pub const EXPORT_PRIVATEKEY_TO_STRING: &str = "privatekey_toString";
pub const EXPORT_PRIVATEKEY_FROM_STRING: &str = "privatekey_fromString";
pub const EXPORT_PUBLICKEY_TO_STRING: &str = "publickey_toString";
pub const EXPORT_PUBLICKEY_FROM_STRING: &str = "publickey_fromString";

pub const DEFAULT_GUEST_WASM: &str = "target/wasm32-unknown-unknown/release/biscuit_wasm_go.wasm";
pub const ENV_GUEST_WASM: &str = "WBG_WASM_FILE";
pub const ENV_UNKNOWN_IMPORTS: &str = "WBG_UNKNOWN_IMPORTS";
