//! Recognition of generator imports by role.
//!
//! The generator names method shims `__wbg_<method>_<hash>` and intrinsics
//! `__wbindgen_<name>` (newer releases also hash intrinsics as
//! `__wbg___wbindgen_<name>_<hash>`). The hash changes with every build, so
//! recognition strips it and looks the remaining base name up in a fixed
//! rule table. A rule also pins the arity it expects; a known name with an
//! unexpected arity is reported rather than bound to the wrong behaviour.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    Crypto,
    MsCrypto,
    Process,
    Versions,
    Node,
    Require,
    SelfObject,
    Window,
    GlobalThis,
    Global,
}

impl Probe {
    pub fn as_str(self) -> &'static str {
        match self {
            Probe::Crypto => "crypto",
            Probe::MsCrypto => "msCrypto",
            Probe::Process => "process",
            Probe::Versions => "versions",
            Probe::Node => "node",
            Probe::Require => "require",
            Probe::SelfObject => "self",
            Probe::Window => "window",
            Probe::GlobalThis => "globalThis",
            Probe::Global => "global",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    RandomFill,
    CopyToTypedArray,
    ObjectDrop,
    ObjectClone,
    IsObject,
    IsNull,
    IsUndefined,
    IsString,
    IsFunction,
    StringNew,
    StringGet,
    NumberNew,
    NumberGet,
    BooleanGet,
    ErrorNew,
    ArrayNew,
    ArrayPush,
    Throw,
    TableInit,
    TableGrow,
    TableSetNull,
    TypedArrayView,
    /// `new Uint8Array(memory.buffer)`: a view over all of guest memory.
    TypedArrayOverBuffer,
    TypedArrayWithLength,
    TypedArraySubarray,
    TypedArraySet,
    TypedArrayLength,
    Probe(Probe),
    Describe,
    Memory,
    Buffer,
    /// Bound only under the no-op unknown-import policy.
    Fallback,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::RandomFill => "random-fill",
            Role::CopyToTypedArray => "copy-to-typed-array",
            Role::ObjectDrop => "object-drop",
            Role::ObjectClone => "object-clone",
            Role::IsObject => "is-object",
            Role::IsNull => "is-null",
            Role::IsUndefined => "is-undefined",
            Role::IsString => "is-string",
            Role::IsFunction => "is-function",
            Role::StringNew => "string-new",
            Role::StringGet => "string-get",
            Role::NumberNew => "number-new",
            Role::NumberGet => "number-get",
            Role::BooleanGet => "boolean-get",
            Role::ErrorNew => "error-new",
            Role::ArrayNew => "array-new",
            Role::ArrayPush => "array-push",
            Role::Throw => "throw",
            Role::TableInit => "table-init",
            Role::TableGrow => "table-grow",
            Role::TableSetNull => "table-set-null",
            Role::TypedArrayView => "typed-array-view",
            Role::TypedArrayOverBuffer => "typed-array-over-buffer",
            Role::TypedArrayWithLength => "typed-array-with-length",
            Role::TypedArraySubarray => "typed-array-subarray",
            Role::TypedArraySet => "typed-array-set",
            Role::TypedArrayLength => "typed-array-length",
            Role::Probe(Probe::Crypto) => "probe-crypto",
            Role::Probe(Probe::MsCrypto) => "probe-ms-crypto",
            Role::Probe(Probe::Process) => "probe-process",
            Role::Probe(Probe::Versions) => "probe-versions",
            Role::Probe(Probe::Node) => "probe-node",
            Role::Probe(Probe::Require) => "probe-require",
            Role::Probe(Probe::SelfObject) => "probe-self",
            Role::Probe(Probe::Window) => "probe-window",
            Role::Probe(Probe::GlobalThis) => "probe-global-this",
            Role::Probe(Probe::Global) => "probe-global",
            Role::Describe => "describe",
            Role::Memory => "memory",
            Role::Buffer => "buffer",
            Role::Fallback => "fallback-noop",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `None` accepts any count.
#[derive(Debug, Clone, Copy)]
struct Arity {
    params: Option<usize>,
    results: Option<usize>,
}

const fn exact(params: usize, results: usize) -> Arity {
    Arity {
        params: Some(params),
        results: Some(results),
    }
}

const ANY_TO_ONE: Arity = Arity {
    params: None,
    results: Some(1),
};

const ANY: Arity = Arity {
    params: None,
    results: None,
};

impl Arity {
    fn accepts(self, params: usize, results: usize) -> bool {
        self.params.map_or(true, |p| p == params) && self.results.map_or(true, |r| r == results)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params {
            Some(p) => write!(f, "{p} params")?,
            None => f.write_str("any params")?,
        }
        match self.results {
            Some(r) => write!(f, " -> {r} results"),
            None => f.write_str(" -> any results"),
        }
    }
}

const RULES: &[(&str, Role, Arity)] = &[
    ("randomFillSync", Role::RandomFill, exact(2, 0)),
    ("getRandomValues", Role::RandomFill, exact(2, 0)),
    ("copy_to_typed_array", Role::CopyToTypedArray, exact(3, 0)),
    ("object_drop_ref", Role::ObjectDrop, exact(1, 0)),
    ("object_clone_ref", Role::ObjectClone, exact(1, 1)),
    ("is_object", Role::IsObject, exact(1, 1)),
    ("is_null", Role::IsNull, exact(1, 1)),
    ("is_undefined", Role::IsUndefined, exact(1, 1)),
    ("is_string", Role::IsString, exact(1, 1)),
    ("is_function", Role::IsFunction, exact(1, 1)),
    ("string_new", Role::StringNew, exact(2, 1)),
    ("string_get", Role::StringGet, exact(2, 0)),
    ("number_new", Role::NumberNew, exact(1, 1)),
    ("number_get", Role::NumberGet, exact(2, 0)),
    ("number_get", Role::NumberGet, exact(1, 1)),
    ("boolean_get", Role::BooleanGet, exact(1, 1)),
    ("error_new", Role::ErrorNew, exact(2, 1)),
    ("new", Role::ArrayNew, exact(0, 1)),
    ("new", Role::TypedArrayOverBuffer, exact(1, 1)),
    ("push", Role::ArrayPush, exact(2, 1)),
    ("throw", Role::Throw, exact(2, 0)),
    ("init_externref_table", Role::TableInit, exact(0, 0)),
    ("externref_table_grow", Role::TableGrow, exact(1, 1)),
    ("externref_table_set_null", Role::TableSetNull, exact(1, 0)),
    (
        "newwithbyteoffsetandlength",
        Role::TypedArrayView,
        exact(3, 1),
    ),
    ("newwithlength", Role::TypedArrayWithLength, exact(1, 1)),
    ("subarray", Role::TypedArraySubarray, exact(3, 1)),
    ("set", Role::TypedArraySet, exact(3, 0)),
    ("length", Role::TypedArrayLength, exact(1, 1)),
    ("crypto", Role::Probe(Probe::Crypto), ANY_TO_ONE),
    ("msCrypto", Role::Probe(Probe::MsCrypto), ANY_TO_ONE),
    ("process", Role::Probe(Probe::Process), ANY_TO_ONE),
    ("versions", Role::Probe(Probe::Versions), ANY_TO_ONE),
    ("node", Role::Probe(Probe::Node), ANY_TO_ONE),
    ("require", Role::Probe(Probe::Require), ANY_TO_ONE),
    ("self", Role::Probe(Probe::SelfObject), ANY_TO_ONE),
    ("window", Role::Probe(Probe::Window), ANY_TO_ONE),
    ("globalThis", Role::Probe(Probe::GlobalThis), ANY_TO_ONE),
    ("global", Role::Probe(Probe::Global), ANY_TO_ONE),
    ("static_accessor_SELF", Role::Probe(Probe::SelfObject), ANY_TO_ONE),
    ("static_accessor_WINDOW", Role::Probe(Probe::Window), ANY_TO_ONE),
    (
        "static_accessor_GLOBAL_THIS",
        Role::Probe(Probe::GlobalThis),
        ANY_TO_ONE,
    ),
    ("static_accessor_GLOBAL", Role::Probe(Probe::Global), ANY_TO_ONE),
    ("describe", Role::Describe, ANY),
    ("memory", Role::Memory, exact(0, 1)),
    ("buffer", Role::Buffer, exact(1, 1)),
];

fn rule_index() -> &'static HashMap<&'static str, Vec<(Role, Arity)>> {
    static INDEX: OnceLock<HashMap<&'static str, Vec<(Role, Arity)>>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index: HashMap<&'static str, Vec<(Role, Arity)>> = HashMap::new();
        for &(name, role, arity) in RULES {
            index.entry(name).or_default().push((role, arity));
        }
        index
    })
}

fn is_build_hash(s: &str) -> bool {
    s.len() >= 8 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Strips the generator's prefixes and build hash: `__wbg_subarray_aa90…`
/// becomes `subarray`, `__wbindgen_string_new` becomes `string_new`.
pub fn base_name(import: &str) -> &str {
    let rest = match import.strip_prefix("__wbg_") {
        Some(rest) => match rest.rsplit_once('_') {
            Some((head, tail)) if !head.is_empty() && is_build_hash(tail) => head,
            _ => rest,
        },
        None => import,
    };
    rest.strip_prefix("__wbindgen_").unwrap_or(rest)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Known(Role),
    Unknown,
    /// The base name is known but no rule takes this many params/results.
    ArityMismatch { expected: Vec<String> },
}

pub fn recognize(import: &str, params: usize, results: usize) -> Recognition {
    let Some(rules) = rule_index().get(base_name(import)) else {
        return Recognition::Unknown;
    };
    for &(role, arity) in rules {
        if arity.accepts(params, results) {
            return Recognition::Known(role);
        }
    }
    Recognition::ArityMismatch {
        expected: rules.iter().map(|(_, a)| a.to_string()).collect(),
    }
}
