//! Values the guest refers to by handle.
//!
//! The guest cannot hold host values directly; it holds a `u32` handle into
//! the [`HandleTable`](crate::handle_table::HandleTable) instead. Only the
//! subset of scripting values the key-management guest exercises is modeled.

use std::collections::BTreeMap;
use std::fmt;

pub type Handle = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Named fields, each pointing at another table entry.
    Map(BTreeMap<String, Handle>),
    Sequence(Vec<Handle>),
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Map(_) => "object",
            HostValue::Sequence(_) => "array",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, HostValue::Map(_) | HostValue::Sequence(_))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Number(n) => write!(f, "{n}"),
            HostValue::String(s) => f.write_str(s),
            HostValue::Map(fields) => write!(f, "[object with {} fields]", fields.len()),
            HostValue::Sequence(items) => write!(f, "[array of {}]", items.len()),
        }
    }
}
