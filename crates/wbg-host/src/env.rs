//! Per-session host state captured by every import stub.

use std::collections::{BTreeMap, HashMap};

use crate::config::HostConfig;
use crate::entropy::EntropyProvider;
use crate::error::GuestFailure;
use crate::handle_table::{HandleTable, StringInterner, FIRST_FREE_HANDLE};
use crate::roles::Probe;
use crate::typed_array::TypedArrayRegistry;
use crate::value::{Handle, HostValue};

/// Everything the emulated scripting environment knows. One instance lives in
/// each wasm store, so two sessions never observe each other's handles.
#[derive(Debug)]
pub struct HostEnv {
    pub(crate) handles: HandleTable,
    pub(crate) strings: StringInterner,
    pub(crate) arrays: TypedArrayRegistry,
    pub(crate) entropy: EntropyProvider,
    probes: HashMap<Probe, Handle>,
    memory_handle: Option<Handle>,
    dedupe_strings: bool,
}

impl HostEnv {
    pub fn new(config: &HostConfig, entropy: EntropyProvider) -> Self {
        HostEnv {
            handles: HandleTable::new(),
            strings: StringInterner::default(),
            arrays: TypedArrayRegistry::new(config.synthetic_handle_base),
            entropy,
            probes: HashMap::new(),
            memory_handle: None,
            dedupe_strings: config.dedupe_strings,
        }
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn arrays(&self) -> &TypedArrayRegistry {
        &self.arrays
    }

    pub fn entropy(&self) -> &EntropyProvider {
        &self.entropy
    }

    pub fn value(&self, handle: Handle) -> Option<&HostValue> {
        self.handles.get(handle)
    }

    pub fn intern(&mut self, value: HostValue) -> Handle {
        self.handles.intern(value)
    }

    pub fn intern_string(&mut self, text: String) -> Handle {
        if self.dedupe_strings {
            self.strings.intern(&mut self.handles, text)
        } else {
            self.handles.intern(HostValue::String(text))
        }
    }

    /// A stable stand-in object for an environment global. The same probe
    /// always answers with the same handle.
    pub fn probe_handle(&mut self, probe: Probe) -> Handle {
        if let Some(&h) = self.probes.get(&probe) {
            return h;
        }
        let h = self.handles.intern(HostValue::Map(BTreeMap::new()));
        tracing::trace!(probe = probe.as_str(), handle = h, "environment probe bound");
        self.probes.insert(probe, h);
        h
    }

    pub fn is_function(&self, handle: Handle) -> bool {
        self.probes.get(&Probe::Require) == Some(&handle)
    }

    pub fn memory_handle(&mut self) -> Handle {
        if let Some(h) = self.memory_handle {
            return h;
        }
        let h = self.handles.intern(HostValue::Map(BTreeMap::new()));
        self.memory_handle = Some(h);
        h
    }

    /// Object test used by the guest's capability checks.
    ///
    /// Typed arrays live outside the table and their view handles are guest
    /// offsets, so the two handle spaces overlap. A registered array wins,
    /// except on the seeded primitive slots, which always answer from the
    /// table: the whole-memory view sits at offset 0, the same number as
    /// `undefined`.
    pub fn is_object(&self, handle: Handle) -> bool {
        if handle >= FIRST_FREE_HANDLE && self.arrays.record_of(handle).is_some() {
            return true;
        }
        self.handles.get(handle).is_some_and(HostValue::is_object)
    }

    /// Decodes the value behind an error handle: a plain string becomes the
    /// message, a field map contributes every field.
    pub fn describe_failure(&self, handle: Handle) -> GuestFailure {
        match self.handles.get(handle) {
            Some(HostValue::String(s)) => GuestFailure::message(s.clone()),
            Some(HostValue::Map(fields)) => {
                let fields: BTreeMap<String, String> = fields
                    .iter()
                    .map(|(k, h)| {
                        let rendered = self
                            .handles
                            .get(*h)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| format!("<handle {h}>"));
                        (k.clone(), rendered)
                    })
                    .collect();
                let message = fields
                    .get("message")
                    .cloned()
                    .unwrap_or_else(|| "guest error object".to_string());
                GuestFailure { message, fields }
            }
            Some(other) => {
                GuestFailure::message(format!("guest signalled an error ({})", other.kind()))
            }
            None => GuestFailure::message(format!("unknown guest error handle {handle}")),
        }
    }
}
