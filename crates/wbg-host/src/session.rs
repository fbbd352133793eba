//! A loaded guest module plus the host environment it was bound against.

use std::path::Path;

use wasmtime::{Engine, Func, Instance, Linker, Memory, Module, Store, Val};
use wbg_contracts::{EXPORT_FREE, EXPORT_MALLOC, EXPORT_MEMORY};

use crate::config::HostConfig;
use crate::entropy::EntropyProvider;
use crate::env::HostEnv;
use crate::error::{GuestFailure, GuestThrow, HostError};
use crate::marshal::{FallibleRecord, StringRecord, FALLIBLE_RECORD_SIZE, STRING_RECORD_SIZE};
use crate::memory;
use crate::stubs::{self, ImportBinding};

/// Allocator alignment passed to `malloc`/`free` when the guest declares one.
const BYTE_ALIGN: i32 = 1;

/// One guest instance. Calls are strictly sequential; after a trap every
/// further call is refused with [`HostError::SessionPoisoned`].
pub struct GuestSession {
    store: Store<HostEnv>,
    instance: Instance,
    memory: Memory,
    malloc: Func,
    free: Func,
    plan: Vec<ImportBinding>,
    guest_calls: u64,
    poisoned: Option<String>,
}

impl std::fmt::Debug for GuestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestSession")
            .field("imports", &self.plan.len())
            .field("guest_calls", &self.guest_calls)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

fn load_error(stage: &'static str, err: impl std::fmt::Display) -> HostError {
    HostError::Load {
        stage,
        message: format!("{err:#}"),
    }
}

impl GuestSession {
    pub fn from_file(path: impl AsRef<Path>, config: &HostConfig) -> Result<Self, HostError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| load_error("read", format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes, config)
    }

    pub fn from_bytes(bytes: &[u8], config: &HostConfig) -> Result<Self, HostError> {
        Self::with_entropy(bytes, config, EntropyProvider::default())
    }

    /// Like [`GuestSession::from_bytes`] with an explicit randomness source.
    pub fn with_entropy(
        bytes: &[u8],
        config: &HostConfig,
        entropy: EntropyProvider,
    ) -> Result<Self, HostError> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(|e| load_error("compile", e))?;

        let mut linker = Linker::new(&engine);
        let plan = stubs::bind_imports(&mut linker, &module, config.unknown_imports)?;
        tracing::debug!(imports = plan.len(), "guest imports bound");

        let mut store = Store::new(&engine, HostEnv::new(config, entropy));
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| load_error("instantiate", e))?;

        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or_else(|| HostError::MissingExport {
                name: EXPORT_MEMORY.to_string(),
            })?;
        let malloc = required_func(&instance, &mut store, EXPORT_MALLOC)?;
        let free = required_func(&instance, &mut store, EXPORT_FREE)?;

        Ok(GuestSession {
            store,
            instance,
            memory,
            malloc,
            free,
            plan,
            guest_calls: 0,
            poisoned: None,
        })
    }

    pub fn binding_plan(&self) -> &[ImportBinding] {
        &self.plan
    }

    pub fn env(&self) -> &HostEnv {
        self.store.data()
    }

    /// Number of guest exports the host has invoked, allocator calls included.
    pub fn guest_calls(&self) -> u64 {
        self.guest_calls
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Calls a guest export and returns its results.
    pub fn call(&mut self, export: &str, args: &[Val]) -> Result<Vec<Val>, HostError> {
        let func = required_func(&self.instance, &mut self.store, export)?;
        self.invoke(export, func, args)
    }

    /// Calls an export taking and returning `i32` handles or pointers.
    pub fn call_handle(&mut self, export: &str, args: &[u32]) -> Result<u32, HostError> {
        let args: Vec<Val> = args.iter().map(|a| Val::I32(*a as i32)).collect();
        let results = self.call(export, &args)?;
        first_u32(export, &results)
    }

    fn invoke(&mut self, operation: &str, func: Func, args: &[Val]) -> Result<Vec<Val>, HostError> {
        if let Some(cause) = &self.poisoned {
            return Err(HostError::SessionPoisoned {
                operation: operation.to_string(),
                cause: cause.clone(),
            });
        }
        let mut results: Vec<Val> = func
            .ty(&self.store)
            .results()
            .map(|ty| Val::default_for_ty(&ty).unwrap_or(Val::I32(0)))
            .collect();
        self.guest_calls += 1;
        tracing::debug!(operation, args = args.len(), "guest call");
        match func.call(&mut self.store, args, &mut results) {
            Ok(()) => Ok(results),
            Err(err) => Err(self.classify(operation, err)),
        }
    }

    /// A guest `throw` is a recoverable guest failure; anything else is a
    /// trap and poisons the session.
    fn classify(&mut self, operation: &str, err: anyhow::Error) -> HostError {
        if let Some(thrown) = err.downcast_ref::<GuestThrow>() {
            return HostError::Guest {
                operation: operation.to_string(),
                failure: GuestFailure::message(thrown.message.clone()),
            };
        }
        let message = format!("{err:#}");
        tracing::error!(operation, error = %message, "guest trapped, session poisoned");
        self.poisoned = Some(message.clone());
        HostError::Trap {
            operation: operation.to_string(),
            message,
        }
    }

    /// `__wbindgen_malloc(size[, align])`.
    pub fn malloc(&mut self, size: u32) -> Result<u32, HostError> {
        let args = allocator_args(self.malloc.ty(&self.store).params().len(), &[size as i32]);
        let malloc = self.malloc;
        let results = self.invoke(EXPORT_MALLOC, malloc, &args)?;
        first_u32(EXPORT_MALLOC, &results)
    }

    /// `__wbindgen_free(ptr, size[, align])`.
    pub fn free(&mut self, ptr: u32, size: u32) -> Result<(), HostError> {
        let args = allocator_args(
            self.free.ty(&self.store).params().len(),
            &[ptr as i32, size as i32],
        );
        let free = self.free;
        self.invoke(EXPORT_FREE, free, &args).map(drop)
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<Vec<u8>, HostError> {
        memory::slice(self.memory.data(&self.store), ptr, len)
            .map(<[u8]>::to_vec)
            .map_err(|source| HostError::Memory {
                operation: "read guest memory".to_string(),
                source,
            })
    }

    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), HostError> {
        let len = u32::try_from(bytes.len()).map_err(|_| HostError::Protocol {
            operation: "write guest memory".to_string(),
            message: format!("{} bytes do not fit a 32-bit guest", bytes.len()),
        })?;
        memory::slice_mut(self.memory.data_mut(&mut self.store), ptr, len)
            .map(|dst| dst.copy_from_slice(bytes))
            .map_err(|source| HostError::Memory {
                operation: "write guest memory".to_string(),
                source,
            })
    }

    /// Runs `body` with a scratch arena; everything allocated through it is
    /// returned to the guest allocator whether `body` succeeds or not.
    pub fn with_scratch<T>(
        &mut self,
        operation: &str,
        body: impl FnOnce(&mut Self, &mut Scratch) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut scratch = Scratch::default();
        let outcome = body(self, &mut scratch);
        if self.is_poisoned() {
            return outcome;
        }
        let mut release_error = None;
        for (ptr, size) in scratch.allocations.into_iter().rev() {
            if let Err(err) = self.free(ptr, size) {
                tracing::warn!(operation, ptr, size, error = %err, "failed to release scratch allocation");
                release_error.get_or_insert(err);
            }
        }
        match (outcome, release_error) {
            (Ok(_), Some(err)) => Err(err),
            (outcome, _) => outcome,
        }
    }

    /// Calls `export(ret_ptr, args..)` and decodes the `(ptr, len)` string it
    /// writes. Both the string buffer and the return area are freed.
    pub fn call_returning_string(&mut self, export: &str, args: &[u32]) -> Result<String, HostError> {
        self.with_scratch(export, |session, scratch| {
            let ret = scratch.alloc(session, STRING_RECORD_SIZE)?;
            let mut call_args = vec![ret];
            call_args.extend_from_slice(args);
            session.call_handle_unit(export, &call_args)?;

            let record = StringRecord::decode(session.memory.data(&session.store), ret)
                .map_err(|source| HostError::Memory {
                    operation: export.to_string(),
                    source,
                })?;
            let bytes = session.read_bytes(record.ptr, record.len)?;
            session.free(record.ptr, record.len)?;
            String::from_utf8(bytes).map_err(|e| HostError::Protocol {
                operation: export.to_string(),
                message: format!("guest returned non-UTF-8 text: {e}"),
            })
        })
    }

    /// Calls `export(ret_ptr, str_ptr, str_len)` on a fallible constructor and
    /// returns the new guest handle, or the decoded guest failure.
    pub fn call_fallible(&mut self, export: &str, input: &[u8]) -> Result<u32, HostError> {
        self.with_scratch(export, |session, scratch| {
            let ret = scratch.alloc(session, FALLIBLE_RECORD_SIZE)?;
            let (ptr, len) = scratch.pass_bytes(session, input)?;
            session.call_handle_unit(export, &[ret, ptr, len])?;

            let record = FallibleRecord::decode(session.memory.data(&session.store), ret)
                .map_err(|source| HostError::Memory {
                    operation: export.to_string(),
                    source,
                })?;
            record.into_result().map_err(|handle| HostError::Guest {
                operation: export.to_string(),
                failure: session.env().describe_failure(handle),
            })
        })
    }

    fn call_handle_unit(&mut self, export: &str, args: &[u32]) -> Result<(), HostError> {
        let args: Vec<Val> = args.iter().map(|a| Val::I32(*a as i32)).collect();
        self.call(export, &args).map(drop)
    }
}

/// Guest allocations owned by one host operation.
#[derive(Debug, Default)]
pub struct Scratch {
    allocations: Vec<(u32, u32)>,
}

impl Scratch {
    pub fn alloc(&mut self, session: &mut GuestSession, size: u32) -> Result<u32, HostError> {
        let ptr = session.malloc(size)?;
        self.allocations.push((ptr, size));
        Ok(ptr)
    }

    /// Copies `bytes` into a fresh guest allocation and returns `(ptr, len)`.
    pub fn pass_bytes(
        &mut self,
        session: &mut GuestSession,
        bytes: &[u8],
    ) -> Result<(u32, u32), HostError> {
        let len = u32::try_from(bytes.len()).map_err(|_| HostError::Protocol {
            operation: "pass bytes".to_string(),
            message: format!("{} bytes do not fit a 32-bit guest", bytes.len()),
        })?;
        let ptr = self.alloc(session, len)?;
        session.write_bytes(ptr, bytes)?;
        Ok((ptr, len))
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }
}

fn required_func(
    instance: &Instance,
    store: &mut Store<HostEnv>,
    name: &str,
) -> Result<Func, HostError> {
    instance
        .get_func(&mut *store, name)
        .ok_or_else(|| HostError::MissingExport {
            name: name.to_string(),
        })
}

fn allocator_args(arity: usize, leading: &[i32]) -> Vec<Val> {
    leading
        .iter()
        .copied()
        .chain(std::iter::repeat(BYTE_ALIGN))
        .take(arity)
        .map(Val::I32)
        .collect()
}

fn first_u32(operation: &str, results: &[Val]) -> Result<u32, HostError> {
    match results.first() {
        Some(Val::I32(v)) => Ok(*v as u32),
        Some(Val::I64(v)) => Ok(*v as u32),
        _ => Err(HostError::Protocol {
            operation: operation.to_string(),
            message: "expected an i32 result".to_string(),
        }),
    }
}
