//! Binds every unresolved guest import to a host behaviour.
//!
//! Each import is checked against the supported namespaces, recognized by
//! role, and defined on the linker with the exact type the guest declared.
//! Result slots are zero-filled for the declared types before the role runs,
//! so a role only overwrites what it produces.

use anyhow::{anyhow, Context as _};
use serde::Serialize;
use wasmtime::{Caller, Extern, ExternType, FuncType, Linker, Memory, Module, Val, ValType};
use wbg_contracts::{EXPORT_MALLOC, EXPORT_MEMORY, SUPPORTED_NAMESPACES};

use crate::config::UnknownImportPolicy;
use crate::env::HostEnv;
use crate::error::{GuestThrow, HostError};
use crate::memory;
use crate::roles::{self, Recognition, Role};
use crate::typed_array::{ArrayKind, TypedArrayError};
use crate::value::HostValue;

/// One line of the binding plan: what each import was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportBinding {
    pub namespace: String,
    pub name: String,
    pub role: &'static str,
    pub params: Vec<&'static str>,
    pub results: Vec<&'static str>,
}

fn val_type_name(ty: &ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        ValType::Ref(_) => "ref",
    }
}

fn binding_error(namespace: &str, name: &str, reason: impl Into<String>) -> HostError {
    HostError::Binding {
        namespace: namespace.to_string(),
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Picks the role for one import, or explains why it cannot be bound.
pub fn plan_import(
    namespace: &str,
    name: &str,
    ty: &FuncType,
    policy: UnknownImportPolicy,
) -> Result<Role, HostError> {
    if !SUPPORTED_NAMESPACES.contains(&namespace) {
        return Err(binding_error(
            namespace,
            name,
            format!(
                "namespace is outside the emulated environment (supported: {})",
                SUPPORTED_NAMESPACES.join(", ")
            ),
        ));
    }
    match roles::recognize(name, ty.params().len(), ty.results().len()) {
        Recognition::Known(role) => Ok(role),
        Recognition::ArityMismatch { expected } => {
            let reason = format!(
                "declared {} params -> {} results, expected {}",
                ty.params().len(),
                ty.results().len(),
                expected.join(" or ")
            );
            match policy {
                UnknownImportPolicy::Reject => Err(binding_error(namespace, name, reason)),
                UnknownImportPolicy::NoOp => {
                    tracing::warn!(namespace, name, %reason, "binding mismatched import to a no-op");
                    Ok(Role::Fallback)
                }
            }
        }
        Recognition::Unknown => match policy {
            UnknownImportPolicy::Reject => Err(binding_error(
                namespace,
                name,
                format!(
                    "no emulation for '{}' (rerun with the noop unknown-import policy to stub it)",
                    roles::base_name(name)
                ),
            )),
            UnknownImportPolicy::NoOp => {
                tracing::warn!(namespace, name, "binding unrecognized import to a no-op");
                Ok(Role::Fallback)
            }
        },
    }
}

/// Defines a host function on `linker` for every import of `module`.
pub fn bind_imports(
    linker: &mut Linker<HostEnv>,
    module: &Module,
    policy: UnknownImportPolicy,
) -> Result<Vec<ImportBinding>, HostError> {
    let mut plan = Vec::new();
    for import in module.imports() {
        let namespace = import.module();
        let name = import.name();
        let ty = match import.ty() {
            ExternType::Func(ty) => ty,
            other => {
                let kind = match other {
                    ExternType::Memory(_) => "memory",
                    ExternType::Table(_) => "table",
                    ExternType::Global(_) => "global",
                    _ => "non-function",
                };
                return Err(binding_error(
                    namespace,
                    name,
                    format!("{kind} imports are not emulated"),
                ));
            }
        };
        let role = plan_import(namespace, name, &ty, policy)?;

        let result_types: Vec<ValType> = ty.results().collect();
        plan.push(ImportBinding {
            namespace: namespace.to_string(),
            name: name.to_string(),
            role: role.as_str(),
            params: ty.params().map(|t| val_type_name(&t)).collect(),
            results: result_types.iter().map(val_type_name).collect(),
        });

        let stub_name = name.to_string();
        linker
            .func_new(
                namespace,
                name,
                ty.clone(),
                move |mut caller: Caller<'_, HostEnv>, params: &[Val], results: &mut [Val]| {
                    for (slot, ty) in results.iter_mut().zip(result_types.iter()) {
                        *slot = Val::default_for_ty(ty).unwrap_or(Val::I32(0));
                    }
                    run_role(role, &mut caller, params, results)
                        .with_context(|| format!("host import {stub_name} ({role})"))
                },
            )
            .map_err(|e| binding_error(namespace, name, format!("{e:#}")))?;
        tracing::debug!(namespace, name, role = role.as_str(), "bound import");
    }
    Ok(plan)
}

fn arg_u32(params: &[Val], i: usize) -> u32 {
    match params.get(i) {
        Some(Val::I32(v)) => *v as u32,
        Some(Val::I64(v)) => *v as u32,
        Some(Val::F64(bits)) => f64::from_bits(*bits) as u32,
        _ => 0,
    }
}

fn arg_f64(params: &[Val], i: usize) -> f64 {
    match params.get(i) {
        Some(Val::F64(bits)) => f64::from_bits(*bits),
        Some(Val::F32(bits)) => f64::from(f32::from_bits(*bits)),
        Some(Val::I32(v)) => f64::from(*v),
        Some(Val::I64(v)) => *v as f64,
        _ => 0.0,
    }
}

/// Stores `value` in the first result slot, converted to the slot's type.
fn set_u32(results: &mut [Val], value: u32) {
    if let Some(slot) = results.first_mut() {
        *slot = match slot {
            Val::I32(_) => Val::I32(value as i32),
            Val::I64(_) => Val::I64(i64::from(value)),
            Val::F32(_) => Val::F32((value as f32).to_bits()),
            Val::F64(_) => Val::F64(f64::from(value).to_bits()),
            _ => return,
        };
    }
}

fn set_f64(results: &mut [Val], value: f64) {
    if let Some(slot) = results.first_mut() {
        *slot = match slot {
            Val::F64(_) => Val::F64(value.to_bits()),
            Val::F32(_) => Val::F32((value as f32).to_bits()),
            Val::I32(_) => Val::I32(value as i32),
            Val::I64(_) => Val::I64(value as i64),
            _ => return,
        };
    }
}

fn set_bool(results: &mut [Val], value: bool) {
    set_u32(results, u32::from(value));
}

fn guest_memory(caller: &mut Caller<'_, HostEnv>) -> anyhow::Result<Memory> {
    caller
        .get_export(EXPORT_MEMORY)
        .and_then(Extern::into_memory)
        .ok_or_else(|| anyhow!("guest does not export '{EXPORT_MEMORY}'"))
}

fn read_utf8(caller: &mut Caller<'_, HostEnv>, ptr: u32, len: u32) -> anyhow::Result<String> {
    let mem = guest_memory(caller)?;
    let bytes = memory::slice(mem.data(&*caller), ptr, len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Allocates from the guest's own allocator, from inside an import.
fn guest_malloc(caller: &mut Caller<'_, HostEnv>, size: u32) -> anyhow::Result<u32> {
    let malloc = caller
        .get_export(EXPORT_MALLOC)
        .and_then(Extern::into_func)
        .ok_or_else(|| anyhow!("guest does not export '{EXPORT_MALLOC}'"))?;
    let arity = malloc.ty(&*caller).params().len();
    let args: Vec<Val> = [size as i32, 1]
        .into_iter()
        .take(arity)
        .map(Val::I32)
        .collect();
    let mut out = [Val::I32(0)];
    malloc.call(&mut *caller, &args, &mut out)?;
    match out[0] {
        Val::I32(ptr) => Ok(ptr as u32),
        _ => Err(anyhow!("'{EXPORT_MALLOC}' returned a non-i32 pointer")),
    }
}

fn run_role(
    role: Role,
    caller: &mut Caller<'_, HostEnv>,
    params: &[Val],
    results: &mut [Val],
) -> anyhow::Result<()> {
    match role {
        Role::RandomFill => {
            let array = arg_u32(params, 1);
            let record = caller
                .data()
                .arrays
                .record_of(array)
                .ok_or(TypedArrayError::Unregistered { handle: array })?;
            match record.kind {
                ArrayKind::Synthetic => {
                    let env = caller.data_mut();
                    let dest = env.arrays.synthetic_bytes_mut(array)?;
                    env.entropy.fill_bytes(dest);
                }
                ArrayKind::View => {
                    let mem = guest_memory(caller)?;
                    let (bytes, env) = mem.data_and_store_mut(&mut *caller);
                    env.entropy.fill(bytes, array, record.len)?;
                }
            }
        }
        Role::CopyToTypedArray => {
            let len = arg_u32(params, 1);
            let dst = arg_u32(params, 2);
            let mem = guest_memory(caller)?;
            let (bytes, env) = mem.data_and_store_mut(&mut *caller);
            env.entropy.fill(bytes, dst, len)?;
        }
        Role::ObjectDrop | Role::Describe | Role::Fallback => {}
        Role::ObjectClone | Role::Buffer => set_u32(results, arg_u32(params, 0)),
        Role::IsObject => {
            let is = caller.data().is_object(arg_u32(params, 0));
            set_bool(results, is);
        }
        Role::IsNull => {
            let is = matches!(caller.data().value(arg_u32(params, 0)), Some(HostValue::Null));
            set_bool(results, is);
        }
        Role::IsUndefined => {
            let is = matches!(
                caller.data().value(arg_u32(params, 0)),
                Some(HostValue::Undefined)
            );
            set_bool(results, is);
        }
        Role::IsString => {
            let is = matches!(
                caller.data().value(arg_u32(params, 0)),
                Some(HostValue::String(_))
            );
            set_bool(results, is);
        }
        Role::IsFunction => {
            let is = caller.data().is_function(arg_u32(params, 0));
            set_bool(results, is);
        }
        Role::StringNew => {
            let text = read_utf8(caller, arg_u32(params, 0), arg_u32(params, 1))?;
            let handle = caller.data_mut().intern_string(text);
            set_u32(results, handle);
        }
        Role::StringGet => {
            let ret = arg_u32(params, 0);
            let text = caller
                .data()
                .value(arg_u32(params, 1))
                .and_then(HostValue::as_str)
                .map(str::to_owned);
            let (ptr, len) = match text {
                Some(text) => {
                    let len = u32::try_from(text.len()).context("string exceeds guest memory")?;
                    let ptr = guest_malloc(caller, len)?;
                    let mem = guest_memory(caller)?;
                    memory::slice_mut(mem.data_mut(&mut *caller), ptr, len)?
                        .copy_from_slice(text.as_bytes());
                    (ptr, len)
                }
                None => (0, 0),
            };
            let mem = guest_memory(caller)?;
            let bytes = mem.data_mut(&mut *caller);
            memory::write_u32_le(bytes, ret, ptr)?;
            memory::write_u32_le(bytes, ret.saturating_add(4), len)?;
        }
        Role::NumberNew => {
            let handle = caller
                .data_mut()
                .intern(HostValue::Number(arg_f64(params, 0)));
            set_u32(results, handle);
        }
        Role::NumberGet => {
            if results.is_empty() {
                // (ret_ptr, handle): Option<f64> as i32 flag at +0, f64 at +8.
                let ret = arg_u32(params, 0);
                let value = caller
                    .data()
                    .value(arg_u32(params, 1))
                    .and_then(HostValue::as_number);
                let mem = guest_memory(caller)?;
                let bytes = mem.data_mut(&mut *caller);
                memory::write_u32_le(bytes, ret, u32::from(value.is_some()))?;
                memory::write_f64_le(bytes, ret.saturating_add(8), value.unwrap_or(0.0))?;
            } else {
                let value = caller
                    .data()
                    .value(arg_u32(params, 0))
                    .and_then(HostValue::as_number)
                    .unwrap_or(f64::NAN);
                set_f64(results, value);
            }
        }
        Role::BooleanGet => {
            let answer = match caller
                .data()
                .value(arg_u32(params, 0))
                .and_then(HostValue::as_bool)
            {
                Some(true) => 1,
                Some(false) => 0,
                None => 2,
            };
            set_u32(results, answer);
        }
        Role::ErrorNew => {
            let text = read_utf8(caller, arg_u32(params, 0), arg_u32(params, 1))?;
            let env = caller.data_mut();
            let message = env.intern_string(text);
            let fields = std::iter::once(("message".to_string(), message)).collect();
            let handle = env.intern(HostValue::Map(fields));
            set_u32(results, handle);
        }
        Role::ArrayNew => {
            let handle = caller.data_mut().intern(HostValue::Sequence(Vec::new()));
            set_u32(results, handle);
        }
        Role::ArrayPush => {
            let seq = arg_u32(params, 0);
            let len = caller
                .data_mut()
                .handles
                .push_to_sequence(seq, arg_u32(params, 1))
                .ok_or_else(|| anyhow!("push onto handle {seq}, which is not an array"))?;
            set_u32(results, len);
        }
        Role::Throw => {
            let message = read_utf8(caller, arg_u32(params, 0), arg_u32(params, 1))?;
            tracing::debug!(message = %message, "guest throw");
            return Err(GuestThrow { message }.into());
        }
        Role::TableInit => {
            // The table is seeded on construction.
            tracing::trace!(
                live = caller.data().handles.live_count(),
                "reference table init"
            );
        }
        Role::TableGrow => {
            let previous = caller.data_mut().handles.grow(arg_u32(params, 0));
            set_u32(results, previous);
        }
        Role::TableSetNull => {
            caller.data_mut().handles.set_null(arg_u32(params, 0));
        }
        Role::TypedArrayView => {
            let handle = caller
                .data_mut()
                .arrays
                .record(arg_u32(params, 1), arg_u32(params, 2))?;
            set_u32(results, handle);
        }
        Role::TypedArrayOverBuffer => {
            let mem = guest_memory(caller)?;
            let memory_len = mem.data_size(&*caller);
            let handle = caller.data_mut().arrays.record_memory(memory_len)?;
            set_u32(results, handle);
        }
        Role::TypedArrayWithLength => {
            let mem = guest_memory(caller)?;
            let memory_len = mem.data_size(&*caller);
            let handle = caller
                .data_mut()
                .arrays
                .allocate_synthetic(arg_u32(params, 0), memory_len)?;
            set_u32(results, handle);
        }
        Role::TypedArraySubarray => {
            let handle = caller.data_mut().arrays.subarray(
                arg_u32(params, 0),
                arg_u32(params, 1),
                arg_u32(params, 2),
            )?;
            set_u32(results, handle);
        }
        Role::TypedArraySet => {
            let mem = guest_memory(caller)?;
            let (bytes, env) = mem.data_and_store_mut(&mut *caller);
            env.arrays.set(
                bytes,
                arg_u32(params, 0),
                arg_u32(params, 1),
                arg_u32(params, 2),
            )?;
        }
        Role::TypedArrayLength => {
            let len = caller
                .data()
                .arrays
                .lookup(arg_u32(params, 0))
                .unwrap_or(0);
            set_u32(results, len);
        }
        Role::Probe(probe) => {
            let handle = caller.data_mut().probe_handle(probe);
            set_u32(results, handle);
        }
        Role::Memory => {
            let handle = caller.data_mut().memory_handle();
            set_u32(results, handle);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func_type(params: &[ValType], results: &[ValType]) -> FuncType {
        let engine = wasmtime::Engine::default();
        FuncType::new(&engine, params.iter().cloned(), results.iter().cloned())
    }

    #[test]
    fn plan_rejects_foreign_namespaces() {
        let ty = func_type(&[], &[]);
        let err = plan_import("env", "fetch", &ty, UnknownImportPolicy::NoOp).unwrap_err();
        assert!(matches!(err, HostError::Binding { .. }));
        assert!(err.to_string().contains("env.fetch"));
    }

    #[test]
    fn plan_applies_unknown_import_policy() {
        let ty = func_type(&[ValType::I32], &[ValType::I32]);
        let name = "__wbg_fetch_0123456789abcdef";
        let err = plan_import(
            "__wbindgen_placeholder__",
            name,
            &ty,
            UnknownImportPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no emulation for 'fetch'"));
        assert_eq!(
            plan_import(
                "__wbindgen_placeholder__",
                name,
                &ty,
                UnknownImportPolicy::NoOp
            )
            .unwrap(),
            Role::Fallback
        );
    }

    #[test]
    fn plan_reports_signature_mismatch() {
        let ty = func_type(&[ValType::I32], &[]);
        let err = plan_import(
            "__wbindgen_placeholder__",
            "__wbindgen_string_new",
            &ty,
            UnknownImportPolicy::Reject,
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected 2 params -> 1 results"));
    }

    #[test]
    fn noop_policy_stubs_signature_mismatch() {
        let ty = func_type(&[ValType::I32], &[]);
        let role = plan_import(
            "__wbindgen_placeholder__",
            "__wbindgen_string_new",
            &ty,
            UnknownImportPolicy::NoOp,
        )
        .unwrap();
        assert_eq!(role, Role::Fallback);
    }

    #[test]
    fn new_over_a_buffer_is_a_typed_array() {
        let ty = func_type(&[ValType::I32], &[ValType::I32]);
        let role = plan_import(
            "__wbindgen_placeholder__",
            "__wbg_new_63b92bc8671ed464",
            &ty,
            UnknownImportPolicy::Reject,
        )
        .unwrap();
        assert_eq!(role, Role::TypedArrayOverBuffer);
    }

    #[test]
    fn result_setters_follow_slot_type() {
        let mut results = [Val::I64(0)];
        set_u32(&mut results, 7);
        assert!(matches!(results[0], Val::I64(7)));

        let mut results = [Val::F64(0)];
        set_f64(&mut results, 1.5);
        assert!(matches!(results[0], Val::F64(bits) if f64::from_bits(bits) == 1.5));

        let mut empty: [Val; 0] = [];
        set_u32(&mut empty, 1);
    }
}
