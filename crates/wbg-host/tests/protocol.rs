use wbg_host::{GuestSession, HostError};

mod wat_guest;
use wat_guest::{live_allocations, module, session, PH};

fn guest() -> Vec<u8> {
    let imports = format!(
        r#"(import "{PH}" "__wbindgen_string_new" (func $string_new (param i32 i32) (result i32)))
  (import "{PH}" "__wbindgen_error_new" (func $error_new (param i32 i32) (result i32)))"#
    );
    module(
        &imports,
        r##"
  (data (i32.const 16) "greetings")
  (data (i32.const 32) "empty input")
  (func (export "greet") (param $ret i32) (param $self i32)
    (local $p i32)
    (local.set $p (call $malloc (i32.const 9) (i32.const 1)))
    (memory.copy (local.get $p) (i32.const 16) (i32.const 9))
    (i32.store (local.get $ret) (local.get $p))
    (i32.store offset=4 (local.get $ret) (i32.const 9)))
  (func (export "garbled") (param $ret i32)
    (local $p i32)
    (local.set $p (call $malloc (i32.const 2) (i32.const 1)))
    (i32.store16 (local.get $p) (i32.const 0xFFFE))
    (i32.store (local.get $ret) (local.get $p))
    (i32.store offset=4 (local.get $ret) (i32.const 2)))
  ;; "" fails with a string, "!.." with an error object, "#.." traps,
  ;; anything else yields len + 1000.
  (func (export "parse") (param $ret i32) (param $ptr i32) (param $len i32)
    (if (i32.eqz (local.get $len))
      (then
        (i32.store offset=4 (local.get $ret) (call $string_new (i32.const 32) (i32.const 11)))
        (i32.store offset=8 (local.get $ret) (i32.const 1))
        (return)))
    (if (i32.eq (i32.load8_u (local.get $ptr)) (i32.const 33))
      (then
        (i32.store offset=4 (local.get $ret) (call $error_new (i32.const 32) (i32.const 11)))
        (i32.store offset=8 (local.get $ret) (i32.const 1))
        (return)))
    (if (i32.eq (i32.load8_u (local.get $ptr)) (i32.const 35))
      (then unreachable))
    (i32.store (local.get $ret) (i32.add (local.get $len) (i32.const 1000)))
    (i32.store offset=8 (local.get $ret) (i32.const 0)))
"##,
    )
}

#[test]
fn string_results_free_buffer_and_return_area() {
    let mut s = session(&guest());
    assert_eq!(s.call_returning_string("greet", &[7]).unwrap(), "greetings");
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn non_utf8_string_is_a_protocol_error() {
    let mut s = session(&guest());
    let err = s.call_returning_string("garbled", &[]).unwrap_err();
    assert!(matches!(err, HostError::Protocol { .. }), "{err}");
    assert!(!s.is_poisoned());
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn fallible_success_returns_the_value() {
    let mut s = session(&guest());
    let calls = s.guest_calls();
    assert_eq!(s.call_fallible("parse", b"abc").unwrap(), 1003);
    // malloc x2, parse, free x2
    assert_eq!(s.guest_calls(), calls + 5);
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn fallible_string_error_is_decoded() {
    let mut s = session(&guest());
    let err = s.call_fallible("parse", b"").unwrap_err();
    assert_eq!(err.to_string(), "parse failed: empty input");
    let failure = err.guest_failure().unwrap();
    assert!(failure.fields.is_empty());
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn fallible_error_object_carries_fields() {
    let mut s = session(&guest());
    let err = s.call_fallible("parse", b"!x").unwrap_err();
    let failure = err.guest_failure().unwrap();
    assert_eq!(failure.message, "empty input");
    assert_eq!(
        failure.fields.get("message").map(String::as_str),
        Some("empty input")
    );
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn trap_inside_fallible_call_poisons_without_freeing() {
    let mut s = session(&guest());
    let err = s.call_fallible("parse", b"#").unwrap_err();
    assert!(matches!(err, HostError::Trap { ref operation, .. } if operation == "parse"));
    let err = s.call_handle("live_allocations", &[]).unwrap_err();
    assert!(matches!(err, HostError::SessionPoisoned { .. }));
    assert!(err.to_string().contains("terminated by an earlier trap"));
}

#[test]
fn scratch_is_released_when_the_body_fails() {
    let mut s = session(&guest());
    let err = s
        .with_scratch("probe", |session, scratch| {
            scratch.alloc(session, 32)?;
            scratch.pass_bytes(session, b"xyz")?;
            assert_eq!(scratch.len(), 2);
            assert_eq!(live_allocations(session), 2);
            Err::<(), _>(HostError::Protocol {
                operation: "probe".to_string(),
                message: "abandoned".to_string(),
            })
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "probe: abandoned");
    assert_eq!(live_allocations(&mut s), 0);
}

#[test]
fn out_of_bounds_access_is_a_memory_error() {
    let mut s = session(&guest());
    let err = s.write_bytes(65_535, &[0; 4]).unwrap_err();
    assert!(matches!(err, HostError::Memory { .. }), "{err}");
    assert!(s.read_bytes(u32::MAX, 1).is_err());
}

#[test]
fn missing_export_is_not_fatal() {
    let mut s: GuestSession = session(&guest());
    let err = s.call_handle("nope", &[]).unwrap_err();
    assert_eq!(err.to_string(), "exported function 'nope' not found");
    assert!(!s.is_poisoned());
}
