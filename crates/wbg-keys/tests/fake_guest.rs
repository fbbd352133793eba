#![allow(dead_code)]

use wbg_host::{EntropyProvider, EntropySource, GuestSession, HostConfig};

/// Key records are 33 bytes: the algorithm byte then 32 key bytes. The public
/// key is the private bytes inverted; strings are lowercase hex of the record.
const GUEST: &str = r#"(module
  (import "__wbindgen_placeholder__" "__wbg_static_accessor_GLOBAL_THIS_56578be7e9f832b0" (func $global_this (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_crypto_1d1f22824a6a080c" (func $crypto (param i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_is_object" (func $is_object (param i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_memory" (func $memory (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_buffer_609cc3eee51ed158" (func $buffer (param i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_new_63b92bc8671ed464" (func $memory_view (param i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_newwithlength_a381634e90c276d4" (func $with_len (param i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_subarray_aa9065fa9dc5df96" (func $subarray (param i32 i32 i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbg_set_65595bdd868b3009" (func $set (param i32 i32 i32)))
  (import "__wbindgen_placeholder__" "__wbg_getRandomValues_b8f5dbd5f3995a9e" (func $random (param i32 i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_object_drop_ref" (func $drop_ref (param i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_string_new" (func $string_new (param i32 i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_error_new" (func $error_new (param i32 i32) (result i32)))
  (import "__wbindgen_placeholder__" "__wbindgen_throw" (func $throw (param i32 i32)))
  (import "__wbindgen_externref_xform__" "__wbindgen_init_externref_table" (func $table_init))

  (memory (export "memory") 1)
  (data (i32.const 16) "invalid signature algorithm")
  (data (i32.const 64) "invalid private key string")
  (data (i32.const 96) "invalid public key string")
  (data (i32.const 128) "0123456789abcdef")

  (global $heap (mut i32) (i32.const 1024))
  (global $live (mut i32) (i32.const 0))

  (func $malloc (export "__wbindgen_malloc") (param $size i32) (param $align i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.add (global.get $heap)
        (i32.and (i32.add (local.get $size) (i32.const 8)) (i32.const -8))))
    (global.set $live (i32.add (global.get $live) (i32.const 1)))
    (local.get $ptr))
  (func $free (export "__wbindgen_free") (param $ptr i32) (param $size i32) (param $align i32)
    (global.set $live (i32.sub (global.get $live) (i32.const 1))))
  (func (export "live_allocations") (result i32) (global.get $live))

  (func $start (call $table_init))
  (start $start)

  (func $clone (param $key i32) (result i32)
    (local $out i32)
    (local.set $out (call $malloc (i32.const 33) (i32.const 1)))
    (memory.copy (local.get $out) (local.get $key) (i32.const 33))
    (local.get $out))

  (func $derive (param $priv i32) (result i32)
    (local $pub i32) (local $i i32)
    (local.set $pub (call $malloc (i32.const 33) (i32.const 1)))
    (i32.store8 (local.get $pub) (i32.load8_u (local.get $priv)))
    (local.set $i (i32.const 1))
    (block $done
      (loop $next
        (br_if $done (i32.eq (local.get $i) (i32.const 33)))
        (i32.store8 (i32.add (local.get $pub) (local.get $i))
          (i32.xor (i32.load8_u (i32.add (local.get $priv) (local.get $i))) (i32.const 0xFF)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (local.get $pub))

  (func $pair (param $priv i32) (result i32)
    (local $kp i32)
    (local.set $kp (call $malloc (i32.const 8) (i32.const 1)))
    (i32.store (local.get $kp) (local.get $priv))
    (i32.store offset=4 (local.get $kp) (call $derive (local.get $priv)))
    (local.get $kp))

  (func (export "keypair_new") (param $alg i32) (result i32)
    (local $crypto i32) (local $priv i32) (local $array i32)
    (if (i32.gt_u (local.get $alg) (i32.const 1))
      (then
        (call $throw (i32.const 16) (i32.const 27))
        (unreachable)))
    (local.set $crypto (call $crypto (call $global_this)))
    (if (i32.eqz (call $is_object (local.get $crypto)))
      (then (unreachable)))
    (local.set $priv (call $malloc (i32.const 33) (i32.const 1)))
    (i32.store8 (local.get $priv) (local.get $alg))
    ;; Same shape as getrandom's web path: fill a host scratch array, then
    ;; copy the slice into memory through a view of the whole buffer.
    (local.set $array
      (call $subarray (call $with_len (i32.const 32)) (i32.const 0) (i32.const 32)))
    (call $random (local.get $crypto) (local.get $array))
    (call $set
      (call $memory_view (call $buffer (call $memory)))
      (local.get $array)
      (i32.add (local.get $priv) (i32.const 1)))
    (call $drop_ref (local.get $array))
    (call $pair (local.get $priv)))

  (func (export "keypair_fromPrivateKey") (param $priv i32) (result i32)
    (call $pair (call $clone (local.get $priv))))
  (func (export "keypair_getPrivateKey") (param $kp i32) (result i32)
    (call $clone (i32.load (local.get $kp))))
  (func (export "keypair_getPublicKey") (param $kp i32) (result i32)
    (call $clone (i32.load offset=4 (local.get $kp))))

  (func $to_hex (param $ret i32) (param $key i32)
    (local $out i32) (local $i i32) (local $b i32)
    (local.set $out (call $malloc (i32.const 66) (i32.const 1)))
    (block $done
      (loop $next
        (br_if $done (i32.eq (local.get $i) (i32.const 33)))
        (local.set $b (i32.load8_u (i32.add (local.get $key) (local.get $i))))
        (i32.store8 (i32.add (local.get $out) (i32.shl (local.get $i) (i32.const 1)))
          (i32.load8_u (i32.add (i32.const 128) (i32.shr_u (local.get $b) (i32.const 4)))))
        (i32.store8 offset=1 (i32.add (local.get $out) (i32.shl (local.get $i) (i32.const 1)))
          (i32.load8_u (i32.add (i32.const 128) (i32.and (local.get $b) (i32.const 15)))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (i32.store (local.get $ret) (local.get $out))
    (i32.store offset=4 (local.get $ret) (i32.const 66)))

  (func $nibble (param $c i32) (result i32)
    (if (i32.and (i32.ge_u (local.get $c) (i32.const 48)) (i32.le_u (local.get $c) (i32.const 57)))
      (then (return (i32.sub (local.get $c) (i32.const 48)))))
    (if (i32.and (i32.ge_u (local.get $c) (i32.const 97)) (i32.le_u (local.get $c) (i32.const 102)))
      (then (return (i32.sub (local.get $c) (i32.const 87)))))
    (i32.const -1))

  ;; Returns a fresh key record, or 0 when the text is not a valid encoding.
  (func $parse_key (param $ptr i32) (param $len i32) (result i32)
    (local $key i32) (local $i i32) (local $hi i32) (local $lo i32)
    (if (i32.ne (local.get $len) (i32.const 66))
      (then (return (i32.const 0))))
    (local.set $key (call $malloc (i32.const 33) (i32.const 1)))
    (block $done
      (loop $next
        (br_if $done (i32.eq (local.get $i) (i32.const 33)))
        (local.set $hi
          (call $nibble (i32.load8_u (i32.add (local.get $ptr) (i32.shl (local.get $i) (i32.const 1))))))
        (local.set $lo
          (call $nibble (i32.load8_u offset=1 (i32.add (local.get $ptr) (i32.shl (local.get $i) (i32.const 1))))))
        (if (i32.or (i32.lt_s (local.get $hi) (i32.const 0)) (i32.lt_s (local.get $lo) (i32.const 0)))
          (then
            (call $free (local.get $key) (i32.const 33) (i32.const 1))
            (return (i32.const 0))))
        (i32.store8 (i32.add (local.get $key) (local.get $i))
          (i32.or (i32.shl (local.get $hi) (i32.const 4)) (local.get $lo)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (if (i32.gt_u (i32.load8_u (local.get $key)) (i32.const 1))
      (then
        (call $free (local.get $key) (i32.const 33) (i32.const 1))
        (return (i32.const 0))))
    (local.get $key))

  (func (export "privatekey_toString") (param $ret i32) (param $key i32)
    (call $to_hex (local.get $ret) (local.get $key)))
  (func (export "publickey_toString") (param $ret i32) (param $key i32)
    (call $to_hex (local.get $ret) (local.get $key)))

  (func (export "privatekey_fromString") (param $ret i32) (param $ptr i32) (param $len i32)
    (local $key i32)
    (local.set $key (call $parse_key (local.get $ptr) (local.get $len)))
    (if (i32.eqz (local.get $key))
      (then
        (i32.store offset=4 (local.get $ret) (call $string_new (i32.const 64) (i32.const 26)))
        (i32.store offset=8 (local.get $ret) (i32.const 1))
        (return)))
    (i32.store (local.get $ret) (local.get $key))
    (i32.store offset=8 (local.get $ret) (i32.const 0)))

  (func (export "publickey_fromString") (param $ret i32) (param $ptr i32) (param $len i32)
    (local $key i32)
    (local.set $key (call $parse_key (local.get $ptr) (local.get $len)))
    (if (i32.eqz (local.get $key))
      (then
        (i32.store offset=4 (local.get $ret) (call $error_new (i32.const 96) (i32.const 25)))
        (i32.store offset=8 (local.get $ret) (i32.const 1))
        (return)))
    (i32.store (local.get $ret) (local.get $key))
    (i32.store offset=8 (local.get $ret) (i32.const 0)))
)"#;

pub fn wasm() -> Vec<u8> {
    wat::parse_str(GUEST).expect("valid wat")
}

struct Fixed(u8);

impl EntropySource for Fixed {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        buf.fill(self.0);
        buf.len()
    }
}

/// A session whose entropy is the constant `byte`.
pub fn session(byte: u8) -> GuestSession {
    GuestSession::with_entropy(
        &wasm(),
        &HostConfig::default(),
        EntropyProvider::new(Box::new(Fixed(byte))),
    )
    .expect("fake guest loads")
}

pub fn live_allocations(session: &mut GuestSession) -> u32 {
    session
        .call_handle("live_allocations", &[])
        .expect("live_allocations")
}
