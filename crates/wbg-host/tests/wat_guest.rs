#![allow(dead_code)]

use wbg_host::{EntropyProvider, EntropySource, GuestSession, HostConfig};

pub const PH: &str = "__wbindgen_placeholder__";

/// A minimal wasm-bindgen-shaped guest: exported memory, a bump allocator
/// that counts live allocations, and whatever imports/functions the test adds.
pub fn module(imports: &str, body: &str) -> Vec<u8> {
    let text = format!(
        r#"(module
  {imports}
  (memory (export "memory") 1)
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
  {body}
)"#
    );
    wat::parse_str(text).expect("valid wat")
}

pub fn session(wasm: &[u8]) -> GuestSession {
    GuestSession::from_bytes(wasm, &HostConfig::default()).expect("guest loads")
}

pub fn live_allocations(session: &mut GuestSession) -> u32 {
    session
        .call_handle("live_allocations", &[])
        .expect("live_allocations")
}

/// Yields `byte` forever, or only `limit` bytes per read when capped.
pub struct Fixed {
    pub byte: u8,
    pub limit: Option<usize>,
}

impl EntropySource for Fixed {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.limit.map_or(buf.len(), |l| l.min(buf.len()));
        buf[..n].fill(self.byte);
        n
    }
}

pub fn fixed_entropy(byte: u8, limit: Option<usize>) -> EntropyProvider {
    EntropyProvider::new(Box::new(Fixed { byte, limit }))
}
