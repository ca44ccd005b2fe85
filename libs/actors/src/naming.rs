//! Anonymous actor names.
//!
//! Counters are encoded little-endian in a 64 symbol alphabet behind a `$`
//! prefix (`$a`, `$b`, ... `$~`, `$ab`, ...). User-supplied names may not
//! start with `$`, so generated names never collide with them.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+~";

/// Prefix reserved for generated names
pub const GENERATED_PREFIX: char = '$';

/// Encode a counter value as a generated name
pub fn encode_name(mut value: u64) -> String {
    let mut name = String::with_capacity(12);
    name.push(GENERATED_PREFIX);
    loop {
        name.push(ALPHABET[(value & 63) as usize] as char);
        value >>= 6;
        if value == 0 {
            break;
        }
    }
    name
}

type NextId = Box<dyn Fn() -> u64 + Send + Sync>;

/// Counter strategy producing unique names.
pub struct NameGenerator {
    next_id: NextId,
    strategy: &'static str,
}

impl NameGenerator {
    /// Lock-free counter, shareable between generators
    pub fn atomic(counter: Arc<AtomicU64>) -> Self {
        Self {
            next_id: Box::new(move || counter.fetch_add(1, Ordering::Relaxed)),
            strategy: "atomic",
        }
    }

    /// Plain private counter starting at `start`
    pub fn sequential(start: u64) -> Self {
        let counter = Mutex::new(start);
        Self {
            next_id: Box::new(move || {
                let mut next = counter.lock();
                let id = *next;
                *next += 1;
                id
            }),
            strategy: "sequential",
        }
    }

    pub fn next_name(&self) -> String {
        encode_name((self.next_id)())
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::atomic(Arc::new(AtomicU64::new(0)))
    }
}

impl fmt::Debug for NameGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameGenerator")
            .field("strategy", &self.strategy)
            .finish()
    }
}
