//! Identity generation and context ordinals.
//!
//! Session identities come from an [`IdentityGenerator`], which is injected
//! into a context so tests can substitute a deterministic sequence for the
//! default random UUIDs. Context ordinals come from an [`InstanceCounter`];
//! contexts share [`process_counter`] unless a builder supplies another one.
//!
//! # Examples
//!
//! ```
//! use causeway_core::id::{IdentityGenerator, InstanceCounter, SequenceGenerator};
//!
//! let ids = SequenceGenerator::new("req");
//! assert_eq!(ids.next_identity(), "req-0");
//! assert_eq!(ids.next_identity(), "req-1");
//!
//! let counter = InstanceCounter::new();
//! assert_eq!(counter.next(), 0);
//! assert_eq!(counter.next(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use uuid::Uuid;

/// Process-wide counter shared by every context started without an explicit one
static PROCESS_COUNTER: Lazy<Arc<InstanceCounter>> = Lazy::new(Default::default);

/// Source of fresh session identities.
///
/// Implementations must return values with negligible collision probability
/// for the lifetime of the process and must be callable from many threads.
pub trait IdentityGenerator: Send + Sync {
    /// Produce the next identity
    fn next_identity(&self) -> String;

    /// Get the name of this generator
    fn name(&self) -> &str;
}

/// Generator producing random version 4 UUIDs
#[derive(Debug, Clone, Default)]
pub struct UuidGenerator;

impl IdentityGenerator for UuidGenerator {
    fn next_identity(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn name(&self) -> &str {
        "uuid_v4"
    }
}

/// Deterministic generator producing `<prefix>-<n>`
#[derive(Debug)]
pub struct SequenceGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequenceGenerator {
    /// Create a sequence starting at zero
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 0)
    }

    /// Create a sequence starting at `start`
    pub fn starting_at(prefix: impl Into<String>, start: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(start),
        }
    }
}

impl IdentityGenerator for SequenceGenerator {
    fn next_identity(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }

    fn name(&self) -> &str {
        &self.prefix
    }
}

/// Monotonic counter handing out context ordinals
#[derive(Debug, Default)]
pub struct InstanceCounter {
    value: AtomicU64,
}

impl InstanceCounter {
    /// Create a counter starting at zero
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Take the next ordinal
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of ordinals handed out so far
    pub fn issued(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

impl fmt::Display for InstanceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceCounter({})", self.issued())
    }
}

/// The counter shared by all contexts in this process
pub fn process_counter() -> Arc<InstanceCounter> {
    PROCESS_COUNTER.clone()
}
