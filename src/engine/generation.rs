//! Wrapping counters for generation ids and snapshot versions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Both counters wrap at this bound so they never grow without limit
pub const COUNTER_MODULUS: u64 = 1_000_000_007;

/// Identifies one submitted query and every event produced for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Counter modulo [`COUNTER_MODULUS`]
#[derive(Debug, Clone, Copy)]
pub struct WrappingCounter {
    value: u64,
}

impl WrappingCounter {
    pub fn starting_at(value: u64) -> Self {
        Self {
            value: value % COUNTER_MODULUS,
        }
    }

    pub fn get(&self) -> u64 {
        self.value
    }

    /// Advance and return the new value
    pub fn advance(&mut self) -> u64 {
        self.value = (self.value + 1) % COUNTER_MODULUS;
        self.value
    }
}

/// Issues generation ids and remembers the active one
#[derive(Debug, Clone)]
pub struct GenerationController {
    counter: WrappingCounter,
}

impl GenerationController {
    pub fn new() -> Self {
        Self {
            counter: WrappingCounter::starting_at(0),
        }
    }

    /// Issue a fresh id; every earlier id becomes stale
    pub fn issue(&mut self) -> GenerationId {
        GenerationId(self.counter.advance())
    }

    pub fn active(&self) -> GenerationId {
        GenerationId(self.counter.get())
    }

    pub fn is_active(&self, id: GenerationId) -> bool {
        self.active() == id
    }
}

impl Default for GenerationController {
    fn default() -> Self {
        Self::new()
    }
}
