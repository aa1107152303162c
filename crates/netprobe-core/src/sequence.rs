//! Identifier/sequence allocation for echo requests.

use crate::ProbeIds;
use std::sync::atomic::{AtomicU16, Ordering};

/// Wrapping counter shared by every engine of a probing context.
///
/// Each call to [`SequenceCounter::next`] hands out a fresh identifier and
/// sequence. Values wrap at 16 bits; collisions between concurrent requests
/// after a wrap are tolerated because replies are also matched by source.
#[derive(Debug)]
pub struct SequenceCounter {
    salt: u16,
    counter: AtomicU16,
}

impl SequenceCounter {
    pub fn new(salt: u16) -> Self {
        Self {
            salt,
            counter: AtomicU16::new(0),
        }
    }

    /// Creates a counter salted with the low bits of the process id, so two
    /// probe processes on one host do not stamp identical identifiers.
    pub fn for_process() -> Self {
        Self::new((std::process::id() & 0xFFFF) as u16)
    }

    pub fn next(&self) -> ProbeIds {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        ProbeIds {
            identifier: self.salt.wrapping_add(count),
            sequence: count,
        }
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::for_process()
    }
}
