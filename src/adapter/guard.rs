//! One-shot lifecycle guards.

use std::sync::atomic::{AtomicBool, Ordering};

/// A flag that transitions false → true exactly once and is never reset.
#[derive(Debug, Default)]
pub struct OneShot(AtomicBool);

impl OneShot {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag. Returns `true` for exactly one caller, the one that
    /// performed the transition; every later caller gets `false`.
    pub fn fire(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
