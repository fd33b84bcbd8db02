//! Emergency stop latch.
//!
//! The stop input's interrupt handler calls [`EmergencyStop::trip`]. The drive is disabled on the
//! next pass of the cooperative loop, and enabling is refused until the input is released.

use core::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct EmergencyStop {
    asserted: AtomicBool,
    tripped: AtomicBool,
}

impl EmergencyStop {
    pub const fn new() -> Self {
        Self {
            asserted: AtomicBool::new(false),
            tripped: AtomicBool::new(false),
        }
    }

    /// Interrupt side. Asserts the stop and requests a disable.
    pub fn trip(&self) {
        self.asserted.store(true, Ordering::Release);
        self.tripped.store(true, Ordering::Release);
    }

    /// The stop input returned to its idle level. Does not re-enable anything.
    pub fn release(&self) {
        self.asserted.store(false, Ordering::Release);
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }

    /// Returns `true` once per trip.
    pub fn take_tripped(&self) -> bool {
        self.tripped.swap(false, Ordering::AcqRel)
    }

    /// Put back a trip taken with [`Self::take_tripped`] whose disable did not go through.
    ///
    /// Leaves the asserted level alone, so a release in the meantime is kept.
    pub fn restore_tripped(&self) {
        self.tripped.store(true, Ordering::Release);
    }
}
