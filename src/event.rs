//! Periodic telemetry.
//!
//! A hardware timer owns an [`EventTrigger`] and calls [`EventTrigger::fire`] from its interrupt
//! handler. That only marks a sample as pending. The register read and the serial round trip it
//! needs happen later in the cooperative loop, see [`crate::device::Device::service`].

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use fugit::MillisDurationU32;
use log::trace;

use crate::types::{Payload, PayloadType};

/// Interrupt-safe flags shared between a timer and the cooperative loop.
#[derive(Debug, Default)]
pub struct EventTrigger {
    armed: AtomicBool,
    pending: AtomicBool,
    overruns: AtomicU32,
}

impl EventTrigger {
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
        }
    }

    /// Timer side. Marks a sample as pending if the event is armed.
    ///
    /// Firing again before the loop took the previous sample counts an overrun, the two
    /// samples are coalesced into one.
    pub fn fire(&self) {
        if !self.armed.load(Ordering::Acquire) {
            return;
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Disarming also drops a sample that is still pending.
    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::Release);
        if !armed {
            self.pending.store(false, Ordering::Release);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Loop side. Returns `true` once per pending sample.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel) && self.is_armed()
    }

    /// Triggers that were coalesced because the loop fell behind.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// One register streamed to the host whenever its trigger fires.
#[derive(Debug, Clone, Copy)]
pub struct Event<'t> {
    register: u8,
    typ: PayloadType,
    period: MillisDurationU32,
    trigger: &'t EventTrigger,
}

impl<'t> Event<'t> {
    pub fn new(
        register: u8,
        typ: PayloadType,
        period: MillisDurationU32,
        trigger: &'t EventTrigger,
    ) -> Self {
        Self {
            register,
            typ,
            period,
            trigger,
        }
    }

    pub fn register(&self) -> u8 {
        self.register
    }

    pub fn payload_type(&self) -> PayloadType {
        self.typ
    }

    /// Period the timer behind this event is expected to fire at.
    pub fn period(&self) -> MillisDurationU32 {
        self.period
    }

    pub fn trigger(&self) -> &'t EventTrigger {
        self.trigger
    }

    pub fn is_armed(&self) -> bool {
        self.trigger.is_armed()
    }

    pub(crate) fn arm(&self, armed: bool) {
        trace!(
            "event for register {} {}",
            self.register,
            if armed { "armed" } else { "disarmed" }
        );
        self.trigger.arm(armed);
    }

    pub(crate) fn take_pending(&self) -> bool {
        self.trigger.take_pending()
    }
}

/// Outbound path of the host protocol engine for unsolicited messages.
pub trait TelemetrySink {
    fn emit(&mut self, register: u8, payload: &Payload);
}

impl<F: FnMut(u8, &Payload)> TelemetrySink for F {
    fn emit(&mut self, register: u8, payload: &Payload) {
        self(register, payload)
    }
}
