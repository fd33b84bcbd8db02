//! Operational mode as seen through the host engine's operation-control register.
//!
//! The register itself belongs to the host protocol engine. This module only decodes writes to
//! it and arms or disarms telemetry accordingly.

use log::debug;
use modular_bitfield::prelude::*;

use crate::event::Event;

/// Operation-control byte.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationControl {
    /// See [`OperationMode`].
    pub op_mode: B2,
    #[skip]
    __: B1,
    /// Dump every register to the host once.
    pub dump: bool,
    /// Suppress replies to host commands.
    pub mute_replies: bool,
    pub visual_enabled: bool,
    pub op_led_enabled: bool,
    /// Periodic alive messages.
    pub alive_enabled: bool,
}

impl From<u8> for OperationControl {
    fn from(value: u8) -> Self {
        OperationControl::from_bytes([value])
    }
}

impl From<OperationControl> for u8 {
    fn from(value: OperationControl) -> Self {
        value.into_bytes()[0]
    }
}

impl OperationControl {
    pub fn mode(&self) -> OperationMode {
        OperationMode::from(self.op_mode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    #[default]
    Standby,
    Active,
    Reserved,
    Speed,
}

/// Only the two low bits are looked at.
impl From<u8> for OperationMode {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => OperationMode::Standby,
            1 => OperationMode::Active,
            2 => OperationMode::Reserved,
            _ => OperationMode::Speed,
        }
    }
}

impl OperationMode {
    /// Telemetry streams in every mode except standby.
    pub fn streams_telemetry(self) -> bool {
        self != OperationMode::Standby
    }
}

/// Arms every event when the device leaves standby and disarms them when it returns.
#[derive(Debug, Default)]
pub struct ModeGate {
    mode: OperationMode,
}

impl ModeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Post-write hook for the operation-control register.
    ///
    /// Reapplies the armed flags even if the mode did not change.
    pub fn on_operation_control(&mut self, control: OperationControl, events: &[Event<'_>]) {
        let mode = control.mode();
        if mode != self.mode {
            debug!("operation mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
        for event in events {
            event.arm(mode.streams_telemetry());
        }
    }
}
