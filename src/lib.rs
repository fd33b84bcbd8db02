//! This crate bridges a host register protocol to Faulhaber motion controllers on a serial line.
//!
//! It supports `no-std` environments by use of the `no-std` feature flag.
//!
//! Each drive attribute (position, velocity, limits, currents, enable) is exposed to the host as a
//! typed, bounds-checked register. Registers are backed by ASCII command/query transactions to the
//! drive. The measured position can be streamed to the host periodically while the device is out
//! of standby.
//!
//! Devices this is configured for, see [config::DeviceVariant]:
//! * Rotary joint linear drive
//! * Perturbation treadmill
//!
//! Commands are sent as `<address><opcode>[value]\r` and answers are read up to `\n`. A drive that
//! does not answer within the port timeout reads as absent, not as an error.
//!
//! The serial port used for drive comms should be configured like so:
//! * Baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Read timeout: 5ms

#![cfg_attr(feature = "no-std", no_std)]

pub mod config;
pub mod device;
pub mod drive;
pub mod error;
pub mod estop;
pub mod event;
pub mod mode;
pub mod register;
pub mod registers;
mod response;
pub mod types;

pub use device::Device;

#[cfg(test)]
mod mock_serial;
