//! Compiled-in configuration for the supported devices.
//!
//! Both devices speak to a single drive at node address 2 over a 115200 baud, 8N1 line with a
//! short read timeout. They differ in identity, speed limit and which current registers exist.

use fugit::MillisDurationU32;
use strum_macros::EnumIter;

use crate::drive::DriveAddress;

pub const SERIAL_BAUD_RATE: u32 = 115_200;
/// Read timeout of the drive serial port. Queries that get no answer within it read as absent.
pub const SERIAL_TIMEOUT_MS: u64 = 5;
pub const DEFAULT_DRIVE_ADDRESS: DriveAddress = DriveAddress(2);
pub const DEFAULT_SAMPLING_PERIOD: MillisDurationU32 = MillisDurationU32::millis(100);

/// Default current limits, in drive units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentLimits {
    pub continuous: u16,
    pub peak: u16,
}

impl Default for CurrentLimits {
    fn default() -> Self {
        Self {
            continuous: 900,
            peak: 900,
        }
    }
}

/// Everything that differs between devices built on this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Identity string exposed through the device name register.
    pub name: &'static str,
    /// Bus address of the drive the registers are bound to.
    pub drive: DriveAddress,
    /// Position limits commanded at boot, `(negative, positive)`.
    pub position_limits: (i32, i32),
    /// Speed limit commanded at boot.
    pub speed_limit: u16,
    /// Current limits commanded at boot. `None` leaves out the current limit registers.
    pub current_limits: Option<CurrentLimits>,
    /// Whether the range limit enable register exists.
    pub range_limit_register: bool,
    /// Period of the position telemetry event.
    pub sampling_period: MillisDurationU32,
}

impl DeviceConfig {
    pub const fn new(name: &'static str, drive: DriveAddress) -> Self {
        Self {
            name,
            drive,
            position_limits: (-1000, 160_000),
            speed_limit: 2000,
            current_limits: None,
            range_limit_register: false,
            sampling_period: DEFAULT_SAMPLING_PERIOD,
        }
    }

    pub const fn with_speed_limit(mut self, speed_limit: u16) -> Self {
        self.speed_limit = speed_limit;
        self
    }

    pub const fn with_current_limits(mut self, continuous: u16, peak: u16) -> Self {
        self.current_limits = Some(CurrentLimits { continuous, peak });
        self
    }

    pub const fn with_range_limit_register(mut self) -> Self {
        self.range_limit_register = true;
        self
    }

    pub const fn with_position_limits(mut self, negative: i32, positive: i32) -> Self {
        self.position_limits = (negative, positive);
        self
    }

    pub const fn with_sampling_period(mut self, period: MillisDurationU32) -> Self {
        self.sampling_period = period;
        self
    }
}

/// The devices this crate knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum DeviceVariant {
    /// Linear drive on a rotary joint, with current limits and switchable range limits.
    LinearDrive,
    /// Perturbation treadmill belt drive.
    PerturbationTreadmill,
}

impl DeviceVariant {
    pub const fn config(self) -> DeviceConfig {
        match self {
            DeviceVariant::LinearDrive => {
                DeviceConfig::new("Rotary Joint Linear drive", DEFAULT_DRIVE_ADDRESS)
                    .with_speed_limit(7583)
                    .with_current_limits(900, 900)
                    .with_range_limit_register()
            }
            DeviceVariant::PerturbationTreadmill => {
                DeviceConfig::new("Perturbation treadmill", DEFAULT_DRIVE_ADDRESS)
                    .with_speed_limit(2000)
            }
        }
    }
}

impl From<DeviceVariant> for DeviceConfig {
    fn from(value: DeviceVariant) -> Self {
        value.config()
    }
}
