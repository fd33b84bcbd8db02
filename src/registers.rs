//! This module is used to define the registers exposed to the host.
//!
//! Register numbers below 32 belong to the host protocol engine. Of those, only the device name is
//! populated here.

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::{
    config::DeviceConfig,
    drive::SerialBus,
    error::Result,
    register::{AccessMode, Binding, RegisterBank, RegisterBuilder, drive_value},
    types::{PayloadType, Sample, State},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum DriveRegister {
    /// __R/W__ - Device identity string, `U8` array.
    DeviceName = 12,
    /// __R/W__ - Velocity setpoint, `S16`.
    ///
    /// Reads return the last written value.
    VelocitySet = 33,
    /// __R__ - Measured velocity, `S16`.
    VelocityActual = 34,
    /// __R/W__ - Power stage enable, `U8`.
    /// * `0` - Disabled.
    /// * Anything else - Enabled. Reads back as `1`.
    Enable = 40,
    /// __R/W__ - Position limits `(negative, positive)`, `S32` pair.
    ///
    /// Commanded to the drive at boot. The defaults are only a starting point, any `S32` pair is
    /// accepted.
    PositionLimits = 41,
    /// __R/W__ - Home position, `S32`.
    ///
    /// Writing defines the current position as the written value. Reads return the last written value.
    Home = 42,
    /// __R/W__ - Target position, `S32`.
    ///
    /// Writing starts a move. Reads return the last written value.
    PositionSet = 43,
    /// __R__ - Measured position, `S32`.
    PositionActual = 44,
    /// __R/W__ - Speed limit for positioning moves, `U16`.
    ///
    /// Commanded to the drive at boot.
    SpeedLimit = 45,
    /// __R/W__ - Continuous current limit, `U16`.
    ///
    /// Commanded to the drive at boot. Only present on devices with current limits.
    ContinuousCurrentLimit = 46,
    /// __R/W__ - Peak current limit, `U16`.
    ///
    /// Commanded to the drive at boot. Only present on devices with current limits.
    PeakCurrentLimit = 47,
    /// __W__ - Range limit enable, `U8`.
    /// * `0` - Position limits ignored.
    /// * Anything else - Position limits enforced.
    RangeLimitEnable = 48,
}

impl From<DriveRegister> for u8 {
    fn from(value: DriveRegister) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for DriveRegister {
    type Error = ();
    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        DriveRegister::iter()
            .find(|register| *register as u8 == value)
            .ok_or(())
    }
}

impl DriveRegister {
    pub fn payload_type(self) -> PayloadType {
        match self {
            DriveRegister::DeviceName | DriveRegister::Enable | DriveRegister::RangeLimitEnable => {
                PayloadType::U8
            }
            DriveRegister::VelocitySet | DriveRegister::VelocityActual => PayloadType::S16,
            DriveRegister::PositionLimits
            | DriveRegister::Home
            | DriveRegister::PositionSet
            | DriveRegister::PositionActual => PayloadType::S32,
            DriveRegister::SpeedLimit
            | DriveRegister::ContinuousCurrentLimit
            | DriveRegister::PeakCurrentLimit => PayloadType::U16,
        }
    }

    /// How this register is built for `config`, or `None` if the device does not have it.
    pub fn definition<S: embedded_io::Read + embedded_io::Write>(
        self,
        config: &DeviceConfig,
    ) -> Option<RegisterBuilder<S>> {
        let builder = RegisterBuilder::new(self.into(), self.payload_type());
        let drive = config.drive;

        let builder = match self {
            DriveRegister::DeviceName => builder.with_initial_bytes(config.name.as_bytes()),
            DriveRegister::Enable => builder.as_boolean().on_drive(
                drive,
                Binding {
                    refresh: None,
                    apply: Some(|drive, value| {
                        drive.set_enable(State::from(drive_value(value, 0)? as i64))
                    }),
                },
            ),
            DriveRegister::PositionLimits => builder
                .with_initial(&[
                    config.position_limits.0 as i64,
                    config.position_limits.1 as i64,
                ])
                .on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| {
                            Ok(drive
                                .limits()?
                                .map(|(negative, positive)| Sample::Pair(negative, positive)))
                        }),
                        apply: Some(|drive, value| {
                            drive.set_limits(drive_value(value, 0)?, drive_value(value, 1)?)
                        }),
                    },
                )
                .seed_drive(),
            DriveRegister::Home => builder.on_drive(
                drive,
                Binding {
                    refresh: None,
                    apply: Some(|drive, value| drive.set_home(drive_value(value, 0)?)),
                },
            ),
            DriveRegister::PositionSet => builder.on_drive(
                drive,
                Binding {
                    refresh: None,
                    apply: Some(|drive, value| drive.set_position(drive_value(value, 0)?)),
                },
            ),
            DriveRegister::PositionActual => {
                builder.with_access(AccessMode::ReadOnly).on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| Ok(drive.position()?.map(Sample::One))),
                        apply: None,
                    },
                )
            }
            DriveRegister::SpeedLimit => builder
                .with_initial(&[config.speed_limit as i64])
                .on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| Ok(drive.speed()?.map(Sample::One))),
                        apply: Some(|drive, value| drive.set_speed(drive_value(value, 0)?)),
                    },
                )
                .seed_drive(),
            DriveRegister::VelocitySet => builder.on_drive(
                drive,
                Binding {
                    refresh: None,
                    apply: Some(|drive, value| drive.set_velocity(drive_value(value, 0)?)),
                },
            ),
            DriveRegister::VelocityActual => {
                builder.with_access(AccessMode::ReadOnly).on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| Ok(drive.velocity()?.map(Sample::One))),
                        apply: None,
                    },
                )
            }
            DriveRegister::ContinuousCurrentLimit => builder
                .with_initial(&[config.current_limits?.continuous as i64])
                .on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| Ok(drive.continuous_current()?.map(Sample::One))),
                        apply: Some(|drive, value| {
                            drive.set_continuous_current(drive_value(value, 0)?)
                        }),
                    },
                )
                .seed_drive(),
            DriveRegister::PeakCurrentLimit => builder
                .with_initial(&[config.current_limits?.peak as i64])
                .on_drive(
                    drive,
                    Binding {
                        refresh: Some(|drive| Ok(drive.peak_current()?.map(Sample::One))),
                        apply: Some(|drive, value| drive.set_peak_current(drive_value(value, 0)?)),
                    },
                )
                .seed_drive(),
            DriveRegister::RangeLimitEnable if config.range_limit_register => builder
                .with_access(AccessMode::WriteOnly)
                .as_boolean()
                .on_drive(
                    drive,
                    Binding {
                        refresh: None,
                        apply: Some(|drive, value| {
                            drive.set_range_limits_enabled(State::from(
                                drive_value(value, 0)? as i64,
                            ))
                        }),
                    },
                ),
            DriveRegister::RangeLimitEnable => return None,
        };
        Some(builder)
    }
}

/// Build every register `config` defines, in register order, commanding boot defaults to the
/// drive as they are created.
pub fn build_bank<S: embedded_io::Read + embedded_io::Write, const N: usize>(
    bus: &mut SerialBus<S>,
    config: &DeviceConfig,
) -> Result<RegisterBank<S, N>, S::Error> {
    let mut bank = RegisterBank::new();
    for register in DriveRegister::iter() {
        if let Some(definition) = register.definition(config) {
            bank.insert(definition.build(bus)?)?;
        }
    }
    Ok(bank)
}
