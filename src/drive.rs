use core::fmt::Write as _;

use embedded_io::Error as _;
use log::{debug, trace, warn};
use strum_macros::{EnumIter, IntoStaticStr};

use crate::{
    error::{Error, Result},
    response::parse_value,
    types::State,
};

/// Longest command or response line we handle, in bytes.
pub const LINE_CAPACITY: usize = 32;

/// Node address of a drive on the serial bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DriveAddress(pub u8);

impl core::fmt::Display for DriveAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ASCII opcodes understood by the drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum Opcode {
    #[strum(serialize = "EN")]
    Enable,
    #[strum(serialize = "DI")]
    Disable,
    #[strum(serialize = "HO")]
    Home,
    /// Load absolute target position.
    #[strum(serialize = "LA")]
    LoadAbsolute,
    /// Move to the loaded target.
    #[strum(serialize = "M")]
    Move,
    /// Load a position limit. Positive values set the positive limit, others the negative one.
    #[strum(serialize = "LL")]
    LoadLimit,
    #[strum(serialize = "V")]
    Velocity,
    #[strum(serialize = "SP")]
    Speed,
    #[strum(serialize = "LCC")]
    ContinuousCurrent,
    #[strum(serialize = "LPC")]
    PeakCurrent,
    /// Activate (`1`) or deactivate (`0`) the position range limits.
    #[strum(serialize = "APL")]
    PositionLimits,
    #[strum(serialize = "POS")]
    GetPosition,
    #[strum(serialize = "GPL")]
    GetPositiveLimit,
    #[strum(serialize = "GNL")]
    GetNegativeLimit,
    #[strum(serialize = "GN")]
    GetVelocity,
    #[strum(serialize = "GSP")]
    GetSpeed,
    #[strum(serialize = "GCC")]
    GetContinuousCurrent,
    #[strum(serialize = "GPC")]
    GetPeakCurrent,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Queries are answered with a response line and never change drive state.
    pub fn is_query(self) -> bool {
        matches!(
            self,
            Opcode::GetPosition
                | Opcode::GetPositiveLimit
                | Opcode::GetNegativeLimit
                | Opcode::GetVelocity
                | Opcode::GetSpeed
                | Opcode::GetContinuousCurrent
                | Opcode::GetPeakCurrent
        )
    }
}

/// The serial line shared by every drive on the bus.
///
/// Holding `&mut SerialBus` is what grants a caller the bus: one command, or one query and its
/// response line, happens per borrow.
pub struct SerialBus<S: embedded_io::Read + embedded_io::Write> {
    interface: S,
    /// The last response line was cut short by the timeout, its tail may still arrive.
    resync: bool,
}

impl<S: embedded_io::Read + embedded_io::Write> SerialBus<S> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            resync: false,
        }
    }

    /// Borrow the bus to talk to the drive at `address`.
    pub fn drive(&mut self, address: DriveAddress) -> FaulhaberDrive<'_, S> {
        FaulhaberDrive { bus: self, address }
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Send `<address><opcode>[value]\r`. No response is expected.
    pub fn command(
        &mut self,
        address: DriveAddress,
        opcode: Opcode,
        value: Option<i32>,
    ) -> Result<(), S::Error> {
        let line = Self::format(address, opcode, value)?;
        trace!("drive {} <- {}", address, line.trim_end());
        self.interface
            .write_all(line.as_bytes())
            .map_err(Error::SerialError)?;
        self.interface.flush().map_err(Error::SerialError)
    }

    /// Send `<address><opcode>\r` and parse the numeric value out of the response line.
    ///
    /// Returns `None` if the drive stays silent or answers without a number.
    pub fn query(&mut self, address: DriveAddress, opcode: Opcode) -> Result<Option<i32>, S::Error> {
        if self.resync {
            self.drain()?;
        }
        self.command(address, opcode, None)?;
        let Some(line) = self.read_line()? else {
            warn!("drive {} did not answer {}", address, opcode.mnemonic());
            return Ok(None);
        };
        let value = parse_value(&line);
        if value.is_none() {
            warn!(
                "drive {} sent no value for {}: {:?}",
                address,
                opcode.mnemonic(),
                line.as_slice()
            );
        }
        trace!("drive {} -> {:?}", address, value);
        Ok(value)
    }

    fn format(
        address: DriveAddress,
        opcode: Opcode,
        value: Option<i32>,
    ) -> Result<heapless::String<LINE_CAPACITY>, S::Error> {
        let mut line = heapless::String::new();
        write!(line, "{}{}", address, opcode.mnemonic()).map_err(|_| Error::BufferError)?;
        if let Some(value) = value {
            write!(line, "{}", value).map_err(|_| Error::BufferError)?;
        }
        line.push('\r').map_err(|_| Error::BufferError)?;
        Ok(line)
    }

    /// Read up to and including `\n`, or until the port times out.
    ///
    /// Bytes beyond [`LINE_CAPACITY`] are dropped. Returns `None` if nothing arrived at all.
    fn read_line(&mut self) -> Result<Option<heapless::Vec<u8, LINE_CAPACITY>>, S::Error> {
        let mut line: heapless::Vec<u8, LINE_CAPACITY> = heapless::Vec::new();
        let mut dropped = 0usize;
        let mut terminated = false;
        while let Some(next) = self.read_byte()? {
            if line.push(next).is_err() {
                dropped += 1;
            }
            if next == b'\n' {
                terminated = true;
                break;
            }
        }
        if dropped > 0 {
            warn!("response longer than {} bytes, dropped {}", LINE_CAPACITY, dropped);
        }
        self.resync = !terminated;
        Ok(if line.is_empty() { None } else { Some(line) })
    }

    /// One byte, or `None` once the port times out.
    fn read_byte(&mut self) -> Result<Option<u8>, S::Error> {
        let mut byte = [0u8; 1];
        match self.interface.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(Error::SerialError(e)),
        }
    }

    /// Discard whatever arrived after the last response timed out.
    fn drain(&mut self) -> Result<(), S::Error> {
        let mut discarded = 0usize;
        while self.read_byte()?.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("discarded {} late response bytes", discarded);
        }
        self.resync = false;
        Ok(())
    }
}

/// One Faulhaber motion controller on a [`SerialBus`].
///
/// Each method is a single bus transaction (or two, where noted). Nothing is cached, so reading
/// the same attribute twice may give different answers, or `None` if the drive stays silent.
pub struct FaulhaberDrive<'b, S: embedded_io::Read + embedded_io::Write> {
    bus: &'b mut SerialBus<S>,
    address: DriveAddress,
}

impl<S: embedded_io::Read + embedded_io::Write> FaulhaberDrive<'_, S> {
    pub fn address(&self) -> DriveAddress {
        self.address
    }

    /// Enable or disable the power stage.
    pub fn set_enable(&mut self, state: impl Into<State>) -> Result<(), S::Error> {
        let opcode = match state.into() {
            State::On => Opcode::Enable,
            State::Off => Opcode::Disable,
        };
        self.bus.command(self.address, opcode, None)
    }

    /// Define the current position as `position`.
    pub fn set_home(&mut self, position: i32) -> Result<(), S::Error> {
        self.bus.command(self.address, Opcode::Home, Some(position))
    }

    /// Reading home gives the current position, the drive has no query for it.
    pub fn home(&mut self) -> Result<Option<i32>, S::Error> {
        self.position()
    }

    pub fn position(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetPosition)
    }

    /// Load an absolute target and start moving to it. Two transactions.
    pub fn set_position(&mut self, position: i32) -> Result<(), S::Error> {
        self.bus
            .command(self.address, Opcode::LoadAbsolute, Some(position))?;
        self.bus.command(self.address, Opcode::Move, None)
    }

    pub fn positive_limit(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetPositiveLimit)
    }

    pub fn negative_limit(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetNegativeLimit)
    }

    /// Load one position limit. The drive picks the side from the sign.
    pub fn set_limit(&mut self, limit: i32) -> Result<(), S::Error> {
        self.bus.command(self.address, Opcode::LoadLimit, Some(limit))
    }

    /// Load both limits, negative first. Two transactions.
    pub fn set_limits(&mut self, negative: i32, positive: i32) -> Result<(), S::Error> {
        self.set_limit(negative)?;
        self.set_limit(positive)
    }

    /// Both limits as `(negative, positive)`, or `None` unless both queries answered.
    pub fn limits(&mut self) -> Result<Option<(i32, i32)>, S::Error> {
        let negative = self.negative_limit()?;
        let positive = self.positive_limit()?;
        Ok(negative.zip(positive))
    }

    pub fn velocity(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetVelocity)
    }

    pub fn set_velocity(&mut self, velocity: i32) -> Result<(), S::Error> {
        self.bus.command(self.address, Opcode::Velocity, Some(velocity))
    }

    /// Maximum speed used for positioning moves.
    pub fn speed(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetSpeed)
    }

    pub fn set_speed(&mut self, speed: i32) -> Result<(), S::Error> {
        self.bus.command(self.address, Opcode::Speed, Some(speed))
    }

    pub fn continuous_current(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetContinuousCurrent)
    }

    pub fn set_continuous_current(&mut self, current: i32) -> Result<(), S::Error> {
        self.bus
            .command(self.address, Opcode::ContinuousCurrent, Some(current))
    }

    pub fn peak_current(&mut self) -> Result<Option<i32>, S::Error> {
        self.bus.query(self.address, Opcode::GetPeakCurrent)
    }

    pub fn set_peak_current(&mut self, current: i32) -> Result<(), S::Error> {
        self.bus.command(self.address, Opcode::PeakCurrent, Some(current))
    }

    pub fn set_range_limits_enabled(&mut self, state: impl Into<State>) -> Result<(), S::Error> {
        let flag = state.into() as u8 as i32;
        self.bus
            .command(self.address, Opcode::PositionLimits, Some(flag))
    }
}
