//! Host-facing registers and the bank that maps register numbers to them.
//!
//! A [`Register`] holds a typed value and, optionally, two functions tying it to a drive:
//! `refresh` samples the drive before a read, `apply` forwards a written value to the drive.
//! Which of read and write are allowed at all is decided by its [`AccessMode`].

use log::{debug, warn};

use crate::{
    drive::{DriveAddress, FaulhaberDrive, SerialBus},
    error::{Error, Result},
    types::{MAX_PAYLOAD_BYTES, Payload, PayloadError, PayloadType, Sample},
};

/// Which host operations a register accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// Inclusive limits applied to every element of a written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl Bounds {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, element: i64) -> bool {
        self.min <= element && element <= self.max
    }
}

/// How a register talks to its drive.
pub struct Binding<S: embedded_io::Read + embedded_io::Write> {
    /// Sample the drive. `None` keeps the previous value.
    pub refresh: Option<fn(&mut FaulhaberDrive<'_, S>) -> Result<Option<Sample>, S::Error>>,
    /// Forward a freshly written value to the drive.
    pub apply: Option<fn(&mut FaulhaberDrive<'_, S>, &Payload) -> Result<(), S::Error>>,
}

impl<S: embedded_io::Read + embedded_io::Write> Binding<S> {
    /// A register with no hardware behind it.
    pub const fn none() -> Self {
        Self {
            refresh: None,
            apply: None,
        }
    }
}

impl<S: embedded_io::Read + embedded_io::Write> Clone for Binding<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: embedded_io::Read + embedded_io::Write> Copy for Binding<S> {}

/// Read element `index` of `payload` as a drive value.
pub fn drive_value(payload: &Payload, index: usize) -> core::result::Result<i32, PayloadError> {
    let element = payload.element(index).ok_or(PayloadError::ElementCount)?;
    i32::try_from(element).map_err(|_| PayloadError::OutOfRange)
}

pub struct Register<S: embedded_io::Read + embedded_io::Write> {
    number: u8,
    access: AccessMode,
    bounds: Option<Bounds>,
    /// Store any non-zero element as `1`.
    boolean: bool,
    value: Payload,
    drive: Option<DriveAddress>,
    binding: Binding<S>,
}

impl<S: embedded_io::Read + embedded_io::Write> Register<S> {
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn payload_type(&self) -> PayloadType {
        self.value.payload_type()
    }

    pub fn drive(&self) -> Option<DriveAddress> {
        self.drive
    }

    /// The last known value, without touching the drive.
    pub fn value(&self) -> &Payload {
        &self.value
    }

    /// Sample the drive if the register is backed by one, then return the value.
    ///
    /// If the drive does not answer, the previous value is returned.
    pub fn read(&mut self, bus: &mut SerialBus<S>, typ: PayloadType) -> Result<&Payload, S::Error> {
        if !self.access.is_readable() {
            return Err(Error::AccessViolation);
        }
        if typ != self.payload_type() {
            return Err(Error::TypeMismatch);
        }
        self.refresh(bus)?;
        Ok(&self.value)
    }

    /// Validate `raw` against type, element count and bounds, store it, then forward it to the
    /// drive. Nothing is stored or sent if validation fails.
    pub fn write(
        &mut self,
        bus: &mut SerialBus<S>,
        typ: PayloadType,
        raw: &[u8],
    ) -> Result<(), S::Error> {
        if !self.access.is_writable() {
            return Err(Error::AccessViolation);
        }
        if typ != self.payload_type() {
            return Err(Error::TypeMismatch);
        }
        let mut payload = Payload::decode(typ, raw)?;
        if payload.len() != self.value.len() {
            return Err(PayloadError::ElementCount.into());
        }
        self.check_bounds(&payload)?;
        if self.boolean {
            let mut flags: heapless::Vec<i64, MAX_PAYLOAD_BYTES> = heapless::Vec::new();
            for element in payload.elements() {
                let _ = flags.push((element != 0) as i64);
            }
            payload = Payload::from_elements(typ, &flags)?;
        }

        debug!("register {} <- {:?}", self.number, payload.as_bytes());
        self.value = payload;
        self.apply(bus)
    }

    fn check_bounds(&self, payload: &Payload) -> Result<(), S::Error> {
        match self.bounds {
            Some(bounds) if payload.elements().any(|element| !bounds.contains(element)) => {
                Err(Error::RangeViolation)
            }
            _ => Ok(()),
        }
    }

    fn refresh(&mut self, bus: &mut SerialBus<S>) -> Result<(), S::Error> {
        let (Some(refresh), Some(address)) = (self.binding.refresh, self.drive) else {
            return Ok(());
        };
        match refresh(&mut bus.drive(address))? {
            Some(sample) => match sample.to_payload(self.payload_type()) {
                Ok(payload) if payload.len() == self.value.len() => self.value = payload,
                _ => warn!(
                    "register {}: sample {:?} does not fit, keeping last value",
                    self.number, sample
                ),
            },
            None => debug!("register {}: no sample, keeping last value", self.number),
        }
        Ok(())
    }

    fn apply(&mut self, bus: &mut SerialBus<S>) -> Result<(), S::Error> {
        match (self.binding.apply, self.drive) {
            (Some(apply), Some(address)) => apply(&mut bus.drive(address), &self.value),
            _ => Ok(()),
        }
    }
}

/// Use this type to create a [`Register`].
pub struct RegisterBuilder<S: embedded_io::Read + embedded_io::Write> {
    number: u8,
    typ: PayloadType,
    access: AccessMode,
    bounds: Option<Bounds>,
    boolean: bool,
    initial: core::result::Result<Option<Payload>, PayloadError>,
    count: usize,
    drive: Option<DriveAddress>,
    binding: Binding<S>,
    seed: bool,
}

impl<S: embedded_io::Read + embedded_io::Write> RegisterBuilder<S> {
    /// A read-write register holding a single zero element of `typ`.
    pub fn new(number: u8, typ: PayloadType) -> Self {
        Self {
            number,
            typ,
            access: AccessMode::ReadWrite,
            bounds: None,
            boolean: false,
            initial: Ok(None),
            count: 1,
            drive: None,
            binding: Binding::none(),
            seed: false,
        }
    }

    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn with_bounds(mut self, min: i64, max: i64) -> Self {
        self.bounds = Some(Bounds::new(min, max));
        self
    }

    /// Written values are stored as `0` or `1`.
    pub fn as_boolean(mut self) -> Self {
        self.boolean = true;
        self
    }

    /// Number of elements when no initial value is given.
    pub fn with_elements(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Initial value. Also fixes the number of elements.
    pub fn with_initial(mut self, elements: &[i64]) -> Self {
        self.initial = Payload::from_elements(self.typ, elements).map(Some);
        self
    }

    /// Initial value from raw bytes, for `U8` array registers such as the device name.
    pub fn with_initial_bytes(mut self, bytes: &[u8]) -> Self {
        self.initial = Payload::decode(self.typ, bytes).map(Some);
        self
    }

    /// Back the register with the drive at `address`.
    pub fn on_drive(mut self, address: DriveAddress, binding: Binding<S>) -> Self {
        self.drive = Some(address);
        self.binding = binding;
        self
    }

    /// Command the initial value to the drive as soon as the register is built.
    pub fn seed_drive(mut self) -> Self {
        self.seed = true;
        self
    }

    /// Let's build it!
    pub fn build(self, bus: &mut SerialBus<S>) -> Result<Register<S>, S::Error> {
        let value = match self.initial? {
            Some(payload) => payload,
            None => Payload::zeroed(self.typ, self.count)?,
        };
        let mut register = Register {
            number: self.number,
            access: self.access,
            bounds: self.bounds,
            boolean: self.boolean,
            value,
            drive: self.drive,
            binding: self.binding,
        };
        register.check_bounds(&register.value)?;

        if self.seed {
            debug!(
                "register {}: seeding drive with {:?}",
                register.number,
                register.value.as_bytes()
            );
            register.apply(bus)?;
        }
        Ok(register)
    }
}

/// Register number to register lookup, as used by the host protocol engine.
pub struct RegisterBank<S: embedded_io::Read + embedded_io::Write, const N: usize = 16> {
    registers: heapless::LinearMap<u8, Register<S>, N>,
}

impl<S: embedded_io::Read + embedded_io::Write, const N: usize> Default for RegisterBank<S, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const N: usize> RegisterBank<S, N> {
    pub fn new() -> Self {
        Self {
            registers: heapless::LinearMap::new(),
        }
    }

    pub fn insert(&mut self, register: Register<S>) -> Result<(), S::Error> {
        let number = register.number;
        if self.registers.contains_key(&number) {
            return Err(Error::DuplicateRegister(number));
        }
        self.registers
            .insert(number, register)
            .map_err(|_| Error::BankFull)?;
        Ok(())
    }

    pub fn get(&self, number: u8) -> Option<&Register<S>> {
        self.registers.get(&number)
    }

    pub fn contains(&self, number: u8) -> bool {
        self.registers.contains_key(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.registers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn read(
        &mut self,
        bus: &mut SerialBus<S>,
        number: u8,
        typ: PayloadType,
    ) -> Result<&Payload, S::Error> {
        self.registers
            .get_mut(&number)
            .ok_or(Error::UnknownRegister(number))?
            .read(bus, typ)
    }

    pub fn write(
        &mut self,
        bus: &mut SerialBus<S>,
        number: u8,
        typ: PayloadType,
        raw: &[u8],
    ) -> Result<(), S::Error> {
        self.registers
            .get_mut(&number)
            .ok_or(Error::UnknownRegister(number))?
            .write(bus, typ, raw)
    }
}
