use log::{info, warn};

use crate::{
    config::DeviceConfig,
    drive::SerialBus,
    error::{Error, Result},
    estop::EmergencyStop,
    event::{Event, EventTrigger, TelemetrySink},
    mode::{ModeGate, OperationControl, OperationMode},
    register::RegisterBank,
    registers::{DriveRegister, build_bank},
    types::{Payload, PayloadType},
};

/// Most events a device can stream.
pub const MAX_EVENTS: usize = 4;

/// A drive bridge as the host protocol engine sees it.
///
/// You can create a Device using any interface which implements [embedded_io::Read] &
/// [embedded_io::Write], connected to the drive's serial line.
///
/// The host engine calls [Self::read_register] and [Self::write_register] for register requests,
/// [Self::on_operation_control] after the operation-control register changed, and [Self::service]
/// from its main loop.
pub struct Device<'t, S: embedded_io::Read + embedded_io::Write, const N: usize = 16> {
    config: DeviceConfig,
    bus: SerialBus<S>,
    registers: RegisterBank<S, N>,
    events: heapless::Vec<Event<'t>, MAX_EVENTS>,
    gate: ModeGate,
    estop: Option<&'t EmergencyStop>,
}

impl<'t, S: embedded_io::Read + embedded_io::Write, const N: usize> Device<'t, S, N> {
    /// Build the register bank for `config`. Boot defaults are commanded to the drive on the way.
    pub fn new(interface: S, config: impl Into<DeviceConfig>) -> Result<Self, S::Error> {
        let config = config.into();
        let mut bus = SerialBus::new(interface);
        let registers = build_bank(&mut bus, &config)?;
        info!(
            "{}: {} registers, drive at address {}",
            config.name,
            registers.len(),
            config.drive
        );
        Ok(Self {
            config,
            bus,
            registers,
            events: heapless::Vec::new(),
            gate: ModeGate::new(),
            estop: None,
        })
    }

    /// Disable the drive whenever `estop` trips, and refuse to enable it while asserted.
    pub fn with_estop(mut self, estop: &'t EmergencyStop) -> Self {
        self.estop = Some(estop);
        self
    }

    /// Stream `register` to the host every time `trigger` fires.
    ///
    /// The event starts armed or disarmed according to the current operation mode.
    pub fn add_event(&mut self, register: u8, trigger: &'t EventTrigger) -> Result<(), S::Error> {
        let target = self
            .registers
            .get(register)
            .ok_or(Error::UnknownRegister(register))?;
        if !target.access().is_readable() {
            return Err(Error::AccessViolation);
        }
        let event = Event::new(
            register,
            target.payload_type(),
            self.config.sampling_period,
            trigger,
        );
        event.arm(self.gate.mode().streams_telemetry());
        self.events
            .push(event)
            .map_err(|_| Error::TooManyEvents)
    }

    /// Stream the measured position, the telemetry every device has.
    pub fn add_position_event(&mut self, trigger: &'t EventTrigger) -> Result<(), S::Error> {
        self.add_event(DriveRegister::PositionActual.into(), trigger)
    }

    pub fn read_register(&mut self, number: u8, typ: PayloadType) -> Result<Payload, S::Error> {
        self.registers.read(&mut self.bus, number, typ).cloned()
    }

    pub fn write_register(&mut self, number: u8, typ: PayloadType, raw: &[u8]) -> Result<(), S::Error> {
        // Malformed writes fall through to the register and fail validation there.
        if number == u8::from(DriveRegister::Enable)
            && typ == PayloadType::U8
            && matches!(raw, [flag] if *flag != 0)
            && self.estop.is_some_and(EmergencyStop::is_asserted)
        {
            warn!("{}: enable refused, emergency stop asserted", self.config.name);
            return Err(Error::EmergencyStop);
        }
        self.registers.write(&mut self.bus, number, typ, raw)
    }

    /// Post-write hook for the host engine's operation-control register.
    pub fn on_operation_control(&mut self, raw: u8) {
        self.gate
            .on_operation_control(OperationControl::from(raw), &self.events);
    }

    /// One pass of the cooperative loop.
    ///
    /// Handles a tripped emergency stop first, then samples every event whose trigger fired and
    /// hands the values to `sink`. Returns how many values were emitted.
    pub fn service(&mut self, sink: &mut impl TelemetrySink) -> Result<usize, S::Error> {
        if let Some(estop) = self.estop.filter(|estop| estop.take_tripped()) {
            warn!("{}: emergency stop, disabling drive", self.config.name);
            let disabled = self.registers.write(
                &mut self.bus,
                DriveRegister::Enable.into(),
                PayloadType::U8,
                &[0],
            );
            if disabled.is_err() {
                // Retry on the next pass.
                estop.restore_tripped();
            }
            disabled?;
        }

        let mut emitted = 0;
        for event in &self.events {
            if !event.take_pending() {
                continue;
            }
            let payload = self
                .registers
                .read(&mut self.bus, event.register(), event.payload_type())?;
            sink.emit(event.register(), payload);
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Identity string, as held by the device name register.
    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn mode(&self) -> OperationMode {
        self.gate.mode()
    }

    pub fn events(&self) -> &[Event<'t>] {
        &self.events
    }

    pub fn registers(&self) -> &RegisterBank<S, N> {
        &self.registers
    }

    pub fn bus(&self) -> &SerialBus<S> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SerialBus<S> {
        &mut self.bus
    }

    pub fn into_inner(self) -> S {
        self.bus.into_inner()
    }
}
