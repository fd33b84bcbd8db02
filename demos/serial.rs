use std::{env, time::Duration};

use inquire::{Select, Text};
use linear_drive::{
    Device,
    config::{DeviceVariant, SERIAL_BAUD_RATE, SERIAL_TIMEOUT_MS},
    event::EventTrigger,
    registers::DriveRegister,
    types::Payload,
};
use serialport::SerialPort;
use strum::IntoEnumIterator;

// How long to stream position telemetry for.
const STREAM_SAMPLES: u32 = 50;

static POSITION_TRIGGER: EventTrigger = EventTrigger::new();

pub struct PortWrapper(Box<dyn SerialPort>);

/// Port error, carried through to the drive bus error.
#[derive(thiserror::Error, Debug)]
#[error("serial port: {0}")]
pub struct IoError(#[from] std::io::Error);

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        // The drive bus only tells an expired read timeout apart from a broken port.
        match self.0.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                embedded_io::ErrorKind::TimedOut
            }
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(std::io::Read::read(&mut self.0, buf)?)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(std::io::Write::write(&mut self.0, buf)?)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(std::io::Write::flush(&mut self.0)?)
    }
}

const ACTIONS: [&str; 6] = [
    "Read register",
    "Write register",
    "Enable drive",
    "Disable drive",
    "Stream position",
    "Quit",
];

fn select_register() -> DriveRegister {
    let names: Vec<String> = DriveRegister::iter()
        .map(|register| format!("{:>2} {:?}", u8::from(register), register))
        .collect();
    let choice = Select::new("Register:", names.clone())
        .prompt()
        .expect("Failed to select register");
    let index = names.iter().position(|name| *name == choice).unwrap_or(0);
    DriveRegister::iter().nth(index).unwrap_or(DriveRegister::PositionActual)
}

fn main() {
    pretty_env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, SERIAL_BAUD_RATE)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let variants: Vec<String> = DeviceVariant::iter().map(|v| format!("{:?}", v)).collect();
    let variant = Select::new("Device:", variants.clone())
        .prompt()
        .expect("Failed to select device");
    let variant = DeviceVariant::iter()
        .nth(variants.iter().position(|v| *v == variant).unwrap_or(0))
        .unwrap_or(DeviceVariant::LinearDrive);

    // Boot defaults are commanded to the drive here.
    let mut device: Device<PortWrapper> =
        Device::new(PortWrapper(port), variant).expect("Failed to configure drive");
    device
        .add_position_event(&POSITION_TRIGGER)
        .expect("Failed to add position event");
    println!("Configured {}", device.name());

    loop {
        let action = Select::new("Action:", ACTIONS.to_vec())
            .prompt()
            .expect("Failed to select action");

        match action {
            "Read register" => {
                let register = select_register();
                match device.read_register(register.into(), register.payload_type()) {
                    Ok(payload) if register == DriveRegister::DeviceName => {
                        println!("{}", String::from_utf8_lossy(payload.as_bytes()))
                    }
                    Ok(payload) => println!("{:?}", payload.elements().collect::<Vec<_>>()),
                    Err(e) => println!("Read failed: {}", e),
                }
            }
            "Write register" => {
                let register = select_register();
                let input = Text::new("Values, comma separated:")
                    .prompt()
                    .expect("Failed to read values");
                let values: Result<Vec<i64>, _> =
                    input.split(',').map(|v| v.trim().parse::<i64>()).collect();
                let Ok(values) = values else {
                    println!("Not a list of integers");
                    continue;
                };
                let result = Payload::from_elements(register.payload_type(), &values)
                    .map_err(Into::into)
                    .and_then(|payload| {
                        device.write_register(
                            register.into(),
                            register.payload_type(),
                            payload.as_bytes(),
                        )
                    });
                match result {
                    Ok(()) => println!("Written"),
                    Err(e) => println!("Write failed: {}", e),
                }
            }
            "Enable drive" | "Disable drive" => {
                let flag = (action == "Enable drive") as u8;
                if let Err(e) = device.write_register(
                    DriveRegister::Enable.into(),
                    DriveRegister::Enable.payload_type(),
                    &[flag],
                ) {
                    println!("Failed to set enable: {}", e);
                }
            }
            "Stream position" => {
                let period = device.config().sampling_period;
                // Operation mode active
                device.on_operation_control(1);
                for _ in 0..STREAM_SAMPLES {
                    // Stands in for the timer interrupt.
                    POSITION_TRIGGER.fire();
                    device
                        .service(&mut |register: u8, payload: &Payload| {
                            println!("register {}: {:?}", register, payload.element(0))
                        })
                        .expect("Failed to sample position");
                    std::thread::sleep(Duration::from_millis(period.to_millis() as u64));
                }
                device.on_operation_control(0);
                println!("Overruns: {}", POSITION_TRIGGER.overruns());
            }
            _ => break,
        }
    }
}
