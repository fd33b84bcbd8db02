//! We use this mocking module in unit tests to emulate the drive serial bus.
//!
//! [`MockSerial`] is a byte-level fake port: it records what is written and plays back canned
//! response bytes. [`SimulatedBus`] goes further and interprets the ASCII commands, keeping the
//! state of one or more drives and answering their queries.

use core::fmt::Write as _;

use strum::IntoEnumIterator;

use crate::drive::{DriveAddress, LINE_CAPACITY, Opcode};
use crate::response::parse_value;

/// Our mock type used to emulate a serial port.
#[derive(Default)]
pub struct MockSerial {
    /// Everything written to the port.
    written: heapless::Vec<u8, 256>,
    /// Canned response bytes.
    responses: heapless::Vec<u8, 256>,
    /// How far into `responses` reads have got.
    read_position: usize,
    write_error: bool,
    read_error: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    #[error("buffer overflow")]
    BufferOverflow,
    /// Line that does not decode as a drive command.
    #[error("invalid data")]
    InvalidData,
    /// Injected failure.
    #[error("simulated error")]
    SimulatedError,
    /// Nothing left to read. Reported as a timeout, like a port with a read timeout.
    #[error("would block")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::InvalidData => embedded_io::ErrorKind::InvalidData,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::TimedOut,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.write_error {
            return Err(MockSerialError::SimulatedError);
        }
        self.written
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.write_error {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.read_error {
            return Err(MockSerialError::SimulatedError);
        }
        let pending = &self.responses[self.read_position..];
        if pending.is_empty() {
            return Err(MockSerialError::WouldBlock);
        }
        let count = pending.len().min(buf.len());
        buf[..count].copy_from_slice(&pending[..count]);
        self.read_position += count;
        Ok(count)
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the response bytes and rewind.
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.responses.clear();
        self.read_position = 0;
        self.queue_read_data(data)
    }

    /// Append response bytes after anything already queued.
    pub fn queue_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.responses
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    pub fn written_data(&self) -> &[u8] {
        &self.written
    }

    pub fn set_write_error(&mut self, fail: bool) {
        self.write_error = fail;
    }

    pub fn set_read_error(&mut self, fail: bool) {
        self.read_error = fail;
    }
}

/// Attribute state of one simulated drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveState {
    pub enabled: bool,
    pub position: i32,
    pub target: i32,
    pub negative_limit: i32,
    pub positive_limit: i32,
    pub velocity: i32,
    pub speed: i32,
    pub continuous_current: i32,
    pub peak_current: i32,
    pub range_limits: bool,
}

/// One decoded command line seen by the simulated bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub address: DriveAddress,
    pub opcode: Opcode,
    pub value: Option<i32>,
}

/// How the simulated drives answer queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Answer with the value, `\r\n` terminated.
    #[default]
    Normal,
    /// Never answer, so every query times out.
    Silent,
    /// Answer with a line that carries no number.
    Garbled,
}

/// A serial bus with simulated drives attached, answering like the real controllers.
pub struct SimulatedBus {
    drives: heapless::LinearMap<DriveAddress, DriveState, 4>,
    /// Command bytes received since the last `\r`.
    incoming: heapless::Vec<u8, LINE_CAPACITY>,
    /// Response bytes not read yet.
    outgoing: heapless::Deque<u8, 256>,
    transactions: heapless::Vec<Transaction, 64>,
    response_mode: ResponseMode,
    write_error: bool,
}

impl SimulatedBus {
    /// Create a bus with a single powered-up drive at `address`.
    pub fn new(address: DriveAddress) -> Self {
        let mut bus = Self {
            drives: heapless::LinearMap::new(),
            incoming: heapless::Vec::new(),
            outgoing: heapless::Deque::new(),
            transactions: heapless::Vec::new(),
            response_mode: ResponseMode::Normal,
            write_error: false,
        };
        bus.add_drive(address);
        bus
    }

    pub fn add_drive(&mut self, address: DriveAddress) {
        let _ = self.drives.insert(address, DriveState::default());
    }

    pub fn drive_state(&self, address: DriveAddress) -> DriveState {
        self.drives.get(&address).copied().unwrap_or_default()
    }

    pub fn drive_state_mut(&mut self, address: DriveAddress) -> Option<&mut DriveState> {
        self.drives.get_mut(&address)
    }

    pub fn set_response_mode(&mut self, mode: ResponseMode) {
        self.response_mode = mode;
    }

    /// Fail every write until cleared, as a disconnected line would.
    pub fn set_write_error(&mut self, fail: bool) {
        self.write_error = fail;
    }

    /// Every command and query received, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Only the transactions that change drive state.
    pub fn commands(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| !t.opcode.is_query())
    }

    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    fn decode(line: &[u8]) -> Option<Transaction> {
        let letters_start = line.iter().position(|b| !b.is_ascii_digit())?;
        let letters_end = line[letters_start..]
            .iter()
            .position(|b| !b.is_ascii_uppercase())
            .map_or(line.len(), |i| letters_start + i);

        let address = core::str::from_utf8(&line[..letters_start]).ok()?.parse().ok()?;
        let mnemonic = core::str::from_utf8(&line[letters_start..letters_end]).ok()?;
        let opcode = Opcode::iter().find(|op| op.mnemonic() == mnemonic)?;
        let value = parse_value(&line[letters_end..]);

        Some(Transaction {
            address: DriveAddress(address),
            opcode,
            value,
        })
    }

    fn execute(&mut self, transaction: Transaction) {
        let Some(state) = self.drives.get_mut(&transaction.address) else {
            return;
        };
        let value = transaction.value.unwrap_or_default();
        let answer = match transaction.opcode {
            Opcode::Enable => {
                state.enabled = true;
                None
            }
            Opcode::Disable => {
                state.enabled = false;
                None
            }
            Opcode::Home => {
                state.position = value;
                None
            }
            Opcode::LoadAbsolute => {
                state.target = value;
                None
            }
            Opcode::Move => {
                state.position = state.target;
                None
            }
            Opcode::LoadLimit => {
                if value > 0 {
                    state.positive_limit = value;
                } else {
                    state.negative_limit = value;
                }
                None
            }
            Opcode::Velocity => {
                state.velocity = value;
                None
            }
            Opcode::Speed => {
                state.speed = value;
                None
            }
            Opcode::ContinuousCurrent => {
                state.continuous_current = value;
                None
            }
            Opcode::PeakCurrent => {
                state.peak_current = value;
                None
            }
            Opcode::PositionLimits => {
                state.range_limits = value != 0;
                None
            }
            Opcode::GetPosition => Some(state.position),
            Opcode::GetPositiveLimit => Some(state.positive_limit),
            Opcode::GetNegativeLimit => Some(state.negative_limit),
            Opcode::GetVelocity => Some(state.velocity),
            Opcode::GetSpeed => Some(state.speed),
            Opcode::GetContinuousCurrent => Some(state.continuous_current),
            Opcode::GetPeakCurrent => Some(state.peak_current),
        };

        if let Some(answer) = answer {
            let mut line: heapless::String<LINE_CAPACITY> = heapless::String::new();
            let _ = match self.response_mode {
                ResponseMode::Normal => write!(line, "{}\r\n", answer),
                ResponseMode::Garbled => write!(line, "?\r\n"),
                ResponseMode::Silent => Ok(()),
            };
            for &byte in line.as_bytes() {
                let _ = self.outgoing.push_back(byte);
            }
        }
    }
}

impl embedded_io::ErrorType for SimulatedBus {
    type Error = MockSerialError;
}

impl embedded_io::Write for SimulatedBus {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.write_error {
            return Err(MockSerialError::SimulatedError);
        }
        for &byte in buf {
            if byte != b'\r' {
                self.incoming
                    .push(byte)
                    .map_err(|_| MockSerialError::BufferOverflow)?;
                continue;
            }
            let line = core::mem::take(&mut self.incoming);
            let transaction = Self::decode(&line).ok_or(MockSerialError::InvalidData)?;
            self.transactions
                .push(transaction)
                .map_err(|_| MockSerialError::BufferOverflow)?;
            self.execute(transaction);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Read for SimulatedBus {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.outgoing.is_empty() {
            return Err(MockSerialError::WouldBlock);
        }
        let mut count = 0;
        while count < buf.len() {
            match self.outgoing.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    const ADDRESS: DriveAddress = DriveAddress(2);

    fn send(bus: &mut SimulatedBus, line: &[u8]) -> heapless::Vec<u8, LINE_CAPACITY> {
        bus.write_all(line).unwrap();
        let mut answer = heapless::Vec::new();
        let mut byte = [0u8; 1];
        while let Ok(1) = bus.read(&mut byte) {
            let _ = answer.push(byte[0]);
        }
        answer
    }

    #[test]
    fn mock_plays_back_queued_bytes() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"12\r\n").unwrap();
        mock.queue_read_data(b"34\r\n").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"12\r\n3");
        assert_eq!(mock.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"4\r\n");
    }

    #[test]
    fn mock_runs_dry_as_timeout() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 4];
        let error = mock.read(&mut buffer).unwrap_err();
        assert_eq!(error.kind(), embedded_io::ErrorKind::TimedOut);
    }

    #[test]
    fn mock_error_injection() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(
            mock.write(b"2EN\r"),
            Err(MockSerialError::SimulatedError)
        ));
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        mock.write_all(b"2EN\r").unwrap();
        assert_eq!(mock.written_data(), b"2EN\r");

        mock.set_read_data(b"1\r\n").unwrap();
        mock.set_read_error(true);
        let error = mock.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(error.kind(), embedded_io::ErrorKind::Other);
    }

    #[test]
    fn mock_write_overflow() {
        let mut mock = MockSerial::new();
        assert!(matches!(
            mock.write(&[0u8; 300]),
            Err(MockSerialError::BufferOverflow)
        ));
    }

    #[test]
    fn simulated_commands_change_state() {
        let mut bus = SimulatedBus::new(ADDRESS);
        for line in [
            &b"2EN\r"[..],
            b"2LL-1000\r",
            b"2LL160000\r",
            b"2SP7583\r",
            b"2LA500\r",
        ] {
            assert!(send(&mut bus, line).is_empty());
        }
        let state = bus.drive_state(ADDRESS);
        assert!(state.enabled);
        assert_eq!((state.negative_limit, state.positive_limit), (-1000, 160000));
        assert_eq!(state.speed, 7583);
        assert_eq!(state.position, 0);

        send(&mut bus, b"2M\r");
        assert_eq!(bus.drive_state(ADDRESS).position, 500);
        assert_eq!(bus.transactions().len(), 6);
    }

    #[test]
    fn simulated_queries_answer_lines() {
        let mut bus = SimulatedBus::new(ADDRESS);
        send(&mut bus, b"2V-300\r");
        assert_eq!(send(&mut bus, b"2GN\r"), b"-300\r\n");
        assert_eq!(bus.commands().count(), 1);

        bus.set_response_mode(ResponseMode::Garbled);
        assert_eq!(send(&mut bus, b"2GN\r"), b"?\r\n");

        bus.set_response_mode(ResponseMode::Silent);
        assert!(send(&mut bus, b"2GN\r").is_empty());
    }

    #[test]
    fn simulated_drives_are_addressed() {
        let mut bus = SimulatedBus::new(ADDRESS);
        bus.add_drive(DriveAddress(3));
        send(&mut bus, b"3HO42\r");
        assert_eq!(bus.drive_state(DriveAddress(3)).position, 42);
        assert_eq!(bus.drive_state(ADDRESS).position, 0);

        // Nobody at address 9 answers.
        assert!(send(&mut bus, b"9POS\r").is_empty());
    }

    #[test]
    fn simulated_write_failure() {
        let mut bus = SimulatedBus::new(ADDRESS);
        bus.set_write_error(true);
        assert!(matches!(
            bus.write(b"2EN\r"),
            Err(MockSerialError::SimulatedError)
        ));
        assert!(!bus.drive_state(ADDRESS).enabled);

        bus.set_write_error(false);
        send(&mut bus, b"2EN\r");
        assert!(bus.drive_state(ADDRESS).enabled);
    }

    #[test]
    fn simulated_rejects_garbage() {
        let mut bus = SimulatedBus::new(ADDRESS);
        assert!(matches!(
            bus.write(b"2XYZ\r"),
            Err(MockSerialError::InvalidData)
        ));
        assert!(bus.transactions().is_empty());
    }
}
