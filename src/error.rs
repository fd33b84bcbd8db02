//! Our error types for the drive bridge.

use thiserror::Error;

use crate::types::PayloadError;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Error type for register access and drive communications.
///
/// A drive that does not answer a query is not an error: queries return `None` and
/// readable registers fall back to their last known value.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Command does not fit the line buffer")]
    BufferError,
    #[error("Register {0} is not mapped")]
    UnknownRegister(u8),
    #[error("Register {0} is already mapped")]
    DuplicateRegister(u8),
    #[error("Register bank is full")]
    BankFull,
    #[error("No room for another event")]
    TooManyEvents,
    #[error("Value out of range")]
    RangeViolation,
    #[error("Access mode does not allow this operation")]
    AccessViolation,
    #[error("Payload type does not match the register type")]
    TypeMismatch,
    #[error("Invalid payload: {0}")]
    InvalidPayload(PayloadError),
    #[error("Emergency stop is asserted")]
    EmergencyStop,
}

impl<I: embedded_io::Error> Error<I> {
    /// Errors the host engine should answer with a protocol error reply.
    ///
    /// Everything else is either a failed write or a device fault.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownRegister(_)
                | Error::AccessViolation
                | Error::TypeMismatch
                | Error::InvalidPayload(_)
        )
    }
}

impl<I: embedded_io::Error> From<PayloadError> for Error<I> {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::OutOfRange => Error::RangeViolation,
            other => Error::InvalidPayload(other),
        }
    }
}
