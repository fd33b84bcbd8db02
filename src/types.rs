//! Register payload types and their little-endian wire encoding, plus the sample and state types
//! passed between the bus and the registers.

use strum_macros::EnumIter;
use thiserror::Error;

/// Largest payload a single register can hold, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 32;

/// Wire type of a register's elements.
///
/// The discriminant is the type code used by the host protocol: bit 7 marks a signed type and the
/// low nibble is the element size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum PayloadType {
    U8 = 0x01,
    S8 = 0x81,
    U16 = 0x02,
    S16 = 0x82,
    U32 = 0x04,
    S32 = 0x84,
    U64 = 0x08,
    S64 = 0x88,
}

impl PayloadType {
    const SIGNED_FLAG: u8 = 0x80;

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        (self as u8 & 0x0F) as usize
    }

    pub const fn is_signed(self) -> bool {
        self as u8 & Self::SIGNED_FLAG != 0
    }

    /// Smallest and largest element value representable by this type.
    ///
    /// `U64` is capped at `i64::MAX` since elements are handled as `i64`.
    pub const fn range(self) -> (i64, i64) {
        match self {
            PayloadType::U8 => (0, u8::MAX as i64),
            PayloadType::S8 => (i8::MIN as i64, i8::MAX as i64),
            PayloadType::U16 => (0, u16::MAX as i64),
            PayloadType::S16 => (i16::MIN as i64, i16::MAX as i64),
            PayloadType::U32 => (0, u32::MAX as i64),
            PayloadType::S32 => (i32::MIN as i64, i32::MAX as i64),
            PayloadType::U64 => (0, i64::MAX),
            PayloadType::S64 => (i64::MIN, i64::MAX),
        }
    }
}

impl From<PayloadType> for u8 {
    fn from(value: PayloadType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for PayloadType {
    type Error = PayloadError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use strum::IntoEnumIterator;
        PayloadType::iter()
            .find(|typ| *typ as u8 == value)
            .ok_or(PayloadError::UnknownType(value))
    }
}

/// Errors raised while encoding or decoding a payload.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unknown payload type 0x{0:02X}")]
    UnknownType(u8),
    #[error("payload length is not a whole number of elements")]
    Length,
    #[error("element count does not match the register")]
    ElementCount,
    #[error("payload exceeds the register capacity")]
    Capacity,
    #[error("element does not fit the payload type")]
    OutOfRange,
}

/// A typed register value: one or more little-endian elements of a single [`PayloadType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    typ: PayloadType,
    bytes: heapless::Vec<u8, MAX_PAYLOAD_BYTES>,
}

impl Payload {
    /// Build a payload from element values, checking each fits the type.
    pub fn from_elements(typ: PayloadType, elements: &[i64]) -> Result<Self, PayloadError> {
        let (min, max) = typ.range();
        let mut bytes = heapless::Vec::new();
        for &element in elements {
            if element < min || element > max {
                return Err(PayloadError::OutOfRange);
            }
            let le = element.to_le_bytes();
            bytes
                .extend_from_slice(&le[..typ.size()])
                .map_err(|_| PayloadError::Capacity)?;
        }
        Ok(Self { typ, bytes })
    }

    /// Build a payload of `count` zeroed elements.
    pub fn zeroed(typ: PayloadType, count: usize) -> Result<Self, PayloadError> {
        let mut bytes = heapless::Vec::new();
        bytes
            .resize(count * typ.size(), 0)
            .map_err(|_| PayloadError::Capacity)?;
        Ok(Self { typ, bytes })
    }

    /// Interpret raw wire bytes as a payload of the given type.
    pub fn decode(typ: PayloadType, raw: &[u8]) -> Result<Self, PayloadError> {
        if raw.is_empty() || raw.len() % typ.size() != 0 {
            return Err(PayloadError::Length);
        }
        let bytes = heapless::Vec::from_slice(raw).map_err(|_| PayloadError::Capacity)?;
        let payload = Self { typ, bytes };
        // An unsigned 64-bit element above i64::MAX cannot be represented.
        if payload.elements().any(|element| element < typ.range().0) {
            return Err(PayloadError::OutOfRange);
        }
        Ok(payload)
    }

    pub fn payload_type(&self) -> PayloadType {
        self.typ
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.typ.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encoded little-endian bytes, as sent to the host.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn element(&self, index: usize) -> Option<i64> {
        let size = self.typ.size();
        let chunk = self.bytes.get(index * size..(index + 1) * size)?;
        let fill = if self.typ.is_signed() && chunk[size - 1] & 0x80 != 0 {
            0xFF
        } else {
            0x00
        };
        let mut le = [fill; 8];
        le[..size].copy_from_slice(chunk);
        Some(i64::from_le_bytes(le))
    }

    pub fn elements(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.len()).filter_map(move |index| self.element(index))
    }
}

/// A value sampled from a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    One(i32),
    Pair(i32, i32),
}

impl Sample {
    /// Encode this sample as a payload of the given type.
    pub fn to_payload(self, typ: PayloadType) -> Result<Payload, PayloadError> {
        match self {
            Sample::One(a) => Payload::from_elements(typ, &[a as i64]),
            Sample::Pair(a, b) => Payload::from_elements(typ, &[a as i64, b as i64]),
        }
    }
}

/// Used to be less ambiguous about whether something is on or off.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Disabled.
    #[default]
    Off = 0x00,
    /// Enabled.
    On = 0x01,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Any non-zero element value counts as on.
impl From<i64> for State {
    fn from(value: i64) -> Self {
        State::from(value != 0)
    }
}
