//! The Harp message layer, as far as this crate is concerned with it.
//!
//! Transport framing (start bytes, length, checksum) lives outside this
//! crate; what arrives here is one complete, already-deframed message at a
//! time. This module binds such messages to the register table and codec.

use tracing::trace;

use crate::registers::RegisterIndex;
use crate::values::{DecodeError, PayloadType, Value, ValueMismatch};

/// Identity code a MultiPwm reports in its WhoAmI register.
pub const WHO_AM_I: u16 = 1040;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("the connected device identifies as {0}, not as a MultiPwm ({WHO_AM_I})")]
pub struct UnexpectedDevice(pub u16);

/// One-time identity check at connection establishment.
pub fn check_who_am_i(reported: u16) -> Result<(), UnexpectedDevice> {
    if reported == WHO_AM_I { Ok(()) } else { Err(UnexpectedDevice(reported)) }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, strum::Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    /// Host asks for the register contents. Requests carry no payload.
    Read,
    /// Host stores a value into the register.
    Write,
    /// Device reports a register on its own initiative.
    Event,
}

/// One deframed protocol message: an address, a typed payload and an
/// optional timestamp. The `kind` only selects between the encode and the
/// decode direction; nothing here acts on it otherwise.
#[derive(Clone, PartialEq, Debug)]
pub struct RawMessage {
    pub address: u8,
    pub kind: MessageKind,
    pub payload_type: PayloadType,
    pub payload: Vec<u8>,
    pub timestamp: Option<f64>,
}

/// A message resolved against the register table.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Decoded {
    pub register: RegisterIndex,
    pub value: Value,
    pub timestamp: Option<f64>,
}

impl RawMessage {
    /// A read request for `register`. Built from the table alone, with no
    /// codec involvement.
    pub fn read(register: RegisterIndex) -> Self {
        Self {
            address: register.address(),
            kind: MessageKind::Read,
            payload_type: register.payload_type(),
            payload: Vec::new(),
            timestamp: None,
        }
    }

    /// A write command storing `value` into `register`.
    pub fn write(register: RegisterIndex, value: &Value) -> Result<Self, ValueMismatch> {
        Ok(Self {
            address: register.address(),
            kind: MessageKind::Write,
            payload_type: register.payload_type(),
            payload: register.encode(value)?,
            timestamp: None,
        })
    }

    /// Resolve the register this message addresses and decode its payload.
    ///
    /// Fails without guessing: an address outside the table, a payload of
    /// the wrong length and a byte outside a non-flags enumeration domain
    /// each produce their own [`DecodeError`].
    pub fn decode(&self) -> Result<Decoded, DecodeError> {
        trace!(message = "decoding", address = self.address, payload = ?self.payload);
        let register = RegisterIndex::lookup(self.address)?;
        let value = register.decode(&self.payload)?;
        Ok(Decoded { register, value, timestamp: self.timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{Polarity, PwmChannels, TriggerConfig, TriggerMode};

    #[test]
    fn read_requests_carry_no_payload() {
        let register = RegisterIndex::lookup(40).unwrap();
        let message = RawMessage::read(register);
        assert_eq!(message.kind, MessageKind::Read);
        assert_eq!(message.address, 40);
        assert_eq!(message.payload_type, PayloadType::U32);
        assert!(message.payload.is_empty());
    }

    #[test]
    fn write_messages_encode_the_value() {
        let register = RegisterIndex::from_name("Trigger1Mode").unwrap();
        let value = Value::TriggerMode(TriggerConfig {
            mode: TriggerMode::StartAndStop,
            polarity: Polarity::Inverted,
        });
        let message = RawMessage::write(register, &value).unwrap();
        assert_eq!(message.payload, vec![0x11]);
        assert_eq!(message.kind, MessageKind::Write);
    }

    #[test]
    fn write_refuses_a_value_for_a_different_register() {
        let register = RegisterIndex::from_name("PwmChannel2NumPulses").unwrap();
        let result = RawMessage::write(register, &Value::F32(1.0));
        assert!(result.is_err());
    }

    #[test]
    fn event_messages_decode_with_their_timestamp() {
        let message = RawMessage {
            address: 73,
            kind: MessageKind::Event,
            payload_type: PayloadType::U8,
            payload: vec![0x5],
            timestamp: Some(42.125),
        };
        let decoded = message.decode().unwrap();
        assert_eq!(decoded.register.name(), "PwmExecutionState");
        assert_eq!(
            decoded.value,
            Value::Channels(PwmChannels::CHANNEL0 | PwmChannels::CHANNEL2)
        );
        assert_eq!(decoded.timestamp, Some(42.125));
    }

    #[test]
    fn unknown_addresses_are_never_guessed() {
        let message = RawMessage {
            address: 63,
            kind: MessageKind::Read,
            payload_type: PayloadType::U8,
            payload: vec![0],
            timestamp: None,
        };
        assert_eq!(message.decode(), Err(DecodeError::UnknownRegister(63)));
    }

    #[test]
    fn malformed_payload_surfaces_from_message_decode() {
        let message = RawMessage {
            address: 32,
            kind: MessageKind::Read,
            payload_type: PayloadType::Float,
            payload: vec![0x00, 0x3f],
            timestamp: None,
        };
        assert_eq!(
            message.decode(),
            Err(DecodeError::MalformedPayload { expected: 4, found: 2 })
        );
    }

    #[test]
    fn who_am_i_check() {
        assert_eq!(check_who_am_i(1040), Ok(()));
        assert_eq!(check_who_am_i(1140), Err(UnexpectedDevice(1140)));
    }
}
