//! The register table: one descriptor per numbered register of the device,
//! with lookup by address or name and codec dispatch per entry.

use crate::values::{DecodeError, PayloadType, Value, ValueKind, ValueMismatch};

/// Access mode of a register, as a small flag set.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Mode(u8);

impl Mode {
    pub const R: Self = Self(1 << 0);
    pub const W: Self = Self(1 << 1);
    /// The device reports changes of this register as unsolicited events.
    pub const E: Self = Self(1 << 2);
    pub const RW: Self = Self(Self::R.0 | Self::W.0);
    // Aliases keeping the `for_each_register` table columns aligned.
    const R_: Self = Self::R;
    const RE: Self = Self(Self::R.0 | Self::E.0);

    pub const fn readable(self) -> bool {
        self.0 & Self::R.0 != 0
    }

    pub const fn writable(self) -> bool {
        self.0 & Self::W.0 != 0
    }

    pub const fn event(self) -> bool {
        self.0 & Self::E.0 != 0
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.readable() { "R" } else { "-" })?;
        f.write_str(if self.writable() { "W" } else { "-" })?;
        f.write_str(if self.event() { "E" } else { "-" })?;
        Ok(())
    }
}

impl serde::Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A validated position in the register table.
///
/// Constructible only through a successful lookup, so holding one proves the
/// address maps to a known public register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RegisterIndex(usize);

impl RegisterIndex {
    pub fn from_address(address: u8) -> Option<RegisterIndex> {
        let index = ADDRESSES.partition_point(|v| *v < address);
        (index < ADDRESSES.len() && ADDRESSES[index] == address).then_some(Self(index))
    }

    pub fn from_name(name: &str) -> Option<RegisterIndex> {
        let index = NAMES.iter().position(|v| *v == name);
        index.map(Self)
    }

    /// Classify an incoming address, failing for anything outside the fixed
    /// register set. The reserved address is deliberately not part of the
    /// set and fails here too.
    pub fn lookup(address: u8) -> Result<RegisterIndex, DecodeError> {
        Self::from_address(address).ok_or(DecodeError::UnknownRegister(address))
    }

    pub fn all() -> impl Iterator<Item = RegisterIndex> {
        (0..ADDRESSES.len()).map(Self)
    }

    pub fn address(&self) -> u8 {
        ADDRESSES[self.0]
    }

    pub fn name(&self) -> &'static str {
        NAMES[self.0]
    }

    pub fn mode(&self) -> Mode {
        MODES[self.0]
    }

    pub fn kind(&self) -> ValueKind {
        KINDS[self.0]
    }

    pub fn payload_type(&self) -> PayloadType {
        self.kind().payload_type()
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTIONS[self.0]
    }

    /// Decode a raw payload into this register's typed value.
    pub fn decode(&self, payload: &[u8]) -> Result<Value, DecodeError> {
        self.kind().decode(payload)
    }

    /// Same payload interpretation as [`decode`](Self::decode), with the
    /// message timestamp carried along.
    pub fn decode_timestamped(
        &self,
        payload: &[u8],
        seconds: f64,
    ) -> Result<Timestamped<Value>, DecodeError> {
        Ok(Timestamped { seconds, value: self.decode(payload)? })
    }

    /// Produce the wire payload writing `value` to this register.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, ValueMismatch> {
        if value.kind() != self.kind() {
            return Err(ValueMismatch { expected: self.kind(), found: value.kind() });
        }
        Ok(value.to_payload())
    }
}

/// A register value paired with the device timestamp of the message that
/// carried it, in seconds.
#[derive(Clone, Copy, PartialEq, Debug, serde::Serialize)]
pub struct Timestamped<T> {
    pub seconds: f64,
    pub value: T,
}

/// Addresses that must never be assigned to a register. Address 63 is held
/// back by the device firmware for internal use.
pub static RESERVED_ADDRESSES: &[u8] = &[63];

macro_rules! for_each_register {
    ($m:ident) => {
        $m! {
            32: F32, RW, "PwmChannel0Frequency";
            33: F32, RW, "PwmChannel1Frequency";
            34: F32, RW, "PwmChannel2Frequency";
            35: F32, RW, "PwmChannel3Frequency";
            36: F32, RW, "PwmChannel0DutyCycle";
            37: F32, RW, "PwmChannel1DutyCycle";
            38: F32, RW, "PwmChannel2DutyCycle";
            39: F32, RW, "PwmChannel3DutyCycle";
            40: U32, RW, "PwmChannel0NumPulses";
            41: U32, RW, "PwmChannel1NumPulses";
            42: U32, RW, "PwmChannel2NumPulses";
            43: U32, RW, "PwmChannel3NumPulses";
            44: F32, RW, "PwmChannel0RealFrequency";
            45: F32, RW, "PwmChannel1RealFrequency";
            46: F32, RW, "PwmChannel2RealFrequency";
            47: F32, RW, "PwmChannel3RealFrequency";
            48: F32, R_, "PwmChannel0RealDutyCycle";
            49: F32, R_, "PwmChannel1RealDutyCycle";
            50: F32, R_, "PwmChannel2RealDutyCycle";
            51: F32, R_, "PwmChannel3RealDutyCycle";
            52: PlaybackMode, RW, "PwmChannel0PlaybackMode";
            53: PlaybackMode, RW, "PwmChannel1PlaybackMode";
            54: PlaybackMode, RW, "PwmChannel2PlaybackMode";
            55: PlaybackMode, RW, "PwmChannel3PlaybackMode";
            56: Channels, RW, "Trigger0Targets";
            57: Channels, RW, "Trigger1Targets";
            58: Channels, RW, "Trigger2Targets";
            59: Channels, RW, "Trigger3Targets";
            60: Triggers, RW, "StartSoftwareTrigger";
            61: Triggers, RW, "StopSoftwareTrigger";
            62: Channels, RW, "ArmPwmChannels";
            64: TriggerMode, RW, "Trigger0Mode";
            65: TriggerMode, RW, "Trigger1Mode";
            66: TriggerMode, RW, "Trigger2Mode";
            67: TriggerMode, RW, "Trigger3Mode";
            68: Channels, RW, "RequestEnable";
            69: Channels, RW, "EnablePwmChannels";
            70: TriggerAllMode, RW, "TriggerAllMode";
            71: Triggers, R_, "TriggerChannelState";
            72: Channels, R_, "PwmChannelState";
            73: Channels, RE, "PwmExecutionState";
            74: Events, RW, "EnableEvents";
        }
    };
}

macro_rules! make_lists {
    ($($address: literal: $kind: ident, $mode: ident, $name: literal;)+) => {
        pub static ADDRESSES: &[u8] = &[$($address),*];
        pub static NAMES: &[&str] = &[$($name),*];
        pub static MODES: &[Mode] = &[$(Mode::$mode),*];
        pub static KINDS: &[ValueKind] = &[$(ValueKind::$kind),*];
    };
}

for_each_register!(make_lists);

pub static DESCRIPTIONS: &[&str] = &const {
    let mut result = [""; ADDRESSES.len()];
    let mut index = 0;
    let mut previous_address = 0;
    while index < result.len() {
        let address = ADDRESSES[index];
        if address <= previous_address {
            panic!("ADDRESSES is not sorted (or has duplicate values)!");
        }
        previous_address = address;
        let mut reserved = 0;
        while reserved < RESERVED_ADDRESSES.len() {
            if address == RESERVED_ADDRESSES[reserved] {
                panic!("a register claims an address reserved by the firmware!");
            }
            reserved += 1;
        }
        result[index] = match address {
            32 | 33 | 34 | 35 => "Frequency of the pulses generated on this channel, in Hz.",
            36 | 37 | 38 | 39 => "Duty cycle of the pulses generated on this channel, in percent.",
            40 | 41 | 42 | 43 => "Number of pulses to generate on this channel in Count mode.",
            44 | 45 | 46 | 47 => {
                "Real frequency the hardware is able to generate on this channel, in Hz."
            }
            48 | 49 | 50 | 51 => {
                "Read only. Real duty cycle the hardware is able to generate on this channel, in \
                 percent."
            }
            52 | 53 | 54 | 55 => {
                "Playback mode of this channel. Count plays the configured number of pulses, \
                 Infinite plays until stopped."
            }
            56 | 57 | 58 | 59 => "PWM channels started or stopped by this trigger input.",
            60 => "Emulates a rising edge on the listed trigger inputs, starting their targets.",
            61 => "Emulates a falling edge on the listed trigger inputs, stopping their targets.",
            62 => "Disables the listed channels once their current pulse train completes.",
            64 | 65 | 66 | 67 => "Mode selector and polarity of this trigger input.",
            68 => "Channels that require EnablePwmChannels before a trigger can start them.",
            69 => "Enables the listed PWM channels.",
            70 => "Mode selector and polarity of the all-channels trigger input.",
            71 => "Read only. Current digital state of the trigger inputs.",
            72 => "Read only. Current digital state of the PWM outputs.",
            73 => {
                "Read only. Execution state of each PWM channel. Reported as an event when \
                 enabled through EnableEvents."
            }
            74 => "Event reports the device is allowed to emit.",
            _ => "",
        };
        index += 1;
    }
    result
};
