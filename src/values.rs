//! Typed representations of register payloads and the conversions between
//! them and the wire bytes.

/// Failure to interpret a register payload.
///
/// These are per-message failures. The caller owns any retry policy; nothing
/// in here attempts recovery or substitutes defaults.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("address {0} does not map to any known register")]
    UnknownRegister(u8),
    #[error("payload is {found} bytes but the register wire type takes {expected}")]
    MalformedPayload { expected: usize, found: usize },
    #[error("byte {value:#04x} is outside the domain of {domain}")]
    InvalidEnumValue { domain: &'static str, value: u8 },
}

/// Attempt to write a value of one kind to a register declared with another.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a {found} value cannot be written to a register holding {expected}")]
pub struct ValueMismatch {
    pub expected: ValueKind,
    pub found: ValueKind,
}

/// Raw binary representation of a register payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, strum::Display)]
pub enum PayloadType {
    U8,
    U32,
    Float,
}

impl PayloadType {
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U32 => 4,
            Self::Float => 4,
        }
    }
}

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($flag:ident = $bit:literal, $label:literal;)* }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        #[repr(transparent)]
        $vis struct $name(u8);

        impl $name {
            pub const NONE: Self = Self(0);
            $(pub const $flag: Self = Self($bit);)*

            /// Every defined flag combined.
            pub const ALL: Self = Self($($bit)|*);

            pub const fn from_bits(bits: u8) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u8 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.0 == 0 {
                    return f.write_str("none");
                }
                let mut first = true;
                $(
                    if self.0 & $bit != 0 {
                        if !first {
                            f.write_str("|")?;
                        }
                        first = false;
                        f.write_str($label)?;
                    }
                )*
                let undefined = self.0 & !Self::ALL.0;
                if undefined != 0 {
                    if !first {
                        f.write_str("|")?;
                    }
                    f.write_fmt(format_args!("{:#04x}", undefined))?;
                }
                Ok(())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseValueError;
            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let input = input.trim();
                if input.eq_ignore_ascii_case("none") {
                    return Ok(Self::NONE);
                }
                if let Some(hex) = input.strip_prefix("0x") {
                    let bits = u8::from_str_radix(hex, 16)
                        .map_err(|_| ParseValueError::Flag(stringify!($name), input.into()))?;
                    return Ok(Self(bits));
                }
                let mut result = Self::NONE;
                for part in input.split('|') {
                    result = result | match part.trim() {
                        $($label => Self::$flag,)*
                        other => {
                            return Err(ParseValueError::Flag(stringify!($name), other.into()));
                        }
                    };
                }
                Ok(result)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }
    };
}

flag_set! {
    /// Bitmask selecting PWM output channels. Any combination of the defined
    /// bits is meaningful, including the empty and the full set.
    pub struct PwmChannels {
        CHANNEL0 = 0x1, "channel0";
        CHANNEL1 = 0x2, "channel1";
        CHANNEL2 = 0x4, "channel2";
        CHANNEL3 = 0x8, "channel3";
    }
}

flag_set! {
    /// Bitmask selecting trigger input lines, including the dedicated
    /// all-channels line.
    pub struct TriggerInput {
        TRIGGER0 = 0x1, "trigger0";
        TRIGGER1 = 0x2, "trigger1";
        TRIGGER2 = 0x4, "trigger2";
        TRIGGER3 = 0x8, "trigger3";
        TRIGGER_ALL = 0x10, "trigger-all";
    }
}

flag_set! {
    /// Bitmask of the event reports the device can emit.
    pub struct PwmGenEvents {
        EXECUTION_STATE = 0x1, "execution-state";
    }
}

/// How a channel plays its pulse train.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Debug,
    serde::Serialize,
    strum::FromRepr,
    strum::EnumString,
    strum::IntoStaticStr,
    num_derive::ToPrimitive,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum PwmPlaybackMode {
    /// Produce the configured number of pulses and stop.
    Count = 0,
    /// Produce pulses until explicitly stopped.
    Infinite = 1,
}

/// Active edge of a trigger input.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Debug,
    serde::Serialize,
    strum::FromRepr,
    strum::EnumString,
    strum::IntoStaticStr,
    num_derive::ToPrimitive,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Polarity {
    Normal = 0,
    Inverted = 1,
}

/// Behavior of a per-channel trigger input.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Debug,
    serde::Serialize,
    strum::FromRepr,
    strum::EnumString,
    strum::IntoStaticStr,
    num_derive::ToPrimitive,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TriggerMode {
    Start = 0,
    StartAndStop = 1,
}

/// Behavior of the all-channels trigger input. Unlike the per-channel
/// inputs this one can also drive the channel enables.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Debug,
    serde::Serialize,
    strum::FromRepr,
    strum::EnumString,
    strum::IntoStaticStr,
    num_derive::ToPrimitive,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TriggerAllMode {
    Start = 0,
    StartAndStop = 1,
    Enable = 2,
    EnableAndStop = 3,
}

/// Ordinal of a payload enumeration. All of them are `repr(u8)`, so the
/// conversion is total.
fn ordinal(value: impl num_traits::ToPrimitive) -> u8 {
    value.to_u8().unwrap_or(0)
}

/// A mode enumeration that occupies the low bits of a trigger mode
/// register. The mask must cover the enumeration domain exactly so that
/// `from_bits` is total over masked input.
pub trait ModeField: Copy + num_traits::ToPrimitive {
    const MASK: u8;
    fn from_bits(bits: u8) -> Self;
    fn bits(self) -> u8 {
        ordinal(self)
    }
}

impl ModeField for TriggerMode {
    const MASK: u8 = 0x01;
    fn from_bits(bits: u8) -> Self {
        match bits & Self::MASK {
            0 => Self::Start,
            _ => Self::StartAndStop,
        }
    }
}

impl ModeField for TriggerAllMode {
    const MASK: u8 = 0x03;
    fn from_bits(bits: u8) -> Self {
        match bits & Self::MASK {
            0 => Self::Start,
            1 => Self::StartAndStop,
            2 => Self::Enable,
            _ => Self::EnableAndStop,
        }
    }
}

const POLARITY_MASK: u8 = 0x10;
const POLARITY_SHIFT: u32 = 4;

/// Composite single-byte payload of the trigger mode registers: a mode
/// selector in the low bits and the polarity in bit 4. The remaining bits
/// are reserved. They are never set when packing and ignored when
/// unpacking.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub struct TriggerConfig<M> {
    pub mode: M,
    pub polarity: Polarity,
}

pub type TriggerModeConfig = TriggerConfig<TriggerMode>;
pub type TriggerAllModeConfig = TriggerConfig<TriggerAllMode>;

impl<M: ModeField> TriggerConfig<M> {
    pub fn unpack(byte: u8) -> Self {
        let polarity = match (byte & POLARITY_MASK) >> POLARITY_SHIFT {
            0 => Polarity::Normal,
            _ => Polarity::Inverted,
        };
        Self { mode: M::from_bits(byte & M::MASK), polarity }
    }

    pub fn pack(self) -> u8 {
        (self.mode.bits() & M::MASK) | ((ordinal(self.polarity) << POLARITY_SHIFT) & POLARITY_MASK)
    }
}

impl<M> std::fmt::Display for TriggerConfig<M>
where
    M: Copy + Into<&'static str>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode: &'static str = self.mode.into();
        let polarity: &'static str = self.polarity.into();
        f.write_fmt(format_args!("{mode},{polarity}"))
    }
}

/// Dispatch tag telling which [`Value`] variant a register carries. The
/// register table stores one of these per address.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, strum::Display)]
pub enum ValueKind {
    F32,
    U32,
    PlaybackMode,
    Channels,
    Triggers,
    Events,
    TriggerMode,
    TriggerAllMode,
}

impl ValueKind {
    pub const fn payload_type(self) -> PayloadType {
        match self {
            Self::F32 => PayloadType::Float,
            Self::U32 => PayloadType::U32,
            Self::PlaybackMode
            | Self::Channels
            | Self::Triggers
            | Self::Events
            | Self::TriggerMode
            | Self::TriggerAllMode => PayloadType::U8,
        }
    }

    pub const fn bytes(self) -> usize {
        self.payload_type().bytes()
    }

    /// Interpret a raw payload as a value of this kind.
    ///
    /// The payload must be exactly as long as the wire type; anything else
    /// is malformed and is never zero-extended or truncated.
    pub fn decode(self, payload: &[u8]) -> Result<Value, DecodeError> {
        if payload.len() != self.bytes() {
            return Err(DecodeError::MalformedPayload {
                expected: self.bytes(),
                found: payload.len(),
            });
        }
        Ok(match self {
            Self::F32 => {
                let mut bytes = [0; 4];
                bytes.copy_from_slice(payload);
                Value::F32(f32::from_le_bytes(bytes))
            }
            Self::U32 => {
                let mut bytes = [0; 4];
                bytes.copy_from_slice(payload);
                Value::U32(u32::from_le_bytes(bytes))
            }
            Self::PlaybackMode => {
                let mode = PwmPlaybackMode::from_repr(payload[0]).ok_or({
                    DecodeError::InvalidEnumValue { domain: "PwmPlaybackMode", value: payload[0] }
                })?;
                Value::PlaybackMode(mode)
            }
            Self::Channels => Value::Channels(PwmChannels::from_bits(payload[0])),
            Self::Triggers => Value::Triggers(TriggerInput::from_bits(payload[0])),
            Self::Events => Value::Events(PwmGenEvents::from_bits(payload[0])),
            Self::TriggerMode => Value::TriggerMode(TriggerConfig::unpack(payload[0])),
            Self::TriggerAllMode => Value::TriggerAllMode(TriggerConfig::unpack(payload[0])),
        })
    }

    /// Parse a human-readable value of this kind, as accepted on the
    /// command line.
    pub fn parse_value(self, input: &str) -> Result<Value, ParseValueError> {
        let input = input.trim();
        Ok(match self {
            Self::F32 => {
                Value::F32(input.parse().map_err(|_| ParseValueError::Number(input.into()))?)
            }
            Self::U32 => {
                let parsed = match input.strip_prefix("0x") {
                    Some(hex) => u32::from_str_radix(hex, 16),
                    None => input.parse(),
                };
                Value::U32(parsed.map_err(|_| ParseValueError::Number(input.into()))?)
            }
            Self::PlaybackMode => Value::PlaybackMode(
                input.parse().map_err(|_| ParseValueError::Enum("PwmPlaybackMode", input.into()))?,
            ),
            Self::Channels => Value::Channels(input.parse()?),
            Self::Triggers => Value::Triggers(input.parse()?),
            Self::Events => Value::Events(input.parse()?),
            Self::TriggerMode => {
                let (mode, polarity) = parse_trigger_config(input)?;
                Value::TriggerMode(TriggerConfig {
                    mode: mode.parse().map_err(|_| ParseValueError::Enum("TriggerMode", mode.into()))?,
                    polarity,
                })
            }
            Self::TriggerAllMode => {
                let (mode, polarity) = parse_trigger_config(input)?;
                Value::TriggerAllMode(TriggerConfig {
                    mode: mode
                        .parse()
                        .map_err(|_| ParseValueError::Enum("TriggerAllMode", mode.into()))?,
                    polarity,
                })
            }
        })
    }
}

fn parse_trigger_config(input: &str) -> Result<(&str, Polarity), ParseValueError> {
    match input.split_once(',') {
        None => Ok((input, Polarity::Normal)),
        Some((mode, polarity)) => {
            let polarity = polarity
                .trim()
                .parse()
                .map_err(|_| ParseValueError::Enum("Polarity", polarity.trim().into()))?;
            Ok((mode.trim(), polarity))
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseValueError {
    #[error("`{0}` is not a valid number for this register")]
    Number(String),
    #[error("`{1}` is not a variant of {0}")]
    Enum(&'static str, String),
    #[error("`{1}` is not a flag of {0}")]
    Flag(&'static str, String),
}

/// Decoded semantic value of one register.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Value {
    F32(f32),
    U32(u32),
    PlaybackMode(PwmPlaybackMode),
    Channels(PwmChannels),
    Triggers(TriggerInput),
    Events(PwmGenEvents),
    TriggerMode(TriggerModeConfig),
    TriggerAllMode(TriggerAllModeConfig),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::F32(_) => ValueKind::F32,
            Self::U32(_) => ValueKind::U32,
            Self::PlaybackMode(_) => ValueKind::PlaybackMode,
            Self::Channels(_) => ValueKind::Channels,
            Self::Triggers(_) => ValueKind::Triggers,
            Self::Events(_) => ValueKind::Events,
            Self::TriggerMode(_) => ValueKind::TriggerMode,
            Self::TriggerAllMode(_) => ValueKind::TriggerAllMode,
        }
    }

    /// Produce the wire payload for this value. The inverse of
    /// [`ValueKind::decode`]; infallible for any representable value.
    pub fn to_payload(&self) -> Vec<u8> {
        match *self {
            Self::F32(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::PlaybackMode(v) => vec![ordinal(v)],
            Self::Channels(v) => vec![v.bits()],
            Self::Triggers(v) => vec![v.bits()],
            Self::Events(v) => vec![v.bits()],
            Self::TriggerMode(v) => vec![v.pack()],
            Self::TriggerAllMode(v) => vec![v.pack()],
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::F32(v) => f.write_fmt(format_args!("{}", v)),
            Self::U32(v) => f.write_fmt(format_args!("{}", v)),
            Self::PlaybackMode(v) => f.write_str(v.into()),
            Self::Channels(v) => v.fmt(f),
            Self::Triggers(v) => v.fmt(f),
            Self::Events(v) => v.fmt(f),
            Self::TriggerMode(v) => v.fmt(f),
            Self::TriggerAllMode(v) => v.fmt(f),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::F32(v) => serializer.serialize_f32(v),
            Self::U32(v) => serializer.serialize_u32(v),
            Self::PlaybackMode(v) => v.serialize(serializer),
            Self::Channels(v) => v.serialize(serializer),
            Self::Triggers(v) => v.serialize(serializer),
            Self::Events(v) => v.serialize(serializer),
            Self::TriggerMode(v) => v.serialize(serializer),
            Self::TriggerAllMode(v) => v.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_payloads_are_little_endian() {
        let value = ValueKind::F32.decode(&1.5f32.to_le_bytes()).unwrap();
        assert_eq!(value, Value::F32(1.5));
        assert_eq!(value.to_payload(), 1.5f32.to_le_bytes());
    }

    #[test]
    fn u32_payloads_are_little_endian() {
        let value = ValueKind::U32.decode(&[0x39, 0x30, 0x00, 0x00]).unwrap();
        assert_eq!(value, Value::U32(12345));
        assert_eq!(value.to_payload(), vec![0x39, 0x30, 0x00, 0x00]);
    }

    #[test]
    fn short_payload_is_malformed_not_zero_extended() {
        let result = ValueKind::F32.decode(&[0x00, 0x3f]);
        assert_eq!(result, Err(DecodeError::MalformedPayload { expected: 4, found: 2 }));
        let result = ValueKind::Channels.decode(&[]);
        assert_eq!(result, Err(DecodeError::MalformedPayload { expected: 1, found: 0 }));
    }

    #[test]
    fn long_payload_is_malformed_not_truncated() {
        let result = ValueKind::Channels.decode(&[0x1, 0x2]);
        assert_eq!(result, Err(DecodeError::MalformedPayload { expected: 1, found: 2 }));
    }

    #[test]
    fn playback_mode_domain_is_validated() {
        assert_eq!(
            ValueKind::PlaybackMode.decode(&[1]),
            Ok(Value::PlaybackMode(PwmPlaybackMode::Infinite))
        );
        assert_eq!(
            ValueKind::PlaybackMode.decode(&[2]),
            Err(DecodeError::InvalidEnumValue { domain: "PwmPlaybackMode", value: 2 })
        );
    }

    #[test]
    fn flag_unions_round_trip() {
        let mask = PwmChannels::CHANNEL0 | PwmChannels::CHANNEL2;
        assert_eq!(mask.bits(), 0x5);
        let decoded = ValueKind::Channels.decode(&[0x5]).unwrap();
        assert_eq!(decoded, Value::Channels(mask));
        assert_eq!(decoded.to_payload(), vec![0x5]);
        assert_eq!(ValueKind::Channels.decode(&[0x0]), Ok(Value::Channels(PwmChannels::NONE)));
        assert_eq!(ValueKind::Channels.decode(&[0xF]), Ok(Value::Channels(PwmChannels::ALL)));
    }

    #[test]
    fn flag_display_and_parse() {
        let mask = PwmChannels::CHANNEL0 | PwmChannels::CHANNEL2;
        assert_eq!(mask.to_string(), "channel0|channel2");
        assert_eq!("channel0|channel2".parse::<PwmChannels>(), Ok(mask));
        assert_eq!("none".parse::<PwmChannels>(), Ok(PwmChannels::NONE));
        assert_eq!("0x0f".parse::<PwmChannels>(), Ok(PwmChannels::ALL));
        assert_eq!(PwmChannels::NONE.to_string(), "none");
        assert!("channel9".parse::<PwmChannels>().is_err());
    }

    #[test]
    fn trigger_config_packs_documented_bits() {
        let config = TriggerModeConfig {
            mode: TriggerMode::StartAndStop,
            polarity: Polarity::Inverted,
        };
        assert_eq!(config.pack(), 0x11);
        assert_eq!(TriggerModeConfig::unpack(0x11), config);
    }

    #[test]
    fn trigger_config_ignores_reserved_bits_on_unpack() {
        assert_eq!(
            TriggerModeConfig::unpack(0xFF),
            TriggerModeConfig { mode: TriggerMode::StartAndStop, polarity: Polarity::Inverted }
        );
        assert_eq!(
            TriggerAllModeConfig::unpack(0x20),
            TriggerAllModeConfig { mode: TriggerAllMode::Start, polarity: Polarity::Normal }
        );
    }

    #[test]
    fn trigger_all_mode_covers_the_wider_domain() {
        let config = TriggerAllModeConfig {
            mode: TriggerAllMode::EnableAndStop,
            polarity: Polarity::Normal,
        };
        assert_eq!(config.pack(), 0x3);
        assert_eq!(TriggerAllModeConfig::unpack(0x3), config);
    }

    #[test]
    fn trigger_config_round_trips_every_valid_combination() {
        for mode in [TriggerMode::Start, TriggerMode::StartAndStop] {
            for polarity in [Polarity::Normal, Polarity::Inverted] {
                let config = TriggerModeConfig { mode, polarity };
                assert_eq!(TriggerModeConfig::unpack(config.pack()), config);
                assert_eq!(config.pack() & !0x11, 0, "reserved bit set for {config:?}");
            }
        }
        let modes = [
            TriggerAllMode::Start,
            TriggerAllMode::StartAndStop,
            TriggerAllMode::Enable,
            TriggerAllMode::EnableAndStop,
        ];
        for mode in modes {
            for polarity in [Polarity::Normal, Polarity::Inverted] {
                let config = TriggerAllModeConfig { mode, polarity };
                assert_eq!(TriggerAllModeConfig::unpack(config.pack()), config);
                assert_eq!(config.pack() & !0x13, 0, "reserved bit set for {config:?}");
            }
        }
    }

    #[test]
    fn enum_ordinals_drive_the_wire_encoding() {
        assert_eq!(TriggerMode::Start.bits(), 0);
        assert_eq!(TriggerMode::StartAndStop.bits(), 1);
        assert_eq!(TriggerAllMode::EnableAndStop.bits(), 3);
        assert_eq!(Value::PlaybackMode(PwmPlaybackMode::Infinite).to_payload(), vec![1]);
        let config = TriggerModeConfig { mode: TriggerMode::Start, polarity: Polarity::Inverted };
        assert_eq!(config.pack(), 0x10);
    }

    #[test]
    fn polarity_parse_failures_name_the_polarity_domain() {
        assert_eq!(
            ValueKind::TriggerMode.parse_value("start,backwards"),
            Err(ParseValueError::Enum("Polarity", "backwards".into()))
        );
        assert_eq!(
            ValueKind::TriggerAllMode.parse_value("enable, backwards"),
            Err(ParseValueError::Enum("Polarity", "backwards".into()))
        );
    }

    #[test]
    fn parse_values_from_the_command_line() {
        assert_eq!(ValueKind::F32.parse_value("12.5"), Ok(Value::F32(12.5)));
        assert_eq!(ValueKind::U32.parse_value("0x10"), Ok(Value::U32(16)));
        assert_eq!(
            ValueKind::PlaybackMode.parse_value("infinite"),
            Ok(Value::PlaybackMode(PwmPlaybackMode::Infinite))
        );
        assert_eq!(
            ValueKind::TriggerMode.parse_value("start-and-stop,inverted"),
            Ok(Value::TriggerMode(TriggerConfig {
                mode: TriggerMode::StartAndStop,
                polarity: Polarity::Inverted,
            }))
        );
        assert_eq!(
            ValueKind::TriggerAllMode.parse_value("enable-and-stop"),
            Ok(Value::TriggerAllMode(TriggerConfig {
                mode: TriggerAllMode::EnableAndStop,
                polarity: Polarity::Normal,
            }))
        );
        assert!(ValueKind::TriggerMode.parse_value("enable-and-stop").is_err());
    }
}
