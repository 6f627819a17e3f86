pub mod registers {
    use crate::output;
    use crate::registers::{Mode, RegisterIndex};
    use crate::values::PayloadType;

    /// Search and output the register table of the device.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only show registers whose name, address or description contains
        /// this string.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not output the register table")]
        Output(#[from] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct RegisterSchema {
        pub address: u8,
        pub name: &'static str,
        pub mode: Mode,
        pub payload_type: PayloadType,
        pub description: &'static str,
    }

    impl RegisterSchema {
        pub fn all_registers() -> impl Iterator<Item = Self> {
            RegisterIndex::all().map(|register| RegisterSchema {
                address: register.address(),
                name: register.name(),
                mode: register.mode(),
                payload_type: register.payload_type(),
                description: register.description(),
            })
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_uppercase();
            self.name.to_uppercase().contains(&pattern)
                || self.description.to_uppercase().contains(&pattern)
                || self.address.to_string().contains(&pattern)
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut sink = args.output.into_sink()?;
        sink.headers(&["Address", "Name", "Mode", "Type", "Description"])?;
        for register in RegisterSchema::all_registers() {
            if let Some(pattern) = &args.filter {
                if !register.is_match(pattern) {
                    continue;
                }
            }
            sink.row(
                || {
                    vec![
                        register.address.to_string(),
                        register.name.to_string(),
                        register.mode.to_string(),
                        register.payload_type.to_string(),
                        register.description.to_string(),
                    ]
                },
                || &register,
            )?;
        }
        Ok(sink.finish()?)
    }
}

pub mod decode {
    use tracing::debug;

    use crate::harp::{MessageKind, RawMessage};
    use crate::output;
    use crate::registers::RegisterIndex;
    use crate::values::Value;

    /// Decode a raw register payload into its typed value.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Register address or name.
        register: String,
        /// Payload bytes as hexadecimal, e.g. `11` or `39300000`.
        payload: String,
        /// Timestamp of the message, in seconds.
        #[arg(long, short = 't')]
        timestamp: Option<f64>,
        /// Message kind to attribute the payload to.
        #[arg(long, value_enum, default_value_t = MessageKind::Read)]
        kind: MessageKind,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("`{0}` is neither a register address nor a register name")]
        NoSuchRegister(String),
        #[error("`{0}` is not a hexadecimal payload")]
        PayloadNotHex(String),
        #[error("could not decode the payload")]
        Decode(#[from] crate::values::DecodeError),
        #[error("could not output the decoded value")]
        Output(#[from] output::Error),
    }

    pub(crate) fn resolve_register(input: &str) -> Option<RegisterIndex> {
        match input.parse::<u8>() {
            Ok(address) => RegisterIndex::from_address(address),
            Err(_) => RegisterIndex::from_name(input),
        }
    }

    pub(crate) fn parse_hex(input: &str) -> Option<Vec<u8>> {
        let input = input.strip_prefix("0x").unwrap_or(input);
        if input.len() % 2 != 0 {
            return None;
        }
        (0..input.len())
            .step_by(2)
            .map(|at| u8::from_str_radix(&input[at..at + 2], 16).ok())
            .collect()
    }

    #[derive(serde::Serialize)]
    struct DecodeRecord<'a> {
        address: u8,
        name: &'static str,
        value: &'a Value,
        timestamp: Option<f64>,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let register = resolve_register(&args.register)
            .ok_or_else(|| Error::NoSuchRegister(args.register.clone()))?;
        let payload =
            parse_hex(&args.payload).ok_or_else(|| Error::PayloadNotHex(args.payload.clone()))?;
        let message = RawMessage {
            address: register.address(),
            kind: args.kind,
            payload_type: register.payload_type(),
            payload,
            timestamp: args.timestamp,
        };
        let decoded = message.decode()?;
        debug!(message = "decoded", register = decoded.register.name(), value = %decoded.value);
        let mut sink = args.output.into_sink()?;
        sink.headers(&["Address", "Name", "Value", "Timestamp"])?;
        sink.row(
            || {
                vec![
                    decoded.register.address().to_string(),
                    decoded.register.name().to_string(),
                    decoded.value.to_string(),
                    decoded.timestamp.map(|t| t.to_string()).unwrap_or_default(),
                ]
            },
            || DecodeRecord {
                address: decoded.register.address(),
                name: decoded.register.name(),
                value: &decoded.value,
                timestamp: decoded.timestamp,
            },
        )?;
        Ok(sink.finish()?)
    }
}

pub mod encode {
    use tracing::debug;

    use crate::harp::RawMessage;
    use crate::output;
    use crate::values::Value;

    /// Encode a typed value into the wire payload of a register write.
    ///
    /// Values are written the way `decode` prints them: plain numbers for
    /// numeric registers, `|`-separated flag names for masks, and
    /// `mode,polarity` for the trigger mode registers.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Register address or name.
        register: String,
        /// The value to encode.
        value: String,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("`{0}` is neither a register address nor a register name")]
        NoSuchRegister(String),
        #[error("could not parse the value")]
        ParseValue(#[from] crate::values::ParseValueError),
        #[error("could not encode the value")]
        Encode(#[from] crate::values::ValueMismatch),
        #[error("could not output the encoded payload")]
        Output(#[from] output::Error),
    }

    #[derive(serde::Serialize)]
    struct EncodeRecord<'a> {
        address: u8,
        name: &'static str,
        value: &'a Value,
        payload: String,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let register = super::decode::resolve_register(&args.register)
            .ok_or_else(|| Error::NoSuchRegister(args.register.clone()))?;
        let value = register.kind().parse_value(&args.value)?;
        let message = RawMessage::write(register, &value)?;
        let hex: String = message.payload.iter().map(|b| format!("{b:02x}")).collect();
        debug!(message = "encoded", register = register.name(), payload = %hex);
        let mut sink = args.output.into_sink()?;
        sink.headers(&["Address", "Name", "Value", "Payload"])?;
        sink.row(
            || {
                vec![
                    register.address().to_string(),
                    register.name().to_string(),
                    value.to_string(),
                    hex.clone(),
                ]
            },
            || EncodeRecord {
                address: register.address(),
                name: register.name(),
                value: &value,
                payload: hex.clone(),
            },
        )?;
        Ok(sink.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::decode::{parse_hex, resolve_register};

    #[test]
    fn registers_resolve_by_address_or_name() {
        assert_eq!(resolve_register("70").map(|r| r.name()), Some("TriggerAllMode"));
        assert_eq!(resolve_register("TriggerAllMode").map(|r| r.address()), Some(70));
        assert_eq!(resolve_register("63"), None);
        assert_eq!(resolve_register("NoSuchThing"), None);
    }

    #[test]
    fn hex_payload_parsing() {
        assert_eq!(parse_hex("11"), Some(vec![0x11]));
        assert_eq!(parse_hex("0x39300000"), Some(vec![0x39, 0x30, 0x00, 0x00]));
        assert_eq!(parse_hex("1"), None);
        assert_eq!(parse_hex("zz"), None);
    }
}
