//! # Codec
//!
//! Payload codec shared by every integration.
//!
//! One `Marshaler` is chosen per integration and used for both directions:
//! - `Json`: schema field names (`applicationID`, `devEUI`, `fCnt`, ...), bytes as base64
//! - `Protobuf`: numeric field tags, unknown tags ignored on decode

mod command;
mod error;

pub use command::{DownlinkCommandPayload, DownlinkPayload};
pub use error::CodecError;

use contracts::{
    AckEvent, DownlinkCommand, ErrorEvent, Event, EventKind, JoinEvent, LocationEvent,
    MarshalerKind, StatusEvent, TxAckEvent, UplinkEvent,
};
use prost::Message;
use std::fmt;
use std::str::FromStr;

/// Payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marshaler {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Protobuf (binary, compact)
    Protobuf,
}

impl Marshaler {
    pub fn name(&self) -> &'static str {
        match self {
            Marshaler::Json => "json",
            Marshaler::Protobuf => "protobuf",
        }
    }

    /// Encode the message wrapped by `event`
    pub fn encode_event(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
        match event {
            Event::Uplink(e) => self.encode_message(e),
            Event::Join(e) => self.encode_message(e),
            Event::Ack(e) => self.encode_message(e),
            Event::Error(e) => self.encode_message(e),
            Event::Status(e) => self.encode_message(e),
            Event::Location(e) => self.encode_message(e),
            Event::TxAck(e) => self.encode_message(e),
        }
    }

    /// Decode a message of the given kind
    pub fn decode_event(&self, kind: EventKind, payload: &[u8]) -> Result<Event, CodecError> {
        let event = match kind {
            EventKind::Uplink => Event::Uplink(self.decode_message::<UplinkEvent>(payload)?),
            EventKind::Join => Event::Join(self.decode_message::<JoinEvent>(payload)?),
            EventKind::Ack => Event::Ack(self.decode_message::<AckEvent>(payload)?),
            EventKind::Error => Event::Error(self.decode_message::<ErrorEvent>(payload)?),
            EventKind::Status => Event::Status(self.decode_message::<StatusEvent>(payload)?),
            EventKind::Location => {
                Event::Location(self.decode_message::<LocationEvent>(payload)?)
            }
            EventKind::TxAck => Event::TxAck(self.decode_message::<TxAckEvent>(payload)?),
        };
        Ok(event)
    }

    pub fn encode_command(&self, command: &DownlinkCommand) -> Result<Vec<u8>, CodecError> {
        match self {
            Marshaler::Json => Ok(serde_json::to_vec(&DownlinkPayload::from(command))?),
            Marshaler::Protobuf => {
                Ok(DownlinkCommandPayload::from_command(command)?.encode_to_vec())
            }
        }
    }

    /// Decode an inbound command
    ///
    /// Identifiers missing from the payload decode as zero; the caller fills them
    /// from the topic.
    pub fn decode_command(&self, payload: &[u8]) -> Result<DownlinkCommand, CodecError> {
        match self {
            Marshaler::Json => serde_json::from_slice::<DownlinkPayload>(payload)?.try_into(),
            Marshaler::Protobuf => DownlinkCommandPayload::decode(payload)?.try_into(),
        }
    }

    /// Encode a single event message without wrapping it in `Event`
    pub fn encode_message<M>(&self, message: &M) -> Result<Vec<u8>, CodecError>
    where
        M: Message + serde::Serialize,
    {
        match self {
            Marshaler::Json => Ok(serde_json::to_vec(message)?),
            Marshaler::Protobuf => Ok(message.encode_to_vec()),
        }
    }

    fn decode_message<M>(&self, payload: &[u8]) -> Result<M, CodecError>
    where
        M: Message + Default + serde::de::DeserializeOwned,
    {
        match self {
            Marshaler::Json => Ok(serde_json::from_slice(payload)?),
            Marshaler::Protobuf => Ok(M::decode(payload)?),
        }
    }
}

impl From<MarshalerKind> for Marshaler {
    fn from(kind: MarshalerKind) -> Self {
        match kind {
            MarshalerKind::Json => Marshaler::Json,
            MarshalerKind::Protobuf => Marshaler::Protobuf,
        }
    }
}

impl FromStr for Marshaler {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Marshaler::Json),
            "protobuf" | "proto" => Ok(Marshaler::Protobuf),
            other => Err(CodecError::UnknownMarshaler(other.to_string())),
        }
    }
}

impl fmt::Display for Marshaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
