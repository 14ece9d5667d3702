//! Wire forms of the downlink command
//!
//! External applications publish `devEUI` as hex in the textual form; every
//! other byte field is base64. Identifiers may be omitted since the inbound
//! topic carries them.

use bytes::Bytes;
use contracts::wire::base64_bytes;
use contracts::{DevEui, DownlinkCommand};
use serde::{Deserialize, Serialize};

use crate::CodecError;

/// Textual command payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownlinkPayload {
    #[serde(rename = "applicationID", skip_serializing_if = "Option::is_none")]
    pub application_id: Option<u64>,

    #[serde(rename = "devEUI", skip_serializing_if = "Option::is_none")]
    pub dev_eui: Option<String>,

    pub confirmed: bool,

    #[serde(rename = "fPort")]
    pub f_port: u32,

    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,

    pub object: Option<serde_json::Value>,
}

impl From<&DownlinkCommand> for DownlinkPayload {
    fn from(command: &DownlinkCommand) -> Self {
        Self {
            application_id: Some(command.application_id),
            dev_eui: Some(command.dev_eui.to_string()),
            confirmed: command.confirmed,
            f_port: command.f_port,
            data: command.data.to_vec(),
            object: command.object.clone(),
        }
    }
}

impl TryFrom<DownlinkPayload> for DownlinkCommand {
    type Error = CodecError;

    fn try_from(payload: DownlinkPayload) -> Result<Self, Self::Error> {
        let dev_eui = match payload.dev_eui.as_deref() {
            None | Some("") => DevEui::default(),
            Some(s) => s
                .parse()
                .map_err(|e| CodecError::invalid_field("devEUI", format!("{}", e)))?,
        };

        Ok(DownlinkCommand {
            application_id: payload.application_id.unwrap_or_default(),
            dev_eui,
            confirmed: payload.confirmed,
            f_port: payload.f_port,
            data: Bytes::from(payload.data),
            object: payload.object.filter(|v| !v.is_null()),
        })
    }
}

/// Binary command payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DownlinkCommandPayload {
    #[prost(uint64, tag = "1")]
    pub application_id: u64,

    #[prost(bytes = "vec", tag = "2")]
    pub dev_eui: Vec<u8>,

    #[prost(bool, tag = "3")]
    pub confirmed: bool,

    #[prost(uint32, tag = "4")]
    pub f_port: u32,

    #[prost(bytes = "vec", tag = "5")]
    pub data: Vec<u8>,

    /// `object` serialized as JSON text, empty when absent
    #[prost(string, tag = "6")]
    pub object_json: String,
}

impl DownlinkCommandPayload {
    pub(crate) fn from_command(command: &DownlinkCommand) -> Result<Self, CodecError> {
        let object_json = match &command.object {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };

        Ok(Self {
            application_id: command.application_id,
            dev_eui: command.dev_eui.to_vec(),
            confirmed: command.confirmed,
            f_port: command.f_port,
            data: command.data.to_vec(),
            object_json,
        })
    }
}

impl TryFrom<DownlinkCommandPayload> for DownlinkCommand {
    type Error = CodecError;

    fn try_from(payload: DownlinkCommandPayload) -> Result<Self, Self::Error> {
        let dev_eui = if payload.dev_eui.is_empty() {
            DevEui::default()
        } else {
            DevEui::from_slice(&payload.dev_eui)
                .map_err(|e| CodecError::invalid_field("dev_eui", e.to_string()))?
        };

        let object = if payload.object_json.is_empty() {
            None
        } else {
            let value: serde_json::Value = serde_json::from_str(&payload.object_json)
                .map_err(|e| CodecError::invalid_field("object_json", e.to_string()))?;
            Some(value).filter(|v| !v.is_null())
        };

        Ok(DownlinkCommand {
            application_id: payload.application_id,
            dev_eui,
            confirmed: payload.confirmed,
            f_port: payload.f_port,
            data: Bytes::from(payload.data),
            object,
        })
    }
}
