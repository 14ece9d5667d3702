//! Device lifecycle events - network core output
//!
//! One message per event kind. Each struct is both a protobuf message (numeric
//! field tags, compact binary form) and a serde type (textual form with the
//! schema's human-readable field names).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::wire::{base64_bytes, base64_bytes_seq};
use crate::{DevEui, DevEuiError};

/// Event kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Uplink,
    Join,
    Ack,
    Error,
    Status,
    Location,
    TxAck,
}

impl EventKind {
    /// All kinds, in template order
    pub const ALL: [EventKind; 7] = [
        EventKind::Uplink,
        EventKind::Join,
        EventKind::Ack,
        EventKind::Error,
        EventKind::Status,
        EventKind::Location,
        EventKind::TxAck,
    ];

    /// Stable short name, used as log field and metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Uplink => "up",
            EventKind::Join => "join",
            EventKind::Ack => "ack",
            EventKind::Error => "error",
            EventKind::Status => "status",
            EventKind::Location => "location",
            EventKind::TxAck => "txack",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway reception metadata
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct RxInfo {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(rename = "gatewayID", with = "base64_bytes")]
    pub gateway_id: Vec<u8>,

    #[prost(int32, tag = "2")]
    pub rssi: i32,

    #[prost(double, tag = "3")]
    #[serde(rename = "loRaSNR")]
    pub lora_snr: f64,

    #[prost(message, optional, tag = "4")]
    pub location: Option<Location>,
}

/// Transmission parameters of the uplink
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TxInfo {
    #[prost(uint32, tag = "1")]
    pub frequency: u32,

    #[prost(uint32, tag = "2")]
    pub dr: u32,
}

/// Geographic position
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[prost(double, tag = "1")]
    pub latitude: f64,

    #[prost(double, tag = "2")]
    pub longitude: f64,

    #[prost(double, tag = "3")]
    pub altitude: f64,

    #[prost(enumeration = "LocationSource", tag = "4")]
    pub source: i32,

    #[prost(uint32, tag = "5")]
    pub accuracy: u32,
}

/// Where a location estimate came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LocationSource {
    Unknown = 0,
    Gps = 1,
    Config = 2,
    GeoResolverTdoa = 3,
    GeoResolverRssi = 4,
    GeoResolverGnss = 5,
    GeoResolverWifi = 6,
}

/// Category of an error event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorType {
    Unknown = 0,
    DownlinkPayloadSize = 1,
    DownlinkFcnt = 2,
    UplinkCodec = 3,
    DownlinkCodec = 4,
    Otaa = 5,
    UplinkFcntReset = 6,
    UplinkMic = 7,
    UplinkFcntRetransmission = 8,
    DownlinkGateway = 9,
}

/// Uplink data received
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(message, repeated, tag = "5")]
    #[serde(rename = "rxInfo")]
    pub rx_info: Vec<RxInfo>,

    #[prost(message, optional, tag = "6")]
    #[serde(rename = "txInfo")]
    pub tx_info: Option<TxInfo>,

    #[prost(bool, tag = "7")]
    pub adr: bool,

    #[prost(uint32, tag = "8")]
    pub dr: u32,

    #[prost(uint32, tag = "9")]
    #[serde(rename = "fCnt")]
    pub f_cnt: u32,

    #[prost(uint32, tag = "10")]
    #[serde(rename = "fPort")]
    pub f_port: u32,

    #[prost(bytes = "vec", tag = "11")]
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,

    #[prost(string, tag = "12")]
    #[serde(rename = "objectJSON")]
    pub object_json: String,

    #[prost(map = "string, string", tag = "13")]
    pub tags: HashMap<String, String>,

    #[prost(bool, tag = "14")]
    #[serde(rename = "confirmedUplink")]
    pub confirmed_uplink: bool,

    #[prost(bytes = "vec", tag = "15")]
    #[serde(rename = "devAddr", with = "base64_bytes")]
    pub dev_addr: Vec<u8>,
}

/// Device (re)joined the network
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(bytes = "vec", tag = "5")]
    #[serde(rename = "devAddr", with = "base64_bytes")]
    pub dev_addr: Vec<u8>,

    #[prost(message, repeated, tag = "6")]
    #[serde(rename = "rxInfo")]
    pub rx_info: Vec<RxInfo>,

    #[prost(message, optional, tag = "7")]
    #[serde(rename = "txInfo")]
    pub tx_info: Option<TxInfo>,

    #[prost(uint32, tag = "8")]
    pub dr: u32,

    #[prost(map = "string, string", tag = "9")]
    pub tags: HashMap<String, String>,
}

/// Confirmed downlink was (not) acknowledged by the device
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct AckEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(message, repeated, tag = "5")]
    #[serde(rename = "rxInfo")]
    pub rx_info: Vec<RxInfo>,

    #[prost(bool, tag = "6")]
    pub acknowledged: bool,

    #[prost(uint32, tag = "7")]
    #[serde(rename = "fCnt")]
    pub f_cnt: u32,

    #[prost(map = "string, string", tag = "8")]
    pub tags: HashMap<String, String>,
}

/// Processing error for a device
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(enumeration = "ErrorType", tag = "5")]
    #[serde(rename = "type")]
    pub error_type: i32,

    #[prost(string, tag = "6")]
    pub error: String,

    #[prost(uint32, tag = "7")]
    #[serde(rename = "fCnt")]
    pub f_cnt: u32,

    #[prost(map = "string, string", tag = "8")]
    pub tags: HashMap<String, String>,
}

/// Device battery / link margin report
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(int32, tag = "5")]
    pub margin: i32,

    #[prost(bool, tag = "6")]
    #[serde(rename = "externalPowerSource")]
    pub external_power_source: bool,

    #[prost(bool, tag = "7")]
    #[serde(rename = "batteryLevelUnavailable")]
    pub battery_level_unavailable: bool,

    #[prost(float, tag = "8")]
    #[serde(rename = "batteryLevel")]
    pub battery_level: f32,

    #[prost(map = "string, string", tag = "9")]
    pub tags: HashMap<String, String>,
}

/// Location estimate for a device
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(message, optional, tag = "5")]
    pub location: Option<Location>,

    #[prost(bytes = "vec", repeated, tag = "6")]
    #[serde(rename = "uplinkIDs", with = "base64_bytes_seq")]
    pub uplink_ids: Vec<Vec<u8>>,

    #[prost(uint32, tag = "7")]
    #[serde(rename = "fCnt")]
    pub f_cnt: u32,

    #[prost(map = "string, string", tag = "8")]
    pub tags: HashMap<String, String>,
}

/// Downlink was transmitted by a gateway
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct TxAckEvent {
    #[prost(uint64, tag = "1")]
    #[serde(rename = "applicationID")]
    pub application_id: u64,

    #[prost(string, tag = "2")]
    #[serde(rename = "applicationName")]
    pub application_name: String,

    #[prost(string, tag = "3")]
    #[serde(rename = "deviceName")]
    pub device_name: String,

    #[prost(bytes = "vec", tag = "4")]
    #[serde(rename = "devEUI", with = "base64_bytes")]
    pub dev_eui: Vec<u8>,

    #[prost(uint32, tag = "5")]
    #[serde(rename = "fCnt")]
    pub f_cnt: u32,

    #[prost(bytes = "vec", tag = "6")]
    #[serde(rename = "gatewayID", with = "base64_bytes")]
    pub gateway_id: Vec<u8>,

    #[prost(map = "string, string", tag = "7")]
    pub tags: HashMap<String, String>,
}

/// Identity shared by every event message
pub trait EventMessage {
    /// Kind of this message
    const KIND: EventKind;

    /// Application the device belongs to
    fn application_id(&self) -> u64;

    /// Raw devEUI bytes as carried on the wire
    fn dev_eui_bytes(&self) -> &[u8];

    /// devEUI, if the wire bytes have the right length
    fn dev_eui(&self) -> Result<DevEui, DevEuiError> {
        DevEui::from_slice(self.dev_eui_bytes())
    }
}

macro_rules! impl_event_message {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl EventMessage for $ty {
                const KIND: EventKind = EventKind::$variant;

                #[inline]
                fn application_id(&self) -> u64 {
                    self.application_id
                }

                #[inline]
                fn dev_eui_bytes(&self) -> &[u8] {
                    &self.dev_eui
                }
            }

            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Event::$variant(event)
                }
            }
        )*
    };
}

impl_event_message! {
    UplinkEvent => Uplink,
    JoinEvent => Join,
    AckEvent => Ack,
    ErrorEvent => Error,
    StatusEvent => Status,
    LocationEvent => Location,
    TxAckEvent => TxAck,
}

/// Any device lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Uplink(UplinkEvent),
    Join(JoinEvent),
    Ack(AckEvent),
    Error(ErrorEvent),
    Status(StatusEvent),
    Location(LocationEvent),
    TxAck(TxAckEvent),
}

impl Event {
    /// Kind of the wrapped message
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Uplink(_) => EventKind::Uplink,
            Event::Join(_) => EventKind::Join,
            Event::Ack(_) => EventKind::Ack,
            Event::Error(_) => EventKind::Error,
            Event::Status(_) => EventKind::Status,
            Event::Location(_) => EventKind::Location,
            Event::TxAck(_) => EventKind::TxAck,
        }
    }

    pub fn application_id(&self) -> u64 {
        match self {
            Event::Uplink(e) => e.application_id,
            Event::Join(e) => e.application_id,
            Event::Ack(e) => e.application_id,
            Event::Error(e) => e.application_id,
            Event::Status(e) => e.application_id,
            Event::Location(e) => e.application_id,
            Event::TxAck(e) => e.application_id,
        }
    }

    pub fn dev_eui_bytes(&self) -> &[u8] {
        match self {
            Event::Uplink(e) => &e.dev_eui,
            Event::Join(e) => &e.dev_eui,
            Event::Ack(e) => &e.dev_eui,
            Event::Error(e) => &e.dev_eui,
            Event::Status(e) => &e.dev_eui,
            Event::Location(e) => &e.dev_eui,
            Event::TxAck(e) => &e.dev_eui,
        }
    }
}
