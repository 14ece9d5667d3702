//! DevEui - 64-bit device identifier
//!
//! Stored as raw bytes, displayed and serialized as 16 lowercase hex characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a DevEUI cannot be parsed from text or bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevEuiError {
    /// Wrong number of bytes
    #[error("devEUI must be 8 bytes, got {0}")]
    InvalidLength(usize),

    /// Not a hex string
    #[error("devEUI is not valid hex: {0}")]
    InvalidHex(String),
}

/// LoRaWAN device EUI (8 bytes).
///
/// # Examples
/// ```
/// use contracts::DevEui;
///
/// let eui: DevEui = "0102030405060708".parse().unwrap();
/// assert_eq!(eui.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
/// assert_eq!(eui.to_string(), "0102030405060708");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DevEui([u8; 8]);

impl DevEui {
    /// Create from raw bytes
    #[inline]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Owned copy of the raw bytes (protobuf `bytes` fields)
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parse from a byte slice of exactly 8 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DevEuiError> {
        let array: [u8; 8] = bytes
            .try_into()
            .map_err(|_| DevEuiError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl From<[u8; 8]> for DevEui {
    #[inline]
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for DevEui {
    type Error = DevEuiError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl FromStr for DevEui {
    type Err = DevEuiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| DevEuiError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevEui({})", self)
    }
}

impl Serialize for DevEui {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DevEui {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
