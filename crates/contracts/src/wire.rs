//! Serde helpers for the textual wire form
//!
//! Byte fields travel as standard base64 strings, matching the protobuf JSON mapping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// `Vec<u8>` <-> base64 string
pub mod base64_bytes {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// `Vec<Vec<u8>>` <-> array of base64 strings
pub mod base64_bytes_seq {
    use super::*;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&STANDARD.encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
        items
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::base64_bytes", default)]
        data: Vec<u8>,
        #[serde(with = "super::base64_bytes_seq", default)]
        ids: Vec<Vec<u8>>,
    }

    #[test]
    fn test_bytes_are_base64() {
        let w = Wrapper {
            data: b"hello".to_vec(),
            ids: vec![vec![1, 2]],
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"data":"aGVsbG8=","ids":["AQI="]}"#);
    }

    #[test]
    fn test_null_and_missing_decode_to_empty() {
        let w: Wrapper = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(w.data.is_empty());
        assert!(w.ids.is_empty());
    }
}
