// Two encodings live here: canonical JSON for everything that gets hashed,
// signed, or sent to a peer, and bincode 2 for records written to disk.
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Deterministic JSON encoding. Keys come out in struct declaration order and
/// no maps are used in hashed types, so equal values always yield equal bytes.
pub fn canonical_json<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(data)
        .map_err(|e| LedgerError::Serialization(format!("Canonical encoding failed: {e}")))
}

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| LedgerError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

/// `#[serde(with = "serde_hex")]` for byte fields that travel as JSON.
pub mod serde_hex {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::utils::hex_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::utils::hex_decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct TestData {
        id: u64,
        name: String,
        #[serde(with = "serde_hex")]
        payload: Vec<u8>,
    }

    fn sample() -> TestData {
        TestData {
            id: 42,
            name: "test".to_string(),
            payload: vec![1, 2, 254],
        }
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = sample();
        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: TestData = deserialize(&serialized).expect("Deserialization should work");
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<TestData> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_canonical_json_is_stable_and_hex_encodes_bytes() {
        let first = canonical_json(&sample()).unwrap();
        let second = canonical_json(&sample()).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert_eq!(text, r#"{"id":42,"name":"test","payload":"0102fe"}"#);
    }
}
