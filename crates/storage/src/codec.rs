//! Record codecs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gantry_ports::PortsError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Turns values into record bytes and back.
pub trait Codec: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Encode a value.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PortsError>;

    /// Decode a value.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PortsError>;
}

/// Plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PortsError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PortsError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// JSON wrapped in standard base64, for stores that only accept text values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64JsonCodec;

impl Codec for Base64JsonCodec {
    fn name(&self) -> &'static str {
        "base64+json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, PortsError> {
        let json = serde_json::to_vec(value)?;
        Ok(STANDARD.encode(json).into_bytes())
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, PortsError> {
        let json = STANDARD
            .decode(bytes)
            .map_err(|e| PortsError::Serialization(format!("invalid base64: {e}")))?;
        Ok(serde_json::from_slice(&json)?)
    }
}
