//! The `{kind, payload}` message codec and its typed views.
//!
//! A [`Message`] is the self-describing unit carried inside a frame: a JSON
//! object with exactly two fields, a string `kind` tag and a `payload`
//! whose schema depends on the kind. A message either decodes completely or
//! fails with a serialization error; it is never silently dropped.
//!
//! [`Request`] and [`Response`] are the typed views the endpoints actually
//! work with; conversions to and from [`Message`] classify unknown kinds
//! and malformed payloads.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

use crate::error::{BridgeError, Result};

/// Kind tag for informational messages (handshake addresses, `exit`).
pub const KIND_INFO: &str = "info";
/// Kind tag for the load-simulator operation.
pub const KIND_LOAD_SIMULATOR: &str = "loadSimulator";
/// Kind tag for the update-and-run operation.
pub const KIND_UPDATE_AND_RUN: &str = "updateAndRun";

/// A decoded protocol message: kind tag plus kind-dependent payload.
///
/// Both fields are required; decoding rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// String tag naming the operation or message class.
    pub kind: String,
    /// Kind-dependent structured value.
    pub payload: Value,
}

impl Message {
    /// Serialize this message to a byte payload.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] if a contained value is not
    /// representable in JSON.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a byte payload into a message, validating that both required
    /// fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] on a parse failure or a
    /// missing field. This is distinct from a transport failure.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Build the handshake message carrying a socket address as a
    /// `[host, port]` pair.
    pub fn handshake(addr: SocketAddr) -> Self {
        Self {
            kind: KIND_INFO.to_string(),
            payload: json!([addr.ip().to_string(), addr.port()]),
        }
    }

    /// Extract the `[host, port]` pair from a handshake message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the kind is not `info`, and
    /// [`BridgeError::Serialization`] if the payload is not a two-element
    /// `[host, port]` sequence.
    pub fn handshake_addr(&self) -> Result<(String, u16)> {
        if self.kind != KIND_INFO {
            return Err(BridgeError::Protocol(format!(
                "expected an {KIND_INFO:?} handshake message, got kind {:?}",
                self.kind
            )));
        }

        let malformed =
            || BridgeError::Serialization("handshake payload must be a [host, port] pair".into());

        let pair = self.payload.as_array().ok_or_else(malformed)?;
        if pair.len() != 2 {
            return Err(malformed());
        }
        let host = pair[0].as_str().ok_or_else(malformed)?.to_string();
        let port = pair[1]
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(malformed)?;

        Ok((host, port))
    }
}

/// A logical request issued by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Informational text; the literal `exit` (any case) is the sanctioned
    /// shutdown request.
    Info(String),
    /// Load the simulation environment.
    LoadSimulator,
    /// Push variable values and run one simulation.
    UpdateAndRun(BTreeMap<String, f64>),
}

impl Request {
    /// The wire kind tag for this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Info(_) => KIND_INFO,
            Request::LoadSimulator => KIND_LOAD_SIMULATOR,
            Request::UpdateAndRun(_) => KIND_UPDATE_AND_RUN,
        }
    }

    /// Convert this request into its wire message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] if a variable value is
    /// non-finite and therefore unrepresentable.
    pub fn into_message(self) -> Result<Message> {
        let (kind, payload) = match self {
            Request::Info(text) => (KIND_INFO, Value::String(text)),
            Request::LoadSimulator => (KIND_LOAD_SIMULATOR, Value::Null),
            Request::UpdateAndRun(vars) => (KIND_UPDATE_AND_RUN, numbers_to_value(&vars)?),
        };
        Ok(Message {
            kind: kind.to_string(),
            payload,
        })
    }
}

impl TryFrom<Message> for Request {
    type Error = BridgeError;

    fn try_from(msg: Message) -> Result<Self> {
        match msg.kind.as_str() {
            KIND_INFO => {
                let text = msg.payload.as_str().ok_or_else(|| {
                    BridgeError::Serialization("info payload must be a string".into())
                })?;
                Ok(Request::Info(text.to_string()))
            }
            KIND_LOAD_SIMULATOR => Ok(Request::LoadSimulator),
            KIND_UPDATE_AND_RUN => Ok(Request::UpdateAndRun(numbers_from_value(&msg.payload)?)),
            other => Err(BridgeError::Unsupported(format!(
                "unknown request kind {other:?}"
            ))),
        }
    }
}

/// A logical response produced by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The variables most recently written to the variable file.
    LoadSimulator(BTreeMap<String, f64>),
    /// The results parsed from the simulation output file.
    UpdateAndRun(BTreeMap<String, f64>),
}

impl Response {
    /// The wire kind tag for this response.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::LoadSimulator(_) => KIND_LOAD_SIMULATOR,
            Response::UpdateAndRun(_) => KIND_UPDATE_AND_RUN,
        }
    }

    /// Convert this response into its wire message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] if a value is non-finite.
    pub fn into_message(self) -> Result<Message> {
        let (kind, values) = match self {
            Response::LoadSimulator(vars) => (KIND_LOAD_SIMULATOR, vars),
            Response::UpdateAndRun(results) => (KIND_UPDATE_AND_RUN, results),
        };
        Ok(Message {
            kind: kind.to_string(),
            payload: numbers_to_value(&values)?,
        })
    }
}

impl TryFrom<Message> for Response {
    type Error = BridgeError;

    fn try_from(msg: Message) -> Result<Self> {
        match msg.kind.as_str() {
            KIND_LOAD_SIMULATOR => Ok(Response::LoadSimulator(numbers_from_value(&msg.payload)?)),
            KIND_UPDATE_AND_RUN => Ok(Response::UpdateAndRun(numbers_from_value(&msg.payload)?)),
            other => Err(BridgeError::Unsupported(format!(
                "unknown response kind {other:?}"
            ))),
        }
    }
}

/// Build a JSON object from a name → value mapping.
///
/// JSON has no encoding for non-finite numbers, so those fail here rather
/// than being silently nulled.
fn numbers_to_value(values: &BTreeMap<String, f64>) -> Result<Value> {
    let mut map = Map::new();
    for (name, value) in values {
        let number = Number::from_f64(*value).ok_or_else(|| {
            BridgeError::Serialization(format!("value for {name:?} is not a finite number"))
        })?;
        map.insert(name.clone(), Value::Number(number));
    }
    Ok(Value::Object(map))
}

/// Read a name → value mapping back out of a JSON object.
fn numbers_from_value(value: &Value) -> Result<BTreeMap<String, f64>> {
    let obj = value.as_object().ok_or_else(|| {
        BridgeError::Serialization("payload must be an object of numeric values".into())
    })?;

    obj.iter()
        .map(|(name, v)| {
            v.as_f64().map(|f| (name.clone(), f)).ok_or_else(|| {
                BridgeError::Serialization(format!("value for {name:?} is not a number"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_vars() -> BTreeMap<String, f64> {
        BTreeMap::from([("ib".to_string(), 3e-6), ("vbias".to_string(), 0.7)])
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = Request::UpdateAndRun(sample_vars()).into_message().unwrap();
        let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let result = Message::decode(br#"{"kind":"info"}"#);
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }

    #[test]
    fn test_decode_extra_field_fails() {
        let result = Message::decode(br#"{"kind":"info","payload":null,"extra":1}"#);
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }

    #[test]
    fn test_decode_invalid_json_fails() {
        let result = Message::decode(b"not json at all");
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }

    #[test]
    fn test_unknown_request_kind_is_unsupported() {
        let msg = Message {
            kind: "reboot".to_string(),
            payload: Value::Null,
        };
        let result = Request::try_from(msg);
        assert!(matches!(result, Err(BridgeError::Unsupported(_))));
    }

    #[test]
    fn test_request_roundtrip_through_message() {
        let req = Request::UpdateAndRun(sample_vars());
        let msg = req.clone().into_message().unwrap();
        assert_eq!(msg.kind, KIND_UPDATE_AND_RUN);
        assert_eq!(Request::try_from(msg).unwrap(), req);
    }

    #[test]
    fn test_response_roundtrip_through_message() {
        let resp = Response::LoadSimulator(sample_vars());
        let msg = resp.clone().into_message().unwrap();
        assert_eq!(msg.kind, KIND_LOAD_SIMULATOR);
        assert_eq!(Response::try_from(msg).unwrap(), resp);
    }

    #[test]
    fn test_non_finite_value_fails_to_encode() {
        let vars = BTreeMap::from([("gain".to_string(), f64::NAN)]);
        let result = Request::UpdateAndRun(vars).into_message();
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
    }

    #[test]
    fn test_handshake_roundtrip() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        let msg = Message::handshake(addr);
        assert_eq!(msg.kind, KIND_INFO);
        assert_eq!(
            msg.handshake_addr().unwrap(),
            ("127.0.0.1".to_string(), 3000)
        );
    }

    #[test]
    fn test_handshake_addr_rejects_wrong_kind() {
        let msg = Message {
            kind: KIND_LOAD_SIMULATOR.to_string(),
            payload: json!(["localhost", 3000]),
        };
        assert!(matches!(
            msg.handshake_addr(),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn test_handshake_addr_rejects_malformed_pair() {
        let msg = Message {
            kind: KIND_INFO.to_string(),
            payload: json!(["localhost"]),
        };
        assert!(matches!(
            msg.handshake_addr(),
            Err(BridgeError::Serialization(_))
        ));
    }
}
