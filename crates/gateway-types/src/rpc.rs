use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MAX_METHOD_LEN: usize = 100;
pub const MAX_PARAMS_LEN: usize = 10;

/// Inbound or outbound JSON-RPC 2.0 envelope, forwarded verbatim to upstream
/// providers with no body transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("jsonrpc must be \"2.0\"")]
    WrongVersion,
    #[error("method name exceeds {MAX_METHOD_LEN} characters")]
    MethodTooLong,
    #[error("params array exceeds {MAX_PARAMS_LEN} entries")]
    ParamsTooLong,
}

impl JsonRpcRequest {
    /// Validates the envelope against the bounds in the wire contract.
    /// Violations are the caller's fault and map to HTTP 400 with JSON-RPC
    /// error code -32600.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.jsonrpc != "2.0" {
            return Err(EnvelopeError::WrongVersion);
        }
        if self.method.len() > MAX_METHOD_LEN {
            return Err(EnvelopeError::MethodTooLong);
        }
        if let Some(Value::Array(items)) = &self.params {
            if items.len() > MAX_PARAMS_LEN {
                return Err(EnvelopeError::ParamsTooLong);
            }
        }
        Ok(())
    }

    /// First positional parameter, if `params` is a non-empty array.
    pub fn first_param(&self) -> Option<&Value> {
        match &self.params {
            Some(Value::Array(items)) => items.first(),
            _ => None,
        }
    }

    /// Named option read from an object-form `params`, or the second
    /// positional array entry if it is itself an object (the conventional
    /// Solana JSON-RPC "options" argument shape).
    pub fn option(&self, key: &str) -> Option<&Value> {
        match &self.params {
            Some(Value::Object(map)) => map.get(key),
            Some(Value::Array(items)) => items
                .iter()
                .find_map(|item| item.as_object().and_then(|obj| obj.get(key))),
            _ => None,
        }
    }
}

pub const JSON_RPC_INVALID_REQUEST: i64 = -32600;
pub const JSON_RPC_INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorEnvelope {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: JsonRpcErrorObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl JsonRpcErrorEnvelope {
    pub fn new(id: Value, code: i64, message: impl Into<String>) -> Self {
        JsonRpcErrorEnvelope {
            jsonrpc: "2.0",
            id,
            error: JsonRpcErrorObject {
                code,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Value::from(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn rejects_wrong_version() {
        let mut req = request("getSlot", None);
        req.jsonrpc = "1.0".to_string();
        assert_eq!(req.validate(), Err(EnvelopeError::WrongVersion));
    }

    #[test]
    fn rejects_long_method() {
        let req = request(&"m".repeat(MAX_METHOD_LEN + 1), None);
        assert_eq!(req.validate(), Err(EnvelopeError::MethodTooLong));
    }

    #[test]
    fn rejects_long_params_array() {
        let params: Vec<Value> = (0..=MAX_PARAMS_LEN).map(Value::from).collect();
        let req = request("getBlock", Some(Value::Array(params)));
        assert_eq!(req.validate(), Err(EnvelopeError::ParamsTooLong));
    }

    #[test]
    fn accepts_well_formed_request() {
        let req = request("getBlock", Some(Value::Array(vec![Value::from(1)])));
        assert!(req.validate().is_ok());
    }
}
