//! Verdict types and payload decoding.

use serde::{Deserialize, Serialize};

use crate::error::WafError;

/// Normalized detection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectResult {
    /// Request may proceed.
    Pass,
    /// Request should be blocked.
    Block,
}

impl DetectResult {
    /// Map a raw `result_flag`: zero is Pass, anything else is Block.
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            DetectResult::Pass
        } else {
            DetectResult::Block
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectResult::Pass => "pass",
            DetectResult::Block => "block",
        }
    }
}

impl std::fmt::Display for DetectResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability implemented by detection results handed to the gateway.
pub trait WafResult {
    /// Identifier the backend assigned to this inspection.
    fn event_id(&self) -> &str;

    /// Normalized pass/block decision.
    fn result_flag(&self) -> DetectResult;
}

/// Decoded backend verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub event_id: String,
    pub result: DetectResult,
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        self.result == DetectResult::Block
    }
}

impl WafResult for Verdict {
    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn result_flag(&self) -> DetectResult {
        self.result
    }
}

impl From<DetectPayload> for Verdict {
    fn from(payload: DetectPayload) -> Self {
        Self {
            event_id: payload.event_id,
            result: DetectResult::from_flag(payload.result_flag),
        }
    }
}

/// JSON body of a detection response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectPayload {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub result_flag: i64,
}

/// Decode a detection response body into a verdict.
pub fn decode_verdict(body: &[u8]) -> Result<Verdict, WafError> {
    let payload: DetectPayload = serde_json::from_slice(body).map_err(|source| WafError::Decode {
        payload: "detection",
        source,
    })?;
    Ok(payload.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_flag_is_pass() {
        let verdict = decode_verdict(br#"{"event_id":"evt-1","result_flag":0}"#).unwrap();
        assert_eq!(verdict.event_id(), "evt-1");
        assert_eq!(verdict.result_flag(), DetectResult::Pass);
        assert!(!verdict.is_blocked());
    }

    #[test]
    fn absent_flag_is_pass() {
        let verdict = decode_verdict(br#"{"event_id":"evt-2"}"#).unwrap();
        assert_eq!(verdict.result, DetectResult::Pass);
    }

    #[test]
    fn any_non_zero_flag_is_block() {
        for flag in [1_i64, 2, -1, 255, i64::MAX, i64::MIN] {
            let body = format!(r#"{{"event_id":"e","result_flag":{}}}"#, flag);
            let verdict = decode_verdict(body.as_bytes()).unwrap();
            assert_eq!(verdict.result, DetectResult::Block, "flag {flag}");
        }
    }

    #[test]
    fn missing_event_id_defaults_to_empty() {
        let verdict = decode_verdict(br#"{"result_flag":1}"#).unwrap();
        assert_eq!(verdict.event_id, "");
        assert!(verdict.is_blocked());
    }

    #[test]
    fn malformed_body_is_decode_error() {
        for body in [&b"not json"[..], b"", br#"{"result_flag":"yes"}"#, b"[1,2]"] {
            let err = decode_verdict(body).unwrap_err();
            assert!(matches!(err, WafError::Decode { payload: "detection", .. }));
        }
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let verdict = decode_verdict(br#"{"event_id":"x","result_flag":0,"score":0.3}"#).unwrap();
        assert_eq!(verdict.result, DetectResult::Pass);
    }
}
