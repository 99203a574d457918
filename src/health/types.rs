//! Health payload types.

use serde::{Deserialize, Serialize};

use crate::error::WafError;

/// Decoded health flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthFlag {
    Healthy,
    /// Any non-zero flag; the raw value is kept for reporting.
    Unhealthy(i64),
}

impl HealthFlag {
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            HealthFlag::Healthy
        } else {
            HealthFlag::Unhealthy(flag)
        }
    }
}

/// Backend health as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub flag: HealthFlag,
    /// Advisory only; never used for the pass/fail decision.
    pub message: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.flag == HealthFlag::Healthy
    }

    /// `Ok(self)` when healthy, otherwise an `Unhealthy` error naming the flag.
    pub fn into_result(self) -> Result<Self, WafError> {
        match self.flag {
            HealthFlag::Healthy => Ok(self),
            HealthFlag::Unhealthy(flag) => Err(WafError::Unhealthy {
                flag,
                message: self.message,
            }),
        }
    }
}

/// JSON body of a health response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPayload {
    #[serde(default)]
    pub result_flag: i64,
    #[serde(default)]
    pub msg: String,
}

impl From<HealthPayload> for HealthStatus {
    fn from(payload: HealthPayload) -> Self {
        Self {
            flag: HealthFlag::from_flag(payload.result_flag),
            message: payload.msg,
        }
    }
}

/// Decode a health response body.
pub fn decode_health(body: &[u8]) -> Result<HealthStatus, WafError> {
    let payload: HealthPayload = serde_json::from_slice(body).map_err(|source| WafError::Decode {
        payload: "health",
        source,
    })?;
    Ok(payload.into())
}
