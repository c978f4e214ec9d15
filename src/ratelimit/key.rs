//! Rate limit key model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version of the cloud API an operation belongs to.
///
/// Unknown versions are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApiVersion {
    Ga,
    Alpha,
    Beta,
    Other(String),
}

impl ApiVersion {
    pub fn as_str(&self) -> &str {
        match self {
            ApiVersion::Ga => "ga",
            ApiVersion::Alpha => "alpha",
            ApiVersion::Beta => "beta",
            ApiVersion::Other(v) => v,
        }
    }
}

impl From<&str> for ApiVersion {
    fn from(s: &str) -> Self {
        match s {
            "ga" => ApiVersion::Ga,
            "alpha" => ApiVersion::Alpha,
            "beta" => ApiVersion::Beta,
            other => ApiVersion::Other(other.to_string()),
        }
    }
}

impl From<String> for ApiVersion {
    fn from(s: String) -> Self {
        ApiVersion::from(s.as_str())
    }
}

impl From<ApiVersion> for String {
    fn from(v: ApiVersion) -> Self {
        v.as_str().to_string()
    }
}

impl FromStr for ApiVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ApiVersion::from(s))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a class of throttled operations: `(version, service, operation)`.
///
/// This is the key limiters are registered and looked up under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub version: ApiVersion,
    pub service: String,
    pub operation: String,
}

impl OperationKey {
    pub fn new(
        version: impl Into<ApiVersion>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            service: service.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.version, self.service, self.operation)
    }
}

/// Key supplied by a call site for the call it is about to make.
///
/// `caller_id` (typically the project issuing the call) is carried for
/// context only; it never affects which limiter is selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub caller_id: String,
    pub version: ApiVersion,
    pub service: String,
    pub operation: String,
}

impl RateLimitKey {
    pub fn new(
        version: impl Into<ApiVersion>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            caller_id: String::new(),
            version: version.into(),
            service: service.into(),
            operation: operation.into(),
        }
    }

    /// Set the caller identity.
    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = caller_id.into();
        self
    }

    /// Project down to the fields used for limiter selection.
    pub fn operation_key(&self) -> OperationKey {
        OperationKey {
            version: self.version.clone(),
            service: self.service.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl From<OperationKey> for RateLimitKey {
    fn from(key: OperationKey) -> Self {
        Self {
            caller_id: String::new(),
            version: key.version,
            service: key.service,
            operation: key.operation,
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.caller_id.is_empty() {
            write!(f, "{}.{}.{}", self.version, self.service, self.operation)
        } else {
            write!(
                f,
                "{}/{}.{}.{}",
                self.caller_id, self.version, self.service, self.operation
            )
        }
    }
}
