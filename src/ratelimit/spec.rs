//! Rate limiter specification parsing.
//!
//! A specification is a single string of the form
//! `[version].[service].[operation],[type],[param1],[param2],...`, for example
//! `ga.Addresses.Get,qps,1.5,5`. The only supported type is `qps`, which takes
//! a rate in tokens per second and a burst size.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::bucket::{Throttle, TokenBucket};
use super::key::OperationKey;
use crate::error::SpecError;

/// Type tag of the token bucket limiter.
pub const QPS: &str = "qps";

/// How the limiter for a key is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimiterKind {
    /// Token bucket refilling at `qps` tokens per second, holding at most `burst`.
    ///
    /// `burst` is not validated; values below 1 produce a bucket that never
    /// hands out tokens.
    Qps { qps: f32, burst: i64 },
}

impl LimiterKind {
    /// Parse `[type],[param1],...`.
    fn parse(params: &[&str]) -> Result<Self, SpecError> {
        let (kind, args) = match params.split_first() {
            Some(split) => split,
            None => {
                return Err(SpecError::UnsupportedType {
                    kind: String::new(),
                })
            }
        };

        match *kind {
            QPS => {
                if args.len() != 2 {
                    return Err(SpecError::InvalidArgCount {
                        kind: kind.to_string(),
                        expected: 2,
                        got: args.len(),
                    });
                }

                let qps = args[0]
                    .parse::<f32>()
                    .ok()
                    .filter(|qps| qps.is_finite() && *qps > 0.0)
                    .ok_or_else(|| SpecError::InvalidRate {
                        kind: kind.to_string(),
                        value: args[0].to_string(),
                    })?;

                let burst = args[1]
                    .parse::<i64>()
                    .map_err(|_| SpecError::InvalidBurst {
                        kind: kind.to_string(),
                        value: args[1].to_string(),
                    })?;

                Ok(LimiterKind::Qps { qps, burst })
            }
            other => Err(SpecError::UnsupportedType {
                kind: other.to_string(),
            }),
        }
    }

    /// Build a fresh limiter for this directive.
    pub fn build(&self) -> Arc<dyn Throttle> {
        match *self {
            LimiterKind::Qps { qps, burst } => Arc::new(TokenBucket::new(qps, burst)),
        }
    }
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterKind::Qps { qps, burst } => write!(f, "{},{},{}", QPS, qps, burst),
        }
    }
}

/// A parsed rate limiter specification.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterSpec {
    pub key: OperationKey,
    pub kind: LimiterKind,
}

impl LimiterSpec {
    /// Parse a specification string.
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let params: Vec<&str> = spec.split(',').collect();
        if params.len() < 2 {
            return Err(SpecError::MissingFields {
                spec: spec.to_string(),
            });
        }

        let key = parse_key(params[0])?;
        let kind = LimiterKind::parse(&params[1..])?;

        Ok(Self { key, kind })
    }
}

impl FromStr for LimiterSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LimiterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.key, self.kind)
    }
}

/// Parse `[version].[service].[operation]`. The fields themselves are not validated.
fn parse_key(param: &str) -> Result<OperationKey, SpecError> {
    let fields: Vec<&str> = param.split('.').collect();
    match fields.as_slice() {
        [version, service, operation] => Ok(OperationKey::new(*version, *service, *operation)),
        _ => Err(SpecError::InvalidKey {
            key: param.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::key::ApiVersion;

    #[test]
    fn test_parse_valid_spec() {
        let spec = LimiterSpec::parse("ga.Addresses.Get,qps,1.5,5").unwrap();
        assert_eq!(spec.key, OperationKey::new("ga", "Addresses", "Get"));
        assert_eq!(spec.kind, LimiterKind::Qps { qps: 1.5, burst: 5 });
    }

    #[test]
    fn test_parse_valid_specs() {
        for spec in [
            "ga.Addresses.Get,qps,1.5,5",
            "ga.Addresses.List,qps,2,10",
            "ga.Firewalls.Get,qps,1.5,5",
            "ga.Operations.Get,qps,10,100",
        ] {
            assert!(spec.parse::<LimiterSpec>().is_ok(), "expected {spec} to parse");
        }
    }

    #[test]
    fn test_unknown_version_is_accepted() {
        let spec = LimiterSpec::parse("v1.Addresses.Get,qps,1,1").unwrap();
        assert_eq!(spec.key.version, ApiVersion::Other("v1".to_string()));
    }

    #[test]
    fn test_parse_invalid_specs() {
        for spec in [
            "gaAddresses.Get,qps,1.5,5",
            "gaAddresses.Get,qps,0,5",
            "gaAddresses.Get,qps,-1,5",
            "ga.Addresses.Get,qps,1.5.5",
            "gaAddresses.Get,qps,1.5,5.5",
            "gaAddressesGet,qps,1.5,5.5",
            "gaAddressesGet,qps,1.5",
            "ga.Addresses.Get,foo,1.5,5",
            "ga.Addresses.Get,1.5,5",
            "ga.Addresses.Get.Extra,qps,1,1",
            "ga.Addresses.Get",
        ] {
            assert!(spec.parse::<LimiterSpec>().is_err(), "expected {spec} to fail");
        }
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            LimiterSpec::parse("ga.Addresses.Get"),
            Err(SpecError::MissingFields {
                spec: "ga.Addresses.Get".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_key() {
        assert_eq!(
            LimiterSpec::parse("gaAddresses.Get,qps,1.5,5"),
            Err(SpecError::InvalidKey {
                key: "gaAddresses.Get".to_string()
            })
        );
    }

    #[test]
    fn test_unsupported_type() {
        assert_eq!(
            LimiterSpec::parse("ga.Addresses.Get,1.5,5"),
            Err(SpecError::UnsupportedType {
                kind: "1.5".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_arg_count() {
        assert_eq!(
            LimiterSpec::parse("ga.Addresses.Get,qps,1.5.5"),
            Err(SpecError::InvalidArgCount {
                kind: "qps".to_string(),
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_invalid_rate() {
        for rate in ["0", "-1", "abc", "NaN", "inf", "1e40"] {
            let spec = format!("ga.Addresses.Get,qps,{rate},5");
            assert_eq!(
                LimiterSpec::parse(&spec),
                Err(SpecError::InvalidRate {
                    kind: "qps".to_string(),
                    value: rate.to_string()
                }),
                "rate {rate}"
            );
        }
    }

    #[test]
    fn test_invalid_burst() {
        assert_eq!(
            LimiterSpec::parse("ga.Addresses.Get,qps,1.5,5.5"),
            Err(SpecError::InvalidBurst {
                kind: "qps".to_string(),
                value: "5.5".to_string()
            })
        );
    }

    #[test]
    fn test_non_positive_burst_is_passed_through() {
        let spec = LimiterSpec::parse("ga.Addresses.Get,qps,1,0").unwrap();
        assert_eq!(spec.kind, LimiterKind::Qps { qps: 1.0, burst: 0 });

        let spec = LimiterSpec::parse("ga.Addresses.Get,qps,1,-4").unwrap();
        assert_eq!(spec.kind, LimiterKind::Qps { qps: 1.0, burst: -4 });
        assert_eq!(spec.kind.build().burst(), -4);
    }

    #[test]
    fn test_display_is_canonical() {
        let spec = LimiterSpec::parse("ga.Operations.Get,qps,10,100").unwrap();
        assert_eq!(spec.to_string(), "ga.Operations.Get,qps,10,100");

        let spec = LimiterSpec::parse("beta.Addresses.Get,qps,1.5,5").unwrap();
        assert_eq!(spec.to_string(), "beta.Addresses.Get,qps,1.5,5");
    }

    #[test]
    fn test_build_uses_parameters() {
        let spec = LimiterSpec::parse("ga.Addresses.Get,qps,3,10").unwrap();
        let limiter = spec.kind.build();
        assert_eq!(limiter.qps(), 3.0);
        assert_eq!(limiter.burst(), 10);
    }
}
