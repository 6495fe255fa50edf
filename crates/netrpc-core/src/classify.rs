//! Failure classification: raw gateway outcome → retry decision.
//!
//! | outcome                              | class                 | retried |
//! |--------------------------------------|-----------------------|---------|
//! | HTTP 405                             | `MethodNotFound`      | no      |
//! | HTTP 429                             | `RateLimited`         | no      |
//! | HTTP 503                             | `ServiceUnavailable`  | yes     |
//! | HTTP 504                             | `GatewayTimeout`      | yes     |
//! | timeout                              | `TransportTimeout`    | yes     |
//! | connection reset                     | `ConnectionReset`     | yes     |
//! | 2xx, body not a JSON-RPC envelope    | `NonJsonBody`         | yes     |
//! | anything else                        | `Unclassified`        | no      |

use crate::request::JsonRpcResponse;
use crate::transport::{GatewayOutcome, TransportFailure};

/// Category of a failed attempt. Computed per attempt, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    MethodNotFound,
    RateLimited,
    ServiceUnavailable,
    GatewayTimeout,
    TransportTimeout,
    ConnectionReset,
    NonJsonBody,
    Unclassified,
}

impl FailureClass {
    /// Transient failures are absorbed by the retry stage.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable
                | Self::GatewayTimeout
                | Self::TransportTimeout
                | Self::ConnectionReset
                | Self::NonJsonBody
        )
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MethodNotFound => "method not found",
            Self::RateLimited => "rate limited",
            Self::ServiceUnavailable => "service unavailable (503)",
            Self::GatewayTimeout => "gateway timeout (504)",
            Self::TransportTimeout => "transport timeout",
            Self::ConnectionReset => "connection reset",
            Self::NonJsonBody => "non-JSON body",
            Self::Unclassified => "unclassified",
        };
        f.write_str(s)
    }
}

/// A failed attempt together with a human-readable detail for logs and
/// unclassified errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub class: FailureClass,
    pub detail: String,
}

/// Classify one gateway outcome.
///
/// Returns the parsed envelope for a 2xx response carrying a well-formed
/// JSON-RPC body, otherwise the failure category.
pub fn classify(outcome: GatewayOutcome) -> Result<JsonRpcResponse, Failure> {
    match outcome {
        GatewayOutcome::TransportError(kind) => {
            let class = match kind {
                TransportFailure::Timeout => FailureClass::TransportTimeout,
                TransportFailure::ConnectionReset => FailureClass::ConnectionReset,
                TransportFailure::Other(_) => FailureClass::Unclassified,
            };
            Err(Failure {
                class,
                detail: kind.to_string(),
            })
        }
        GatewayOutcome::HttpResponse { status, body } => {
            let class = match status {
                200..=299 => return parse_envelope(body),
                405 => FailureClass::MethodNotFound,
                429 => FailureClass::RateLimited,
                503 => FailureClass::ServiceUnavailable,
                504 => FailureClass::GatewayTimeout,
                _ => FailureClass::Unclassified,
            };
            Err(Failure {
                class,
                detail: format!("HTTP {status}: {}", body.trim()),
            })
        }
    }
}

fn parse_envelope(body: String) -> Result<JsonRpcResponse, Failure> {
    match serde_json::from_str::<JsonRpcResponse>(&body) {
        Ok(resp) if resp.is_well_formed() => Ok(resp),
        Ok(_) => Err(Failure {
            class: FailureClass::NonJsonBody,
            detail: "envelope has neither result nor error".into(),
        }),
        Err(e) => Err(Failure {
            class: FailureClass::NonJsonBody,
            detail: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(outcome: GatewayOutcome) -> FailureClass {
        classify(outcome).unwrap_err().class
    }

    #[test]
    fn status_codes() {
        assert_eq!(class_of(GatewayOutcome::status(405, "")), FailureClass::MethodNotFound);
        assert_eq!(class_of(GatewayOutcome::status(429, "")), FailureClass::RateLimited);
        assert_eq!(class_of(GatewayOutcome::status(503, "")), FailureClass::ServiceUnavailable);
        assert_eq!(class_of(GatewayOutcome::status(504, "")), FailureClass::GatewayTimeout);
        assert_eq!(class_of(GatewayOutcome::status(500, "boom")), FailureClass::Unclassified);
    }

    #[test]
    fn transport_failures() {
        assert_eq!(
            class_of(GatewayOutcome::TransportError(TransportFailure::Timeout)),
            FailureClass::TransportTimeout
        );
        assert_eq!(
            class_of(GatewayOutcome::TransportError(TransportFailure::ConnectionReset)),
            FailureClass::ConnectionReset
        );
        assert_eq!(
            class_of(GatewayOutcome::TransportError(TransportFailure::Other("dns".into()))),
            FailureClass::Unclassified
        );
    }

    #[test]
    fn ok_status_with_garbage_body_is_non_json() {
        assert_eq!(class_of(GatewayOutcome::ok("<html>")), FailureClass::NonJsonBody);
        assert_eq!(class_of(GatewayOutcome::ok("Not Found")), FailureClass::NonJsonBody);
        assert_eq!(
            class_of(GatewayOutcome::ok(r#"{"jsonrpc":"2.0","id":1}"#)),
            FailureClass::NonJsonBody
        );
    }

    #[test]
    fn ok_status_with_envelope_parses() {
        let resp = classify(GatewayOutcome::ok(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#))
            .unwrap();
        assert_eq!(resp.result, Some(serde_json::json!("0x10")));
    }

    #[test]
    fn error_envelope_is_a_successful_round_trip() {
        let resp = classify(GatewayOutcome::ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        ))
        .unwrap();
        assert_eq!(resp.error.unwrap().code, -32000);
    }

    #[test]
    fn retryable_set() {
        assert!(FailureClass::ServiceUnavailable.is_retryable());
        assert!(FailureClass::NonJsonBody.is_retryable());
        assert!(!FailureClass::MethodNotFound.is_retryable());
        assert!(!FailureClass::RateLimited.is_retryable());
        assert!(!FailureClass::Unclassified.is_retryable());
    }
}
