use std::{future::Future, pin::Pin};

use reqwest::Client;
use serde_json::Value;

use crate::error::AcquireError;
use crate::settings::ApiSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Status code and raw body of one request to the live endpoint.
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, AcquireError>> + Send + 'a>>;

/// Transport seam for the live source.
pub trait LiveFetch: Send + Sync + 'static {
    fn fetch<'a>(&'a self, api_key: &'a str) -> FetchFuture<'a>;
}

/// The real HTTP transport. No timeout beyond the client default is set.
pub struct HttpFetcher {
    client: Client,
    api: ApiSettings,
}

impl HttpFetcher {
    pub fn new(api: ApiSettings) -> Self {
        Self {
            client: Client::new(),
            api,
        }
    }
}

impl LiveFetch for HttpFetcher {
    fn fetch<'a>(&'a self, api_key: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = self.api.endpoint();
            log_debug!("Requesting {url}");

            let response = self
                .client
                .get(&url)
                .header("x-rapidapi-host", self.api.host.as_str())
                .header("x-rapidapi-key", api_key)
                .send()
                .await
                .map_err(|err| AcquireError::Transient(format!("request failed: {err}")))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|err| AcquireError::Transient(format!("failed to read body: {err}")))?;

            Ok(RawResponse { status, body })
        })
    }
}

/// Sort a live response into payload, rejected credential, or transient
/// failure.
pub fn classify_response(response: &RawResponse) -> Result<Value, AcquireError> {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|body| body.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let message = field("message");
    let error = field("error");

    if response.status == 200 && message.is_none() {
        return parsed.ok_or_else(|| AcquireError::Transient("response body is not JSON".into()));
    }

    let auth_failure = matches!(response.status, 401 | 403)
        || error.as_deref().is_some_and(|e| e.contains("API key"))
        || message.as_deref().is_some_and(|m| m.contains("not subscribed"));

    let detail = message
        .or(error)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    if auth_failure {
        log_warn!("Live API rejected the credential: {detail}");
        Err(AcquireError::Auth(detail))
    } else {
        Err(AcquireError::Transient(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn ok_json_body_is_returned() {
        let payload = classify_response(&response(200, r#"{"timestamp": 5}"#)).unwrap();
        assert_eq!(payload["timestamp"], 5);
    }

    #[test]
    fn ok_status_with_non_json_body_is_transient() {
        assert!(matches!(
            classify_response(&response(200, "<html>")),
            Err(AcquireError::Transient(_))
        ));
    }

    #[test]
    fn message_field_marks_a_failure_even_with_ok_status() {
        assert_eq!(
            classify_response(&response(200, r#"{"message": "Too many requests"}"#)),
            Err(AcquireError::Transient("Too many requests".into()))
        );
    }

    #[test]
    fn unsubscribed_and_bad_key_responses_are_auth_errors() {
        assert_eq!(
            classify_response(&response(
                403,
                r#"{"message": "You are not subscribed to this API."}"#
            )),
            Err(AcquireError::Auth("You are not subscribed to this API.".into()))
        );
        assert_eq!(
            classify_response(&response(500, r#"{"error": "Invalid API key"}"#)),
            Err(AcquireError::Auth("Invalid API key".into()))
        );
        assert!(matches!(
            classify_response(&response(401, "")),
            Err(AcquireError::Auth(_))
        ));
    }

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            classify_response(&response(502, "bad gateway")),
            Err(AcquireError::Transient("HTTP 502".into()))
        );
    }
}
