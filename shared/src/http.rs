//! HTTP helpers for Lambda functions.
//!
//! All responses carry permissive CORS headers; the browser frontend is
//! served from a different origin than the API.

use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// CORS headers applied to every response.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

/// Error body shape: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn builder(status: u16) -> lambda_http::http::response::Builder {
    let mut builder = Response::builder().status(status);
    for (name, value) in CORS_HEADERS {
        builder = builder.header(name, value);
    }
    builder
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>> {
    Ok(builder(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .expect("Failed to build response"))
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>> {
    json_response(
        status,
        &ErrorBody {
            error: message.into(),
        },
    )
}

/// Map a domain error to its HTTP response.
pub fn failure_response(err: &Error) -> Result<Response<Body>> {
    error_response(err.status_code(), err.to_string())
}

/// Empty 204 response for CORS preflight requests.
pub fn preflight_response() -> Result<Response<Body>> {
    Ok(builder(204)
        .body(Body::Empty)
        .expect("Failed to build response"))
}

/// Parse a request body as JSON, mapping failures to a 400-level error.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<T> {
    serde_json::from_slice(body.as_ref())
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))
}

/// Parse a numeric id from a path segment.
pub fn parse_id(segment: &str) -> Result<i64> {
    segment
        .parse()
        .map_err(|_| Error::Validation(format!("Invalid id: {}", segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "full_name and category are required".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"full_name and category are required"}"#
        );
    }

    #[test]
    fn test_responses_carry_cors() {
        let response = error_response(400, "bad").unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );

        let preflight = preflight_response().unwrap();
        assert_eq!(preflight.status(), 204);
        assert_eq!(
            preflight
                .headers()
                .get("Access-Control-Allow-Methods")
                .unwrap(),
            "GET, POST, PUT, DELETE, OPTIONS"
        );
    }

    #[test]
    fn test_failure_response_maps_status() {
        let err = Error::NotFound("meeting 9".to_string());
        let response = failure_response(&err).unwrap();
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_parse_json_body_rejects_garbage() {
        let body = Body::from("{not json");
        let err = parse_json_body::<serde_json::Value>(&body).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id("abc").unwrap_err().status_code(), 400);
    }
}
