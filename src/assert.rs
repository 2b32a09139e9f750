//! Assertions on the last request received by a [`MockService`].
//!
//! Every check comes in two flavours. `check_*` returns a [`Mismatch`] so the
//! caller decides what to do with it, `assert_*` panics with the mismatch
//! message, which fails the test that called it. Panics are reported at the
//! caller's location.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{CapturedRequest, MockService};

/// Describes why an assertion failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Mismatch {
    #[error("mock service should have been called but wasn't")]
    NotCalled,

    #[error("mock service should not have been called but received {method} {uri}")]
    Called { method: String, uri: String },

    #[error("valid basic authentication expected")]
    MissingBasicAuth,

    #[error("expected basic auth {expected_user:?}:{expected_pass:?}, received {user:?}:{pass:?}")]
    BasicAuth {
        expected_user: String,
        expected_pass: String,
        user: String,
        pass: String,
    },

    #[error("expected path {expected:?}, received {actual:?}")]
    Path { expected: String, actual: String },

    #[error("expected header {name:?} but it was not sent")]
    MissingHeader { name: String },

    #[error("expected header {name:?} to be {expected:?}, received {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("expected query param {name:?} but it was not sent")]
    MissingParam { name: String },

    #[error("expected query param {name:?} to be {expected:?}, received {actual:?}")]
    Param {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("expected body {expected:?}, received {actual:?}")]
    Body { expected: Bytes, actual: Bytes },

    #[error("request body could not be read: {0}")]
    UnreadableBody(String),

    #[error("expected JSON is not valid: {0}")]
    InvalidExpectedJson(String),

    #[error("received body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected JSON {expected}, received {actual}")]
    Json { expected: Value, actual: Value },

    #[error("expected method {expected:?}, received {actual:?}")]
    Method { expected: String, actual: String },

    #[error("received body could not be deserialized as {type_name}: {error}")]
    Deserialize {
        type_name: &'static str,
        error: String,
    },
}

impl CapturedRequest {
    /// Body bytes, or the reason they could not be read.
    fn readable_body(&self) -> Result<&Bytes, Mismatch> {
        match self.body_error() {
            Some(err) => Err(Mismatch::UnreadableBody(String::from(err))),
            None => Ok(self.body()),
        }
    }

    pub fn check_basic_auth(&self, user: &str, pass: &str) -> Result<(), Mismatch> {
        let (received_user, received_pass) =
            self.basic_auth().ok_or(Mismatch::MissingBasicAuth)?;

        if received_user != user || received_pass != pass {
            return Err(Mismatch::BasicAuth {
                expected_user: String::from(user),
                expected_pass: String::from(pass),
                user: received_user,
                pass: received_pass,
            });
        }

        Ok(())
    }

    /// Compares against the percent-decoded path.
    pub fn check_path(&self, path: &str) -> Result<(), Mismatch> {
        let received = self.path();

        if received != path {
            return Err(Mismatch::Path {
                expected: String::from(path),
                actual: received.into_owned(),
            });
        }

        Ok(())
    }

    /// Compares raw header bytes, so values that are not visible ASCII can
    /// still be checked. A missing header reads as an empty value.
    pub fn check_header(&self, name: &str, value: &str) -> Result<(), Mismatch> {
        let Some(received) = self.headers().get(name) else {
            if value.is_empty() {
                return Ok(());
            }

            return Err(Mismatch::MissingHeader {
                name: String::from(name),
            });
        };

        if received.as_bytes() != value.as_bytes() {
            return Err(Mismatch::Header {
                name: String::from(name),
                expected: String::from(value),
                actual: String::from_utf8_lossy(received.as_bytes()).into_owned(),
            });
        }

        Ok(())
    }

    /// A missing query param reads as an empty value.
    pub fn check_param(&self, name: &str, value: &str) -> Result<(), Mismatch> {
        let Some(received) = self.query_param(name) else {
            if value.is_empty() {
                return Ok(());
            }

            return Err(Mismatch::MissingParam {
                name: String::from(name),
            });
        };

        if received != value {
            return Err(Mismatch::Param {
                name: String::from(name),
                expected: String::from(value),
                actual: received,
            });
        }

        Ok(())
    }

    pub fn check_body(&self, body: &[u8]) -> Result<(), Mismatch> {
        let received = self.readable_body()?;

        if received.as_ref() != body {
            return Err(Mismatch::Body {
                expected: Bytes::copy_from_slice(body),
                actual: received.clone(),
            });
        }

        Ok(())
    }

    /// Key order and whitespace don't matter, types and values do.
    pub fn check_json(&self, json: &str) -> Result<(), Mismatch> {
        let expected: Value = serde_json::from_str(json)
            .map_err(|err| Mismatch::InvalidExpectedJson(err.to_string()))?;

        let actual: Value = serde_json::from_slice(self.readable_body()?)
            .map_err(|err| Mismatch::InvalidJson(err.to_string()))?;

        if expected != actual {
            return Err(Mismatch::Json { expected, actual });
        }

        Ok(())
    }

    pub fn check_method(&self, method: &str) -> Result<(), Mismatch> {
        if self.method().as_str() != method {
            return Err(Mismatch::Method {
                expected: String::from(method),
                actual: String::from(self.method().as_str()),
            });
        }

        Ok(())
    }

    /// Deserializes the body as JSON into `T`.
    pub fn check_as<T: DeserializeOwned>(&self) -> Result<T, Mismatch> {
        serde_json::from_slice(self.readable_body()?).map_err(|err| Mismatch::Deserialize {
            type_name: std::any::type_name::<T>(),
            error: err.to_string(),
        })
    }
}

/// Panics with the mismatch message, failing the calling test.
#[track_caller]
fn report<T>(result: Result<T, Mismatch>) -> T {
    match result {
        Ok(value) => value,
        Err(mismatch) => panic!("{mismatch}"),
    }
}

impl MockService {
    /// Last request or [`Mismatch::NotCalled`].
    fn received(&self) -> Result<Arc<CapturedRequest>, Mismatch> {
        self.last_request().ok_or(Mismatch::NotCalled)
    }

    pub fn check_called(&self) -> Result<(), Mismatch> {
        self.received().map(|_| ())
    }

    pub fn check_not_called(&self) -> Result<(), Mismatch> {
        match self.last_request() {
            None => Ok(()),
            Some(request) => Err(Mismatch::Called {
                method: request.method().to_string(),
                uri: request.uri().to_string(),
            }),
        }
    }

    pub fn check_received_basic_auth(&self, user: &str, pass: &str) -> Result<(), Mismatch> {
        self.received()?.check_basic_auth(user, pass)
    }

    pub fn check_received_path(&self, path: &str) -> Result<(), Mismatch> {
        self.received()?.check_path(path)
    }

    pub fn check_received_header(&self, name: &str, value: &str) -> Result<(), Mismatch> {
        self.received()?.check_header(name, value)
    }

    pub fn check_received_param(&self, name: &str, value: &str) -> Result<(), Mismatch> {
        self.received()?.check_param(name, value)
    }

    pub fn check_received_body(&self, body: impl AsRef<[u8]>) -> Result<(), Mismatch> {
        self.received()?.check_body(body.as_ref())
    }

    pub fn check_received_json(&self, json: &str) -> Result<(), Mismatch> {
        self.received()?.check_json(json)
    }

    pub fn check_received_method(&self, method: &str) -> Result<(), Mismatch> {
        self.received()?.check_method(method)
    }

    pub fn check_received_as<T: DeserializeOwned>(&self) -> Result<T, Mismatch> {
        self.received()?.check_as()
    }

    /// Asserts that the service has received a request.
    #[track_caller]
    pub fn assert_called(&self) {
        report(self.check_called())
    }

    /// Asserts that the service has not received any request.
    #[track_caller]
    pub fn assert_not_called(&self) {
        report(self.check_not_called())
    }

    /// Asserts that the last request carried `Basic` credentials matching
    /// `user` and `pass`.
    #[track_caller]
    pub fn assert_received_basic_auth(&self, user: &str, pass: &str) {
        report(self.check_received_basic_auth(user, pass))
    }

    /// Asserts that the percent-decoded path of the last request is exactly
    /// `path`.
    #[track_caller]
    pub fn assert_received_path(&self, path: &str) {
        report(self.check_received_path(path))
    }

    /// Asserts that the first value of header `name` in the last request is
    /// `value`.
    #[track_caller]
    pub fn assert_received_header(&self, name: &str, value: &str) {
        report(self.check_received_header(name, value))
    }

    /// Asserts that the first value of query param `name` in the last
    /// request is `value`.
    #[track_caller]
    pub fn assert_received_param(&self, name: &str, value: &str) {
        report(self.check_received_param(name, value))
    }

    /// Asserts that the body of the last request is exactly `body`.
    #[track_caller]
    pub fn assert_received_body(&self, body: impl AsRef<[u8]>) {
        report(self.check_received_body(body))
    }

    /// Asserts that the body of the last request is JSON equivalent to
    /// `json`.
    #[track_caller]
    pub fn assert_received_json(&self, json: &str) {
        report(self.check_received_json(json))
    }

    /// Asserts that the last request used `method`. Case sensitive.
    #[track_caller]
    pub fn assert_received_method(&self, method: &str) {
        report(self.check_received_method(method))
    }

    /// Asserts that the body of the last request deserializes into `T` and
    /// returns the deserialized value.
    #[track_caller]
    pub fn assert_received_as<T: DeserializeOwned>(&self) -> T {
        report(self.check_received_as())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn capture(request: http::Request<()>, body: &'static [u8]) -> CapturedRequest {
        let (parts, ()) = request.into_parts();
        CapturedRequest::new(
            parts,
            Ok(Bytes::from_static(body)),
            "127.0.0.1:5000".parse().unwrap(),
        )
    }

    fn post(body: &'static [u8]) -> CapturedRequest {
        capture(
            http::Request::builder()
                .method("POST")
                .uri("/pets?limit=10")
                .header("Authorization", "Basic YWxpY2U6czNjcmV0")
                .header("Content-Type", "application/json")
                .body(())
                .unwrap(),
            body,
        )
    }

    #[test]
    fn matching_request() {
        let request = post(br#"{"name":"Rex","age":3}"#);

        assert_eq!(request.check_basic_auth("alice", "s3cret"), Ok(()));
        assert_eq!(request.check_path("/pets"), Ok(()));
        assert_eq!(request.check_header("content-type", "application/json"), Ok(()));
        assert_eq!(request.check_param("limit", "10"), Ok(()));
        assert_eq!(request.check_body(br#"{"name":"Rex","age":3}"#), Ok(()));
        assert_eq!(request.check_json(r#"{ "age": 3, "name": "Rex" }"#), Ok(()));
        assert_eq!(request.check_method("POST"), Ok(()));
    }

    #[test]
    fn basic_auth_mismatch() {
        let request = post(b"");

        assert_eq!(
            request.check_basic_auth("alice", "wrong"),
            Err(Mismatch::BasicAuth {
                expected_user: String::from("alice"),
                expected_pass: String::from("wrong"),
                user: String::from("alice"),
                pass: String::from("s3cret"),
            })
        );

        let anonymous = capture(http::Request::builder().body(()).unwrap(), b"");

        assert_eq!(
            anonymous.check_basic_auth("alice", "s3cret"),
            Err(Mismatch::MissingBasicAuth)
        );
    }

    #[test]
    fn path_is_compared_exactly() {
        let request = post(b"");

        assert!(request.check_path("/pets/").is_err());
        assert!(request.check_path("/pets?limit=10").is_err());
        assert_eq!(
            request.check_path("/PETS").unwrap_err().to_string(),
            r#"expected path "/PETS", received "/pets""#
        );
    }

    #[test]
    fn missing_and_different_headers_and_params() {
        let request = post(b"");

        assert_eq!(
            request.check_header("x-trace", "1"),
            Err(Mismatch::MissingHeader {
                name: String::from("x-trace")
            })
        );
        assert!(matches!(
            request.check_header("content-type", "text/plain"),
            Err(Mismatch::Header { .. })
        ));
        assert_eq!(
            request.check_param("offset", "0"),
            Err(Mismatch::MissingParam {
                name: String::from("offset")
            })
        );
        assert!(matches!(
            request.check_param("limit", "20"),
            Err(Mismatch::Param { .. })
        ));
    }

    #[test]
    fn missing_header_and_param_read_as_empty() {
        let request = post(b"");

        assert_eq!(request.check_header("x-missing", ""), Ok(()));
        assert_eq!(request.check_param("missing", ""), Ok(()));

        // A header that is present must still match.
        assert!(matches!(
            request.check_header("content-type", ""),
            Err(Mismatch::Header { .. })
        ));
    }

    #[test]
    fn encoded_path_is_compared_decoded() {
        let request = capture(
            http::Request::builder().uri("/a%20b").body(()).unwrap(),
            b"",
        );

        assert_eq!(request.check_path("/a b"), Ok(()));
        assert_eq!(
            request.check_path("/a%20b"),
            Err(Mismatch::Path {
                expected: String::from("/a%20b"),
                actual: String::from("/a b"),
            })
        );
    }

    #[test]
    fn method_is_case_sensitive() {
        let request = post(b"");

        assert!(matches!(
            request.check_method("post"),
            Err(Mismatch::Method { .. })
        ));
    }

    #[test]
    fn json_semantics() {
        let request = post(br#"{"a":1,"b":[true,null]}"#);

        assert_eq!(request.check_json(r#"{"b":[true,null],"a":1}"#), Ok(()));

        // Same keys, different types.
        assert!(matches!(
            request.check_json(r#"{"a":"1","b":[true,null]}"#),
            Err(Mismatch::Json { .. })
        ));

        // Array order matters.
        assert!(matches!(
            request.check_json(r#"{"a":1,"b":[null,true]}"#),
            Err(Mismatch::Json { .. })
        ));

        assert!(matches!(
            request.check_json("{not json"),
            Err(Mismatch::InvalidExpectedJson(_))
        ));

        assert!(matches!(
            post(b"plain text").check_json("{}"),
            Err(Mismatch::InvalidJson(_))
        ));
    }

    #[test]
    fn deserialize_body() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Pet {
            name: String,
            age: u8,
        }

        let request = post(br#"{"name":"Rex","age":3}"#);

        assert_eq!(
            request.check_as::<Pet>(),
            Ok(Pet {
                name: String::from("Rex"),
                age: 3
            })
        );

        let request = post(br#"{"name":"Rex","age":"three"}"#);

        assert!(matches!(
            request.check_as::<Pet>(),
            Err(Mismatch::Deserialize { .. })
        ));
    }

    #[test]
    fn body_mismatch_message() {
        let request = post(b"hello");

        assert_eq!(
            request.check_body(b"bye").unwrap_err().to_string(),
            r#"expected body b"bye", received b"hello""#
        );
    }
}
