//! Snapshot of a request received by the mock service. The body is buffered
//! entirely when the request arrives, so it can be inspected any number of
//! times afterwards without touching the connection again.

use std::{borrow::Cow, net::SocketAddr};

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use http::{header, request::Parts, HeaderMap, Method, Uri, Version};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

/// Request received by the mock service from the client under test.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    method: Method,

    uri: Uri,

    version: Version,

    headers: HeaderMap,

    /// Socket of the client that sent this request.
    client_addr: SocketAddr,

    /// Full request body. Empty if reading it failed, in which case
    /// `body_error` describes why.
    body: Bytes,

    body_error: Option<String>,
}

impl CapturedRequest {
    /// Builds a snapshot from the request head and the result of collecting
    /// its body.
    pub(crate) fn new(
        parts: Parts,
        body: Result<Bytes, hyper::Error>,
        client_addr: SocketAddr,
    ) -> Self {
        let (body, body_error) = match body {
            Ok(body) => (body, None),
            Err(err) => (Bytes::new(), Some(err.to_string())),
        };

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            client_addr,
            body,
            body_error,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Percent-decoded path of the request URI, so `/a%20b` reads `/a b`.
    /// Invalid UTF-8 sequences are replaced.
    pub fn path(&self) -> Cow<'_, str> {
        percent_decode_str(self.uri.path()).decode_utf8_lossy()
    }

    /// Path component of the request URI, exactly as sent by the client.
    pub fn raw_path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the header `name`. Header names are case insensitive.
    /// Returns [`None`] if the header is missing or its value is not visible
    /// ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// First value of the query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;

        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Username and password sent with the `Basic` authentication scheme.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        parse_basic_auth(self.header(header::AUTHORIZATION.as_str())?)
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Why the body could not be read, if it couldn't.
    pub fn body_error(&self) -> Option<&str> {
        self.body_error.as_deref()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Parses the value of an `Authorization` header. The scheme name is case
/// insensitive and the password may contain colons, only the first one
/// separates it from the username.
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    const SCHEME: &str = "Basic ";

    if !value.get(..SCHEME.len())?.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let decoded = STANDARD.decode(&value[SCHEME.len()..]).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (user, pass) = credentials.split_once(':')?;

    Some((String::from(user), String::from(pass)))
}
