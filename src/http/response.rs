//! Response the mock service sends back for every request.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{
    header::{self, HeaderValue},
    Response, StatusCode,
};
use serde::Serialize;

use crate::{http::body, Error};

/// Type alias for responses produced by the capture service.
pub(crate) type BoxBodyResponse = Response<BoxBody<Bytes, hyper::Error>>;

/// Body the mock service should respond with. Raw bytes and text are sent
/// verbatim, structured values are encoded as JSON once, when the body is
/// built, so encoding errors show up at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Bytes(Bytes),
    Text(String),
    Json(Bytes),
}

impl ResponseBody {
    /// Serializes `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// `Content-Type` announced for this body. Raw bytes carry none.
    pub fn content_type(&self) -> Option<HeaderValue> {
        match self {
            Self::Bytes(_) => None,
            Self::Text(_) => Some(HeaderValue::from_static("text/plain; charset=utf-8")),
            Self::Json(_) => Some(HeaderValue::from_static("application/json")),
        }
    }

    /// Wire representation of this body.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(bytes) | Self::Json(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ResponseBody {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<&[u8; N]> for ResponseBody {
    fn from(bytes: &[u8; N]) -> Self {
        Self::from(bytes.as_slice())
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        Self::Text(String::from(text))
    }
}

/// Status, body and content type currently configured on the mock service.
#[derive(Debug, Clone, Default)]
pub(crate) struct CannedResponse {
    /// [`None`] leaves the status to the default, `200 OK`.
    pub status: Option<StatusCode>,

    pub body: Bytes,

    /// Sent only together with a non-empty body.
    pub content_type: Option<HeaderValue>,
}

impl CannedResponse {
    /// Replaces the body and its content type.
    pub fn set_body(&mut self, body: ResponseBody) {
        self.content_type = body.content_type();
        self.body = body.into_bytes();
    }

    /// Builds the HTTP response sent to the client.
    pub fn to_response(&self) -> BoxBodyResponse {
        let body = if self.body.is_empty() {
            body::empty()
        } else {
            body::full(self.body.clone())
        };

        let mut response = Response::new(body);

        if let Some(status) = self.status {
            *response.status_mut() = status;
        }

        if let (Some(content_type), false) = (&self.content_type, self.body.is_empty()) {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type.clone());
        }

        response
    }
}
