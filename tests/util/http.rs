//! HTTP client utilities for integration tests.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper::{client::conn::http1::SendRequest, Request};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpStream, task::JoinHandle};

/// Provides an HTTP client that spawns a connection object in the background
/// to manage request transmissions.
pub async fn http_client(stream: TcpStream) -> SendRequest<Full<Bytes>> {
    let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::task::spawn(async move {
        // The mock service may close the connection when a test is over.
        let _ = conn.await;
    });

    sender
}

/// Sends an HTTP request over a new connection to the given address. When
/// the response is completely received including the whole body, its parts
/// are returned.
pub async fn send_http_request(
    to: SocketAddr,
    mut req: Request<Full<Bytes>>,
) -> (http::response::Parts, Bytes) {
    req.headers_mut()
        .entry(header::HOST)
        .or_insert(HeaderValue::from_str(&to.to_string()).unwrap());

    let stream = TcpStream::connect(to).await.unwrap();
    let mut sender = http_client(stream).await;

    let (parts, body) = sender.send_request(req).await.unwrap().into_parts();

    (parts, body.collect().await.unwrap().to_bytes())
}

/// Same as [`send_http_request`] but from another task. This allows the
/// current task to continue execution.
pub fn spawn_client(to: SocketAddr, req: Request<Full<Bytes>>) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        send_http_request(to, req).await;
    })
}

pub mod request {
    //! Quick request factory.

    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::{Method, Request};

    pub fn empty() -> Request<Full<Bytes>> {
        get("/")
    }

    pub fn get(uri: &str) -> Request<Full<Bytes>> {
        with_body(Method::GET, uri, Bytes::new())
    }

    pub fn with_body(method: Method, uri: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body.into()))
            .unwrap()
    }

    pub fn with_header(uri: &str, name: &str, value: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .header(name, value)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }
}
