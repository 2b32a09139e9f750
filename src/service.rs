//! The [`hyper`] library is based on services. Each time we accept a
//! connection we have to provide an instance of [`hyper::service::Service`]
//! to handle that connection. This module contains the [`Capture`] struct,
//! which records every request it sees as the "last request" of the mock
//! service and answers with whatever response is currently configured. There
//! is no routing, all methods and paths get the same treatment.

use std::{convert::Infallible, future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use http_body_util::BodyExt;
use hyper::{body::Incoming, service::Service, Request};
use tokio::sync::watch;

use crate::http::{
    request::CapturedRequest,
    response::{BoxBodyResponse, CannedResponse},
};

/// Single-slot holder for the most recent request. Sending replaces the
/// previous value, so only one request is ever retained.
pub(crate) type LastRequest = Option<Arc<CapturedRequest>>;

/// Channels shared by every connection of a mock service.
#[derive(Clone)]
pub(crate) struct Shared {
    /// Written by connection tasks, read by assertions.
    pub last_request: Arc<watch::Sender<LastRequest>>,

    /// Written by the response setters, read by connection tasks.
    pub response: watch::Receiver<CannedResponse>,
}

/// Implements [`Service`] and handles incoming requests for one connection.
pub(crate) struct Capture {
    shared: Shared,

    /// Socket address of the connected client.
    client_addr: SocketAddr,
}

impl Capture {
    /// Creates a new [`Capture`] service.
    pub fn new(shared: Shared, client_addr: SocketAddr) -> Self {
        Self {
            shared,
            client_addr,
        }
    }
}

impl Service<Request<Incoming>> for Capture {
    type Response = BoxBodyResponse;

    type Error = Infallible;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let Shared {
            last_request,
            response,
        } = self.shared.clone();

        let client_addr = self.client_addr;

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let body = body.collect().await.map(|collected| collected.to_bytes());

            if let Err(ref err) = body {
                tracing::warn!(%client_addr, "Failed to read request body: {err}");
            }

            let captured = CapturedRequest::new(parts, body, client_addr);

            tracing::debug!(
                %client_addr,
                method = %captured.method(),
                uri = %captured.uri(),
                body_len = captured.body().len(),
                "Captured request"
            );

            // The snapshot must be stored before the response is returned,
            // clients assert right after their call completes.
            last_request.send_replace(Some(Arc::new(captured)));

            let canned = response.borrow().clone();

            Ok(canned.to_response())
        })
    }
}
