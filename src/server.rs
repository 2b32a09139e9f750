use std::{io, net::SocketAddr, sync::Arc};

use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::{
    net::{TcpListener, TcpSocket},
    sync::{oneshot, watch},
    task::{JoinHandle, JoinSet},
};

use crate::{
    config::Config,
    http::{request::CapturedRequest, response::CannedResponse},
    service::{Capture, LastRequest, Shared},
    Error, ResponseBody,
};

/// HTTP server that lives as long as the test using it. It listens on a
/// loopback port chosen by the OS, remembers the last request it received
/// and answers every request with the same configured response. The
/// `assert_*` and `check_*` methods inspect what was received.
///
/// The listener runs on Tokio tasks in the background, so the service must
/// be created inside a Tokio runtime:
///
/// ```text
/// +--------+  request   +------------+  send_replace  +--------------+
/// |        | ---------> |            | -------------> | last request | <-- assert_*
/// | client |            |  Capture   |                +--------------+
/// |        | <--------- |            | <------------- |   response   | <-- set_response_*
/// +--------+  response  +------------+     borrow     +--------------+
/// ```
///
/// Dropping the service stops the listener and closes every open connection,
/// regardless of how the test ended. Use [`MockService::close`] to wait
/// until the port is actually released.
pub struct MockService {
    /// Socket address used by this service to listen for incoming
    /// connections.
    address: SocketAddr,

    /// Most recent request. Only the listener tasks write to it.
    last_request: watch::Receiver<LastRequest>,

    /// Response sent for every request.
    response: watch::Sender<CannedResponse>,

    /// Completes the listener's shutdown future when sent or dropped.
    shutdown: Option<oneshot::Sender<()>>,

    /// Listener task. Connection tasks are owned by it, so aborting this one
    /// also aborts them.
    listener: Option<JoinHandle<()>>,
}

impl MockService {
    /// Starts a service with the default [`Config`].
    ///
    /// # Panics
    ///
    /// If the listener can't be bound, which fails the calling test, or when
    /// called outside of a Tokio runtime.
    #[track_caller]
    pub fn new() -> Self {
        match Self::init(Config::default()) {
            Ok(service) => service,
            Err(err) => panic!("{err}"),
        }
    }

    /// Binds the listening socket described by `config` and starts accepting
    /// connections in the background.
    pub fn init(config: Config) -> Result<Self, Error> {
        let bind_address = config.listen;
        let bind_error = move |err: io::Error| Error::Bind(bind_address, err);

        let socket = if config.listen.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;

        #[cfg(not(windows))]
        socket.set_reuseaddr(true).map_err(bind_error)?;

        socket.bind(config.listen).map_err(bind_error)?;

        let listener = socket.listen(config.backlog).map_err(bind_error)?;

        // If the TCP port is 0 then the OS will choose a valid one.
        let address = listener.local_addr().map_err(Error::LocalAddress)?;

        let (last_request_sender, last_request) = watch::channel(None);
        let (response, response_receiver) = watch::channel(CannedResponse::default());
        let (shutdown, shutdown_receiver) = oneshot::channel();

        let shared = Shared {
            last_request: Arc::new(last_request_sender),
            response: response_receiver,
        };

        tracing::info!(%address, "Mock service listening for requests");

        let listener = tokio::task::spawn(listen(listener, shared, shutdown_receiver));

        Ok(Self {
            address,
            last_request,
            response,
            shutdown: Some(shutdown),
            listener: Some(listener),
        })
    }

    /// Address of the listening socket.
    pub fn socket_address(&self) -> SocketAddr {
        self.address
    }

    /// Scheme, host and port, such as `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Absolute URL for `path`, which may include a query string. The leading
    /// slash is optional.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url())
        } else {
            format!("{}/{path}", self.base_url())
        }
    }

    /// Sets the body returned for all subsequent requests.
    pub fn set_response_body(&self, body: impl Into<ResponseBody>) {
        let body = body.into();
        self.response.send_modify(|response| response.set_body(body));
    }

    /// Sets the JSON encoding of `value` as the response body. On error the
    /// previous body is kept.
    pub fn set_response_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        self.set_response_body(ResponseBody::json(value)?);
        Ok(())
    }

    /// Sets the status code returned for all subsequent requests. `0`
    /// restores the default, `200 OK`.
    pub fn set_response_code(&self, code: u16) -> Result<(), Error> {
        let status = match code {
            0 => None,
            code => Some(StatusCode::from_u16(code).map_err(|_| Error::InvalidStatus(code))?),
        };

        self.response.send_modify(|response| response.status = status);

        Ok(())
    }

    /// Typed version of [`MockService::set_response_code`].
    pub fn set_response_status(&self, status: StatusCode) {
        self.response
            .send_modify(|response| response.status = Some(status));
    }

    /// Most recent request received by this service, if any.
    pub fn last_request(&self) -> Option<Arc<CapturedRequest>> {
        self.last_request.borrow().clone()
    }

    /// Waits until at least one request has been received and returns the
    /// most recent one. Useful when the client under test sends its request
    /// from a task the test can't await.
    pub async fn wait_for_request(&self) -> Result<Arc<CapturedRequest>, Error> {
        let mut receiver = self.last_request.clone();

        let request = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Closed)?
            .clone();

        request.ok_or(Error::Closed)
    }

    /// Stops accepting connections, closes the open ones and waits until the
    /// listening socket is released. The last captured request and the
    /// assertions on it remain available. Calling this more than once does
    /// nothing.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(listener) = self.listener.take() {
            if let Err(err) = listener.await {
                tracing::warn!(address = %self.address, "Mock service listener failed: {err}");
            }
        }
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        // Dropping the sender completes the shutdown future as well, but the
        // runtime might never poll the listener again if the test is over.
        drop(self.shutdown.take());

        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Accepts connections until `shutdown` completes, spawning a [`Capture`]
/// service for each of them.
async fn listen(listener: TcpListener, shared: Shared, mut shutdown: oneshot::Receiver<()>) {
    let address = listener.local_addr().ok();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, client_addr) = match accepted {
                    Ok(connection) => connection,
                    Err(err) => {
                        tracing::warn!(?address, "Error while accepting connections: {err}");
                        break;
                    }
                };

                let service = Capture::new(shared.clone(), client_addr);

                connections.spawn(async move {
                    if let Err(err) = hyper::server::conn::http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::warn!(%client_addr, "Failed to serve connection: {err:?}");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {
                // Finished connection, nothing to do.
            }
            _ = &mut shutdown => {
                tracing::debug!(?address, "Mock service received shutdown signal");
                break;
            }
        }
    }

    // Drop the listener to stop accepting new connections, then abort the
    // open ones. Keep-alive connections would otherwise stay open forever.
    drop(listener);
    connections.shutdown().await;

    tracing::info!(?address, "Mock service shutdown complete");
}
