//! The hyper HTTP/1 accept loop.
//!
//! Each connection is served on its own task. On shutdown the listener
//! stops accepting, open connections are asked to finish their current
//! request, and the server waits up to the drain timeout for them.

use std::convert::Infallible;
use std::pin::pin;
use std::sync::Arc;

use hermes_core::Failure;
use hermes_telemetry::metrics;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::service::{ApiService, HttpResponse};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Failure code for a body over the size limit (413).
pub const BODY_TOO_LARGE: &str = "rest_request_too_large";

/// Failure code for a body that could not be read (400).
pub const BODY_READ_ERROR: &str = "rest_body_read_error";

/// Failure code for a body not received in time (408).
pub const REQUEST_TIMEOUT: &str = "rest_request_timeout";

/// Failure code for a response not produced in time (504).
pub const RESPONSE_TIMEOUT: &str = "rest_response_timeout";

/// Serves an [`ApiService`] over TCP.
///
/// # Example
///
/// ```rust,ignore
/// use hermes_dispatch::Dispatcher;
/// use hermes_server::{ApiService, Server, ServerConfig};
///
/// let service = ApiService::builder(Dispatcher::new()).build();
/// let config = ServerConfig::builder().http_addr("127.0.0.1:8080").build();
/// Server::new(config, service).run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    service: ApiService,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(config: ServerConfig, service: ApiService) -> Self {
        Self { config, service }
    }

    /// Listener settings.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The served API.
    #[must_use]
    pub fn service(&self) -> &ApiService {
        &self.service
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| ServerError::invalid_address(self.config.http_addr(), e))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;
        self.serve(listener, shutdown).await
    }

    /// Runs on an already bound listener until `shutdown` triggers.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        if let Some(max) = server.config.max_connections() {
                            if tracker.active_connections() >= max {
                                tracing::warn!(remote = %remote, max, "connection limit reached, refusing");
                                drop(stream);
                                continue;
                            }
                        }
                        let token = tracker.acquire();
                        let server = Arc::clone(&server);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, shutdown).await {
                                tracing::debug!(remote = %remote, error = %e, "connection ended with error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown requested, no longer accepting");
                    break;
                }
            }
        }

        let drain = server.config.shutdown_timeout();
        tracing::info!(
            open = tracker.active_connections(),
            timeout_secs = drain.as_secs(),
            "draining connections"
        );
        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(drain) => tracing::warn!(
                open = tracker.active_connections(),
                "drain timeout reached"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request).await) }
        });

        let mut conn = pin!(http1::Builder::new().serve_connection(TokioIo::new(stream), service));
        let mut stop = pin!(shutdown.recv());
        let mut stopping = false;

        loop {
            tokio::select! {
                result = conn.as_mut() => return result,
                () = &mut stop, if !stopping => {
                    stopping = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }

    async fn handle_request(&self, request: http::Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let method = parts.method.clone();
        let limit = self.config.max_body_bytes();
        let timeout = self.config.request_timeout();

        let body = match tokio::time::timeout(timeout, Limited::new(body, limit).collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return self.reject(
                    &method,
                    Failure::with_status(
                        BODY_TOO_LARGE,
                        format!("The request body exceeds {limit} bytes."),
                        StatusCode::PAYLOAD_TOO_LARGE,
                    ),
                );
            }
            Ok(Err(e)) => {
                return self.reject(
                    &method,
                    Failure::with_status(
                        BODY_READ_ERROR,
                        format!("The request body could not be read: {e}"),
                        StatusCode::BAD_REQUEST,
                    ),
                );
            }
            Err(_) => {
                return self.reject(
                    &method,
                    Failure::with_status(
                        REQUEST_TIMEOUT,
                        "The request body was not received in time.",
                        StatusCode::REQUEST_TIMEOUT,
                    ),
                );
            }
        };

        let request = http::Request::from_parts(parts, body);
        match tokio::time::timeout(timeout, self.service.serve(request)).await {
            Ok(response) => response,
            Err(_) => self.reject(
                &method,
                Failure::with_status(
                    RESPONSE_TIMEOUT,
                    "The response was not produced in time.",
                    StatusCode::GATEWAY_TIMEOUT,
                ),
            ),
        }
    }

    fn reject(&self, method: &Method, failure: Failure) -> HttpResponse {
        let status = failure.status();
        tracing::warn!(
            method = %method,
            status = status.as_u16(),
            error_code = failure.code().unwrap_or_default(),
            "request rejected before dispatch"
        );
        metrics::record_request(metrics::UNMATCHED_ROUTE, method.as_str(), status.as_u16(), std::time::Duration::ZERO);
        self.service.failure_response(method, &failure)
    }
}
