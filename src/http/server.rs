//! HTTP server hosting the handler chain.
//!
//! # Responsibilities
//! - Create one Axum Router per endpoint, all dispatching to the same handler
//! - Wire up middleware (tracing, request ID, panic recovery)
//! - Attach the accepting endpoint and client address to every request
//! - Terminate TLS on secure endpoints
//! - Convert handler results into responses
//! - Stop every endpoint on a single shutdown trigger

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::EndpointConfig;
use crate::handler::Handler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::net::{tls, EndPoint, RequestContext};

/// Time in-flight requests on secure endpoints get to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// State injected into the dispatch handler.
#[derive(Clone)]
struct DispatchState {
    endpoint: EndPoint,
    handler: Arc<dyn Handler>,
}

/// Serves one handler chain on every configured endpoint.
pub struct HttpServer {
    endpoints: Vec<EndpointConfig>,
    handler: Arc<dyn Handler>,
    shutdown: Shutdown,
}

impl HttpServer {
    pub fn new(endpoints: Vec<EndpointConfig>, handler: Arc<dyn Handler>) -> Self {
        Self {
            endpoints,
            handler,
            shutdown: Shutdown::new(),
        }
    }

    /// Handle that stops every endpoint when triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Prepare the handler, bind every endpoint, then serve until shutdown.
    pub async fn run(self) -> io::Result<()> {
        self.handler
            .prepare()
            .await
            .map_err(|e| io::Error::other(format!("handler preparation failed: {}", e)))?;

        let mut servers = Vec::with_capacity(self.endpoints.len());
        for config in &self.endpoints {
            let endpoint = config.endpoint();
            let shutdown = self.shutdown.signalled();

            let server = match &config.tls {
                None => {
                    let listener = TcpListener::bind(endpoint.socket_addr()).await?;
                    tokio::spawn(serve(listener, endpoint, self.handler.clone(), shutdown))
                }
                Some(material) => {
                    let rustls =
                        tls::load_tls_config(Path::new(&material.cert_path), Path::new(&material.key_path)).await?;
                    tokio::spawn(serve_secure(endpoint, rustls, self.handler.clone(), shutdown))
                }
            };
            servers.push(server);
        }

        let mut outcome = Ok(());
        for server in servers {
            let result = match server.await {
                Ok(result) => result,
                Err(e) => Err(io::Error::other(e)),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Endpoint server failed");
                self.shutdown.trigger();
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        tracing::info!("HTTP server stopped");
        outcome
    }
}

/// Router dispatching every request on `endpoint` to `handler`.
pub fn router(endpoint: EndPoint, handler: Arc<dyn Handler>) -> Router {
    Router::new()
        .route("/{*path}", any(dispatch))
        .route("/", any(dispatch))
        .with_state(DispatchState { endpoint, handler })
        .layer(CatchPanicLayer::new())
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

/// Serve a plaintext endpoint on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    endpoint: EndPoint,
    handler: Arc<dyn Handler>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    let address = listener.local_addr()?;
    tracing::info!(address = %address, endpoint = %endpoint, "Endpoint listening");

    let app = router(endpoint, handler).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(address = %address, "Endpoint stopped");
    Ok(())
}

/// Serve a secure endpoint, terminating TLS with the given configuration.
pub async fn serve_secure(
    endpoint: EndPoint,
    tls: axum_server::tls_rustls::RustlsConfig,
    handler: Arc<dyn Handler>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    let handle = axum_server::Handle::new();
    let graceful = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        graceful.graceful_shutdown(Some(DRAIN_TIMEOUT));
    });

    tracing::info!(endpoint = %endpoint, "Endpoint listening");

    let app = router(endpoint, handler).into_make_service_with_connect_info::<SocketAddr>();
    axum_server::bind_rustls(endpoint.socket_addr(), tls)
        .handle(handle)
        .serve(app)
        .await?;

    tracing::info!(endpoint = %endpoint, "Endpoint stopped");
    Ok(())
}

async fn dispatch(
    State(state): State<DispatchState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let request_id = request.request_id().unwrap_or("unknown").to_string();
    request
        .extensions_mut()
        .insert(RequestContext::new(state.endpoint, client));

    match state.handler.handle(request).await {
        Ok(Some(response)) => response,
        Ok(None) => response::no_content(),
        Err(e) => {
            tracing::debug!(
                request_id = %request_id,
                status = %e.status_code(),
                error = %e,
                "Request failed"
            );
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::handler::HandlerResult;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use futures_util::future::{self, BoxFuture};
    use tower::ServiceExt;

    enum Outcome {
        Content,
        Nothing,
        Fail,
        Panic,
    }

    struct Fixed(Outcome);

    impl Handler for Fixed {
        fn handle(&self, request: Request<Body>) -> BoxFuture<'_, HandlerResult> {
            let result = match self.0 {
                Outcome::Content => {
                    let ctx = RequestContext::of(&request).copied();
                    let body = ctx
                        .map(|c| format!("{} {}", c.endpoint.port, c.client.ip()))
                        .unwrap_or_default();
                    Ok(Some(Response::new(Body::from(body))))
                }
                Outcome::Nothing => Ok(None),
                Outcome::Fail => Err(ProxyError::ReadTimeout {
                    upstream: "http://backend".to_string(),
                    timeout: Duration::from_secs(1),
                }),
                Outcome::Panic => panic!("handler bug"),
            };
            Box::pin(future::ready(result))
        }
    }

    async fn call(outcome: Outcome) -> Response {
        let endpoint = EndPoint::new("127.0.0.1".parse().unwrap(), 8080, false);
        let client: SocketAddr = "10.1.2.3:40000".parse().unwrap();
        router(endpoint, Arc::new(Fixed(outcome)))
            .layer(MockConnectInfo(client))
            .oneshot(Request::builder().uri("/any/path").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn context_is_attached() {
        let response = call(Outcome::Content).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"8080 10.1.2.3");
    }

    #[tokio::test]
    async fn no_content_maps_to_204() {
        assert_eq!(call(Outcome::Nothing).await.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn errors_map_to_status() {
        assert_eq!(call(Outcome::Fail).await.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn panics_map_to_500() {
        assert_eq!(call(Outcome::Panic).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
