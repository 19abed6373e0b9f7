//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all gateway handler
//! - Wire up middleware (tracing, timeout, request ID, claims injection)
//! - Build the protocol dispatcher from configuration
//! - Serve until the shutdown signal, then drain

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    middleware,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{inject_claims, ClaimsInjector};
use crate::config::GatewayConfig;
use crate::fastcgi::{EnvSettings, FastCgiForwarder};
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response::{bad_gateway, text_error};
use crate::http::websocket::{is_websocket, WebSocketTunnel};
use crate::observability::metrics;
use crate::proxy::HttpForwarder;
use crate::routing::{host::service_for, Dispatcher};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub tunnel: WebSocketTunnel,
}

/// The gateway's HTTP front end.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    /// Build the server. `claims` enables token authentication.
    pub fn new(config: GatewayConfig, claims: Option<ClaimsInjector>) -> Self {
        let dispatcher = Arc::new(Self::build_dispatcher(&config));
        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            tunnel: WebSocketTunnel::new(
                config.backends.http_port,
                config.backends.connect_timeout(),
            ),
        };

        let router = Self::build_router(&config, state, claims.map(Arc::new));
        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Gateway protocol first, plain HTTP second.
    fn build_dispatcher(config: &GatewayConfig) -> Dispatcher {
        let backends = &config.backends;
        let connect_timeout = backends.connect_timeout();
        let env = EnvSettings {
            server_addr: backends.server_addr.clone(),
            document_root: backends.document_root.clone(),
        };

        Dispatcher::new(connect_timeout)
            .register(
                backends.gateway_port,
                Arc::new(FastCgiForwarder::new(backends.gateway_port, connect_timeout, env)),
            )
            .register(
                backends.http_port,
                Arc::new(HttpForwarder::new(backends.http_port, connect_timeout)),
            )
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        claims: Option<Arc<ClaimsInjector>>,
    ) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        if let Some(injector) = claims {
            tracing::info!(cookie = %injector.cookie_name(), "Token authentication enabled");
            router = router.layer(middleware::from_fn_with_state(injector, inject_claims));
        }

        router
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuidV4))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            gateway_port = self.config.backends.gateway_port,
            http_port = self.config.backends.http_port,
            "Gateway listening"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Resolve the service, then tunnel or dispatch.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();

    let Some(service) = service_for(&request) else {
        tracing::warn!(uri = %request.uri(), "Request without a host");
        metrics::record_request("none", StatusCode::BAD_REQUEST.as_u16(), start);
        return text_error(StatusCode::BAD_REQUEST, "Missing Host header.");
    };

    if is_websocket(request.headers()) {
        let response = state.tunnel.handle(&service, request).await;
        metrics::record_request("websocket", response.status().as_u16(), start);
        return response;
    }

    let forwarder = match state.dispatcher.route(&service).await {
        Ok(forwarder) => forwarder,
        Err(e) => {
            tracing::warn!(service = %service, error = %e, "No backend answered");
            metrics::record_request("none", StatusCode::BAD_GATEWAY.as_u16(), start);
            return bad_gateway(&e.to_string());
        }
    };

    tracing::debug!(
        service = %service,
        protocol = forwarder.protocol(),
        method = %request.method(),
        path = %request.uri().path(),
        "Forwarding request"
    );

    let response = forwarder.forward(&service, request).await;
    metrics::record_request(forwarder.protocol(), response.status().as_u16(), start);
    response
}
