//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the health check and the inventory fallback
//! - Wire up middleware (request ID, tracing, timeout)
//! - Dispatch requests to the routing engine and then to views
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ConsoleConfig;
use crate::http::request::{decode_path, request_id, strip_mount};
use crate::http::response::not_found;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::routing::{Router as RouteTable, RoutingError};
use crate::views::{HandlerRegistry, ViewRequest};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub views: Arc<HandlerRegistry>,
    pub mount_path: Arc<str>,
}

/// HTTP server for the inventory console.
pub struct HttpServer {
    router: Router,
    config: ConsoleConfig,
}

impl HttpServer {
    /// Create a server with the placeholder views.
    pub fn new(config: ConsoleConfig) -> Result<Self, RoutingError> {
        Self::with_views(config, HandlerRegistry::default())
    }

    /// Create a server dispatching to `views`.
    pub fn with_views(config: ConsoleConfig, views: HandlerRegistry) -> Result<Self, RoutingError> {
        let state = AppState {
            routes: Arc::new(RouteTable::inventory()?),
            views: Arc::new(views),
            mount_path: Arc::from(config.http.mount_path.as_str()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ConsoleConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health))
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The Axum router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.config.http.mount_path,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Resolve the path through the route table and hand it to the view.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let raw_path = request.uri().path();

    let Some(path) = strip_mount(&state.mount_path, raw_path).and_then(decode_path) else {
        tracing::debug!(request_id = %request_id, path = %raw_path, "Outside the mount path");
        metrics::record_request(method.as_str(), 404, metrics::NO_ROUTE, start_time);
        return not_found(raw_path);
    };

    let matched = match state.routes.resolve(&path) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(request_id = %request_id, path = %path, "No route matched");
            metrics::record_request(method.as_str(), 404, metrics::NO_ROUTE, start_time);
            return e.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        route = %matched.route.name,
        view = %matched.route.view,
        "Dispatching request"
    );

    let view_request = ViewRequest {
        view: matched.route.view,
        route_name: &matched.route.name,
        captures: &matched.captures,
        method: &method,
        request_id: &request_id,
        router: &state.routes,
        mount_path: &state.mount_path,
    };
    let response = match state.views.dispatch(&view_request) {
        Ok(response) => response,
        Err(e) => {
            tracing::info!(
                request_id = %request_id,
                route = %matched.route.name,
                error = %e,
                "View rejected request"
            );
            e.into_response()
        }
    };

    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        &matched.route.name,
        start_time,
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn app(mount: &str) -> Router {
        let mut config = ConsoleConfig::default();
        config.http.mount_path = mount.to_string();
        HttpServer::new(config).unwrap().router()
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_dispatch_under_mount() {
        assert_eq!(status(app("/inventory"), "/inventory/").await, StatusCode::OK);
        assert_eq!(status(app("/inventory"), "/inventory/groups/").await, StatusCode::OK);
        assert_eq!(status(app("/inventory"), "/groups/").await, StatusCode::NOT_FOUND);
        assert_eq!(status(app(""), "/groups/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_found_and_bad_request() {
        assert_eq!(status(app(""), "/business_units/abc/update/").await, StatusCode::NOT_FOUND);
        assert_eq!(
            status(app(""), "/business_units/99999999999999999999999/update/").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_allow_header_follows_view() {
        let request = Request::builder()
            .method("POST")
            .uri("/probes/")
            .body(Body::empty())
            .unwrap();
        let response = app("").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_percent_encoded_probe_key() {
        assert_eq!(status(app(""), "/probes/some%20probe%20name/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app("/inventory").oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
