//! re:collect Server - interaction tracking API
//!
//! HTTP front end for the interaction pipeline plus the queue worker that
//! runs next to it.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod maintenance;
pub mod worker;

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use recollect_core::InteractionPublisher;
use recollect_flags::Features;

pub use auth::{AuthError, AuthUser, Authenticator, StaticTokenAuthenticator};
pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state
pub struct AppState {
    pub publisher: InteractionPublisher,
    pub features: Features,
    pub authenticator: Arc<dyn Authenticator>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        publisher: InteractionPublisher,
        features: Features,
        authenticator: Arc<dyn Authenticator>,
        config: ServerConfig,
    ) -> Self {
        Self {
            publisher,
            features,
            authenticator,
            config,
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let Some(origins) = &config.allow_origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::very_permissive().allow_origin(AllowOrigin::list(origins))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/interaction", post(http::post_interaction))
        // Outermost runs first: maintenance, then auth
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            maintenance::maintenance_middleware,
        ));

    // Stays reachable during maintenance so operators can see the flag
    let status = Router::new()
        .route("/status", get(http::get_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/", get(http::health))
        .merge(api)
        .merge(status)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

/// Start the server, returning once `shutdown` completes
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("re:collect server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
