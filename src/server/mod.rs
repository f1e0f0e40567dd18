//! HTTP surface: start, poll and cancel installations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::install::InstallManager;

mod error;
mod handlers;

pub use error::ApiError;

/// Header carrying the authenticated caller id.
pub const USER_HEADER: &str = "x-user-id";
/// Header carrying the caller's device id.
pub const DEVICE_HEADER: &str = "x-device-id";

/// Identity of the caller as reported by the fronting proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Owning user of lists and installations.
    pub user_id: String,
    /// Device the request originates from.
    pub device_id: Option<String>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    manager: Arc<InstallManager>,
    api_token: Option<String>,
}

impl AppState {
    /// State over `manager`; `api_token` enables bearer checks when set.
    #[must_use]
    pub fn new(manager: Arc<InstallManager>, api_token: Option<String>) -> Self {
        let api_token = api_token.filter(|t| !t.trim().is_empty());
        Self {
            inner: Arc::new(StateInner { manager, api_token }),
        }
    }

    fn manager(&self) -> &InstallManager {
        &self.inner.manager
    }

    /// What: Identify the caller of a request.
    ///
    /// Output:
    /// - The caller from `X-User-Id`/`X-Device-Id`.
    ///
    /// # Errors
    /// - `ApiError::Unauthorized` when the user header is missing or blank, or
    ///   a configured token does not match `Authorization: Bearer <token>`.
    fn authorize(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        if let Some(expected) = &self.inner.api_token {
            let presented = headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .and_then(|raw| {
                    raw.strip_prefix("Bearer ")
                        .or_else(|| raw.strip_prefix("bearer "))
                })
                .map(str::trim);
            if presented != Some(expected.as_str()) {
                return Err(ApiError::Unauthorized);
            }
        }
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let user_id = header(USER_HEADER).ok_or(ApiError::Unauthorized)?;
        Ok(Caller {
            user_id,
            device_id: header(DEVICE_HEADER),
        })
    }
}

/// Build the router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/lists/:list_id/install", post(handlers::start_install))
        .route(
            "/api/installations/:id/status",
            get(handlers::installation_status),
        )
        .route(
            "/api/installations/:id/cancel",
            post(handlers::cancel_installation),
        )
        .route("/api/health", get(handlers::health))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// What: Serve the API on `addr` until Ctrl-C.
///
/// # Errors
/// - Bind failures and unrecoverable server errors.
///
/// Details:
/// - Running batches are detached tasks; shutdown does not wait for them.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "installd listening");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server encountered an unrecoverable error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
