//! HTTP API for tastemark.
//!
//! Routes:
//! - `/api/restaurants` and `/api/stores`: venue CRUD plus `/{id}/addReview`
//! - `/api/reviews/{id}`: read, update and delete a single review
//! - `/api/auth/sign-up`, `/api/auth/sign-in`, `/api/auth/me`
//!
//! Handlers validate their input, run their storage calls on the blocking pool
//! under the shared storage lock, and return JSON. Failures propagate as [`Error`],
//! whose `IntoResponse` impl formats the JSON error body.

mod extract;
mod reviews;
mod users;
mod venues;


use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::TokenIssuer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::VenueKind;
use crate::storage::Storage;

pub use extract::{ApiJson, AuthUser, MaybeAuthUser};

/// Shared server state injected into all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database, one connection behind an async lock.
    pub storage: Arc<Mutex<Storage>>,
    /// Issues and verifies bearer tokens.
    pub tokens: Arc<TokenIssuer>,
    /// User allowed to modify any venue.
    pub admin_username: Arc<str>,
}

impl AppState {
    /// Bundle the storage and token issuer into handler state.
    #[must_use]
    pub fn new(storage: Storage, tokens: TokenIssuer, admin_username: impl Into<Arc<str>>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            tokens: Arc::new(tokens),
            admin_username: admin_username.into(),
        }
    }

    /// Run `f` against the storage on the blocking pool while holding the lock.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an internal error if the task panics.
    pub async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage).lock_owned().await;
        blocking(move || f(&storage)).await?
    }

    /// Whether `username` names the configured admin, ignoring ASCII case.
    #[must_use]
    pub fn is_admin_name(&self, username: &str) -> bool {
        username.eq_ignore_ascii_case(&self.admin_username)
    }
}

/// Run blocking work (SQLite, Argon2) off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("blocking task failed: {e}")))
}

/// Build the `/api` router with state applied.
pub fn router(state: AppState) -> Router {
    let mut api = Router::new();
    for kind in VenueKind::ALL {
        api = api.nest(&format!("/{}", kind.collection()), venues::routes(kind));
    }
    let api = api
        .nest("/reviews", reviews::routes())
        .nest("/auth", users::routes())
        .method_not_allowed_fallback(|| async {
            Error::client(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        })
        .fallback(|| async { Error::client(StatusCode::NOT_FOUND, "not found") });

    Router::new().nest("/api", api).with_state(state)
}

/// Build the full application: API routes, optional static client, CORS and
/// request tracing.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = router(state);
    if let Some(dir) = static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    app.layer(TraceLayer::new_for_http()).layer(cors)
}

/// Open storage, bind the configured address and serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the token secret is missing, storage cannot be opened,
/// or the listener cannot bind.
pub async fn serve(config: &Config) -> Result<()> {
    let tokens = TokenIssuer::new(config.token_secret()?, config.token_ttl());
    let addr = config.bind_addr()?;

    info!("Initializing storage...");
    let storage = Storage::open(config.database_path())?;
    let state = AppState::new(storage, tokens, config.auth.admin_username.as_str());

    let app = app(state, config.server.static_dir.as_deref());

    info!("Binding to {addr}");
    let listener = TcpListener::bind(addr).await?;
    info!("Server running on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
