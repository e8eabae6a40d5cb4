/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tempo_api::{app::AppState, config::Config};
/// use tempo_scheduler::{Broadcaster, NotificationScheduler};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let broadcaster = Arc::new(Broadcaster::new());
/// let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
/// let state = AppState::new(pool, config, scheduler, broadcaster);
/// let app = tempo_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tempo_scheduler::{Broadcaster, NotificationScheduler};
use tempo_shared::auth::{
    jwt,
    middleware::{AuthContext, AuthError},
};
use tempo_shared::models::user::User;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Reminder scheduler, invoked on task create/update/delete
    pub scheduler: Arc<NotificationScheduler>,

    /// Delivery channel the SSE endpoint registers viewers with
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        db: PgPool,
        config: Config,
        scheduler: Arc<NotificationScheduler>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            scheduler,
            broadcaster,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// ├── /webhook                       # Billing webhook (signature-verified raw body)
/// └── /api/
///     ├── /auth/
///     │   ├── POST  /register        # public, optionally code-gated
///     │   ├── POST  /login           # public
///     │   ├── GET   /me              # bearer token
///     │   └── PATCH /me              # bearer token, allow-listed fields
///     ├── /tasks                     # bearer token, CRUD + scheduler hook
///     ├── /notifications             # bearer token, CRUD
///     ├── /notifications/stream      # public SSE (EventSource cannot set headers)
///     └── /push-subscriptions        # bearer token, pass-through store
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes that require no credential
    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    // Auth routes behind the bearer token
    let private_auth_routes = Router::new()
        .route("/me", get(routes::auth::me).patch(routes::auth::update_me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Task CRUD (bearer token); create/update/delete invoke the scheduler
    let task_routes = Router::new()
        .route(
            "/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            put(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // The SSE stream is public: browser EventSource connections cannot carry
    // an Authorization header.
    let stream_routes = Router::new().route(
        "/notifications/stream",
        get(routes::notifications::stream_notifications),
    );

    // Persisted notification records (bearer token)
    let notification_routes = Router::new()
        .route(
            "/notifications",
            post(routes::notifications::create_notification)
                .get(routes::notifications::list_notifications),
        )
        .route(
            "/notifications/:id",
            get(routes::notifications::get_notification)
                .patch(routes::notifications::update_notification)
                .delete(routes::notifications::delete_notification),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Push subscription pass-through (bearer token)
    let push_routes = Router::new()
        .route(
            "/push-subscriptions",
            post(routes::push::create_subscription).delete(routes::push::delete_subscription),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", public_auth_routes.merge(private_auth_routes))
        .merge(stream_routes)
        .merge(task_routes)
        .merge(notification_routes)
        .merge(push_routes);

    // Billing webhook: raw body, verified against the provider signature
    let webhook_routes = Router::new().route("/webhook", post(routes::billing::webhook));

    let cors = build_cors_layer(&state.config);

    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Builds the CORS layer for the configured client origin
fn build_cors_layer(config: &Config) -> CorsLayer {
    match config.api.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(
                frontend_url = %config.api.frontend_url,
                "Invalid frontend origin, falling back to permissive CORS"
            );
            CorsLayer::permissive()
        }
    }
}

/// JWT authentication middleware layer
///
/// Extracts the bearer token from the Authorization header, validates it,
/// resolves the subject to a stored user, and injects an [`AuthContext`]
/// into the request extensions.
async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    // The token subject must still exist in the store
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    req.extensions_mut().insert(AuthContext::from_jwt(user.id));

    Ok(next.run(req).await)
}
