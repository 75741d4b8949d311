//! API handlers for the inventory REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Caller that passed the access gate: valid bearer token and its client
/// address within its rate budget
pub struct AuthenticatedUser(pub UserClaims);

/// Shared budget for requests served without connection info
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let claims = state.services.gate.authenticate(header)?;

        let client = match ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await {
            Ok(ConnectInfo(addr)) => addr.ip(),
            Err(_) => {
                tracing::debug!("No connection info, using the shared client budget");
                UNKNOWN_CLIENT
            }
        };
        state.services.gate.admit(client)?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books/find/isbn/:isbn", get(books::find_by_isbn))
        .route("/books/find/author/:author", get(books::find_by_author))
        .route("/books/newbook", post(books::add_book))
        .route("/books/delete/:isbn", delete(books::remove_book))
        .route("/books/borrow/:isbn", put(books::borrow_book))
        .route("/books/return/:isbn", put(books::return_book))
        .route("/books/clearcache", get(books::clear_cache))
        .with_state(state.clone());

    let auth = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(auth)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
