//! Token issuance for the login endpoint

use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{LoginRequest, LoginResponse, UserClaims},
};

#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issue a bearer token for the caller
    pub fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse> {
        request.validate().map_err(|_| {
            AppError::InvalidArgument("Request Body is missing or user name is empty.".to_string())
        })?;

        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;
        let claims = UserClaims {
            sub: request.user_name.clone(),
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!("Issued token for {}", claims.sub);
        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }
}
