//! Authentication of users with HTTP basic auth.

use super::{
    config::SecurityConfig,
    error::{ApiError, ApiResult, ClientError, InternalError},
    state::AppState,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use http::request::Parts;
use tracing::instrument;

/// An authenticated user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    username: String,
}

impl User {
    /// The user everyone is when security is disabled.
    pub fn anonymous() -> Self {
        Self {
            username: "anonymous".to_string(),
        }
    }

    pub fn username(&self) -> &str {
        self.username.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for User {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let security = &state.config().security;
        if !security.enabled {
            return Ok(User::anonymous());
        }

        // Get authorization header
        let TypedHeader(Authorization(basic)) =
            TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ClientError::Unauthorized)?;

        // Keep bcrypt off the async workers
        let security = security.clone();
        let (username, password) = (basic.username().to_string(), basic.password().to_string());
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            span.in_scope(|| authenticate(&security, &username, &password))
        })
        .await
        .map_err(|e| InternalError::Other(format!("password check failed: {e}")))?
    }
}

/// Only lets requests from authenticated users through.
///
/// The user is made available to handlers as a request extension.
pub(crate) async fn require_user(user: User, mut req: Request, next: Next) -> Response {
    tracing::info!(username = user.username(), "User authenticated");
    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Validate a user's password.
#[instrument(skip(security, password))]
pub fn authenticate(security: &SecurityConfig, username: &str, password: &str) -> ApiResult<User> {
    let Some(user) = security.users.iter().find(|u| u.username == username) else {
        tracing::info!("Unknown user");
        return Err(ClientError::Unauthorized.into());
    };

    tracing::debug!("Verifying password");
    let password_is_ok = bcrypt::verify(password, &user.password_hash)?;
    if password_is_ok {
        Ok(User {
            username: user.username.clone(),
        })
    } else {
        Err(ClientError::Unauthorized.into())
    }
}
