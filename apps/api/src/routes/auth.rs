use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension, Json,
};

use crate::errors::AppError;
use crate::platform::User;
use crate::state::AppState;

/// Rejects requests without a valid `Authorization: Bearer <token>` header and
/// exposes the resolved `User` to handlers as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        tracing::warn!("token missing, authentication denied");
        return Err(AppError::Unauthorized);
    };

    match state.auth.current_user(token).await {
        Some(user) => {
            request.extensions_mut().insert(Arc::new(user));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("invalid token, authentication denied");
            Err(AppError::Unauthorized)
        }
    }
}

/// GET /api/v1/me
pub async fn handle_me(Extension(user): Extension<Arc<User>>) -> Json<User> {
    Json(user.as_ref().clone())
}
