use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache; // ✅ High-performance TTL Cache
use serde_json::json;
use tracing::error;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::store::StoreError;
use crate::utils::api_response::ApiResponse;
use crate::workflow::queue::{ActorContext, Role};

/// ✅ **Actor Context Cache Using `moka`**
pub type ActorCache = Arc<Cache<i32, ActorContext>>;

/// ✅ **Initialize the `moka` Cache**
pub fn create_actor_cache() -> ActorCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // ✅ TTL = 10 minutes
            .build(),
    )
}

/// Claims injected when AUTH_DISABLED short-circuits token checks. Actor id 0
/// is the system account seeded by the schema, so rows written under the
/// bypass still satisfy the `users` foreign keys.
fn bypass_claims() -> Claims {
    Claims {
        sub: "0".to_string(),
        username: "system".to_string(),
        role: "system_admin".to_string(),
        exp: usize::MAX,
    }
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // AUTH_DISABLED short-circuits token checks for local development.
    if Config::auth_disabled() {
        req.extensions_mut().insert(bypass_claims());
        return Ok(next.run(req).await);
    }

    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None).into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::error!("Invalid Authorization header format");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid Authorization header format", None).into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(StatusCode::BAD_REQUEST, "Invalid token format (missing 'Bearer ' prefix)", None).into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Invalid token", Some(json!({ "error": e.to_string() }))).into_response()
    })?;

    // Step 5: Insert claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    // Step 6: Proceed to the next middleware
    Ok(next.run(req).await)
}

/// ✅ **Actor Context Middleware with `moka`**
///
/// Resolves the authenticated user into the context the workflow consumes:
/// their current role and, for project managers, the projects they manage.
pub async fn actor_context_middleware(
    State(state): State<AppState>,
    Extension(actor_cache): Extension<ActorCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| {
            error!("Missing JWT claims in request");
            ApiResponse::<()>::error(
                StatusCode::UNAUTHORIZED,
                "Missing JWT claims in request",
                None,
            ).into_response()
        })?;

    let user_id: i32 = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        ).into_response()
    })?;

    // ✅ **Check cache first before querying DB**
    if let Some(cached_actor) = actor_cache.get(&user_id) {
        req.extensions_mut().insert(cached_actor.clone());
        return Ok(next.run(req).await);
    }

    // ❌ **If not cached, query database**
    let actor = match fetch_actor_from_db(user_id, &claims, &state).await {
        Ok(actor) => actor,
        Err(err) => {
            error!("Database query failed: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load actor context",
                Some(json!({ "error": err.to_string() })),
            ).into_response());
        }
    };

    // ✅ **Cache the retrieved context**
    actor_cache.insert(user_id, actor.clone());

    // ✅ **Attach to request & continue**
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// ✅ **Query Database for the Actor's Role and Managed Projects**
async fn fetch_actor_from_db(
    user_id: i32,
    claims: &Claims,
    state: &AppState,
) -> Result<ActorContext, StoreError> {
    // Roles live in the users table; the token claim is only a fallback for
    // sessions whose user row is gone.
    let role_name = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .unwrap_or_else(|| claims.role.clone());

    let managed_project_ids = match Role::from_name(&role_name) {
        Some(Role::ProjectManager) => state.requests.managed_project_ids(user_id).await?,
        _ => Vec::new(),
    };

    Ok(ActorContext {
        user_id,
        role_name,
        managed_project_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_auth_acts_as_the_seeded_system_account() {
        let claims = bypass_claims();
        assert_eq!(claims.user_id().ok(), Some(0));
        assert_eq!(claims.role, "system_admin");

        // The schema ships account 0, so requests and audit rows written
        // under the bypass keep their foreign keys to users intact.
        let schema = include_str!("../../migrations/0001_init.sql");
        assert!(schema.contains("VALUES (0, 'system', '', 'system_admin', TRUE)"));
    }
}
