use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};

use shared_database::SupabaseClient;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::cache::Cache;
use crate::jwt::validate_token;

/// Resolves the application role of a user when the token does not carry one.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn role_for(&self, user_id: &str) -> Option<Role>;
}

pub struct SupabaseRoleLookup {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseRoleLookup {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRole {
    role: Option<String>,
}

#[async_trait]
impl RoleLookup for SupabaseRoleLookup {
    async fn role_for(&self, user_id: &str) -> Option<Role> {
        let path = format!("/rest/v1/profiles?id=eq.{}&select=role", user_id);
        match self.supabase.request::<Vec<ProfileRole>>(Method::GET, &path, None).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| row.role)
                .and_then(|role| Role::parse(&role)),
            Err(e) => {
                warn!("Role lookup failed for user {}: {}", user_id, e);
                None
            }
        }
    }
}

/// State shared by the authentication middleware.
pub struct AuthState {
    pub jwt_secret: String,
    pub roles: Arc<dyn Cache<String, Role>>,
    pub lookup: Arc<dyn RoleLookup>,
}

impl AuthState {
    pub fn new(jwt_secret: String, roles: Arc<dyn Cache<String, Role>>, lookup: Arc<dyn RoleLookup>) -> Self {
        Self { jwt_secret, roles, lookup }
    }

    async fn resolve_role(&self, user: &User) -> Role {
        if let Some(role) = user.role.as_deref().and_then(Role::parse) {
            return role;
        }

        if let Some(role) = self.roles.get(&user.id) {
            debug!("Role cache hit for user {}", user.id);
            return role;
        }

        match self.lookup.role_for(&user.id).await {
            Some(role) => {
                self.roles.set(user.id.clone(), role);
                role
            }
            None => Role::Patient,
        }
    }
}

pub async fn auth_middleware(
    State(auth): State<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let mut user = validate_token(token, &auth.jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    let role = auth.resolve_role(&user).await;
    user.role = Some(role.as_str().to_string());

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub async fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}
