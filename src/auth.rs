use actix_web::{
    dev::ServiceRequest, http::header::Header, web, Error, HttpMessage, HttpRequest,
};
use actix_web_httpauth::{
    extractors::basic::BasicAuth,
    headers::authorization::{Authorization, Basic},
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{UserRow, ROLE_ADMIN},
    state::AppState,
};

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn find_user_by_email(state: &AppState, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, name, email, password_hash, role, created_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(&state.db)
    .await
}

pub async fn authenticate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Option<AuthUser> {
    let user = match find_user_by_email(state, email).await {
        Ok(Some(user)) => user,
        Ok(None) => return None,
        Err(err) => {
            log::warn!("Credential lookup failed: {err}");
            return None;
        }
    };

    if !verify_password(password, &user.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    })
}

async fn authenticate_admin(state: &AppState, email: &str, password: &str) -> Result<AuthUser, ApiError> {
    let user = authenticate_credentials(state, email, password)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid admin credentials".to_string()))?;
    if user.role != ROLE_ADMIN {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(user)
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?;
    let password = credentials.password().unwrap_or_default();
    Ok(authenticate_admin(state, credentials.user_id(), password).await?)
}

/// Basic-auth validator for scopes that only admins may reach.
pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Per-handler admin check for resources that mix customer and admin routes.
pub async fn require_admin(state: &AppState, req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let auth = Authorization::<Basic>::parse(req)
        .map_err(|_| ApiError::Unauthorized("Admin credentials required".to_string()))?;
    let credentials = auth.into_scheme();
    let password = credentials.password().unwrap_or_default();
    authenticate_admin(state, credentials.user_id(), password).await
}
