use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{authenticate_credentials, find_user_by_email, hash_password, new_id},
    error::ApiError,
    models::{ApiResponse, UserProfile, ROLE_CUSTOMER},
    routes::required,
    state::AppState,
};

#[derive(Deserialize)]
struct RegisterPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .service(web::resource("/register").route(web::post().to(register)))
            .service(web::resource("/login").route(web::post().to(login))),
    );
}

async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(name), Some(email)) = (required(&payload.name), required(&payload.email)) else {
        return Err(ApiError::bad_request("Name, email, and password are required"));
    };
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Name, email, and password are required"));
    }
    let email = email.to_lowercase();

    if find_user_by_email(&state, &email).await?.is_some() {
        return Err(ApiError::bad_request("User already exists with this email"));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|err| ApiError::Internal(format!("password hash failed: {err}")))?;
    let user = UserProfile {
        id: new_id(),
        name: name.to_string(),
        email,
        role: ROLE_CUSTOMER.to_string(),
    };

    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(password_hash)
    .bind(&user.role)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await
    .map_err(|err| ApiError::from_write(err, "User already exists with this email"))?;

    log::info!("Registered customer {}", user.email);
    Ok(HttpResponse::Created().json(ApiResponse::with_message("User registered successfully", user)))
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let Some(email) = required(&payload.email) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = authenticate_credentials(&state, &email.to_lowercase(), &payload.password)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let profile = UserProfile {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Login successful", profile)))
}
