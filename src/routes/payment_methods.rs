//! Saved payment channels per customer. At most one active method per user
//! carries the default flag; setting a new default clears the others in the
//! same transaction.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::{
    auth::new_id,
    error::ApiError,
    models::{ApiResponse, PaymentMethodRow, PAYMENT_METHOD_TYPES},
    routes::{optional, required},
    state::AppState,
};

#[derive(Deserialize)]
struct NewMethodPayload {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    method_type: String,
    #[serde(default)]
    method_name: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Deserialize)]
struct UpdateMethodPayload {
    method_name: Option<String>,
    is_default: Option<bool>,
    is_active: Option<bool>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/methods").route(web::post().to(add_method)))
        .service(
            web::resource("/methods/{id}")
                .route(web::get().to(list_methods))
                .route(web::put().to(update_method))
                .route(web::delete().to(delete_method)),
        );
}

/// `GET /methods/{id}` lists the methods of user `{id}`.
async fn list_methods(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let rows = sqlx::query_as::<_, PaymentMethodRow>(
        r#"SELECT id, user_id, method_type, method_name, is_default, is_active, created_at
           FROM payment_methods
           WHERE user_id = ? AND is_active = 1
           ORDER BY is_default DESC, created_at DESC"#,
    )
    .bind(&user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn add_method(
    state: web::Data<AppState>,
    payload: web::Json<NewMethodPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(user_id), Some(method_type), Some(method_name)) = (
        required(&payload.user_id),
        required(&payload.method_type),
        required(&payload.method_name),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };
    if !PAYMENT_METHOD_TYPES.contains(&method_type) {
        return Err(ApiError::bad_request(format!(
            "Unsupported method type '{method_type}'. Supported: {}",
            PAYMENT_METHOD_TYPES.join(", ")
        )));
    }

    let method_id = new_id();
    let mut tx = state.db.begin().await?;

    if payload.is_default {
        clear_defaults(&mut *tx, user_id).await?;
    }

    sqlx::query(
        r#"INSERT INTO payment_methods (id, user_id, method_type, method_name, is_default, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&method_id)
    .bind(user_id)
    .bind(method_type)
    .bind(method_name)
    .bind(payload.is_default)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = load_method(&state, &method_id).await?;
    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Payment method added successfully",
        row,
    )))
}

async fn update_method(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateMethodPayload>,
) -> Result<HttpResponse, ApiError> {
    let method_id = path.into_inner();
    let payload = payload.into_inner();
    let existing = load_method(&state, &method_id).await?;

    let method_name = optional(payload.method_name.as_deref()).unwrap_or(existing.method_name);
    let is_active = payload.is_active.unwrap_or(existing.is_active);
    // An inactive method can never be the default.
    let is_default = payload.is_default.unwrap_or(existing.is_default) && is_active;

    let mut tx = state.db.begin().await?;

    if is_default && !existing.is_default {
        clear_defaults(&mut *tx, &existing.user_id).await?;
    }

    sqlx::query(
        "UPDATE payment_methods SET method_name = ?, is_default = ?, is_active = ? WHERE id = ?",
    )
    .bind(&method_name)
    .bind(is_default)
    .bind(is_active)
    .bind(&method_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = load_method(&state, &method_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Payment method updated successfully",
        row,
    )))
}

/// Soft delete: the row stays for payment history but drops out of listings.
async fn delete_method(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let method_id = path.into_inner();
    let result =
        sqlx::query("UPDATE payment_methods SET is_active = 0, is_default = 0 WHERE id = ?")
            .bind(&method_id)
            .execute(&state.db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Payment method not found"));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::message("Payment method deleted successfully")))
}

async fn clear_defaults(conn: &mut SqliteConnection, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_methods SET is_default = 0 WHERE user_id = ?")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn load_method(state: &AppState, method_id: &str) -> Result<PaymentMethodRow, ApiError> {
    sqlx::query_as::<_, PaymentMethodRow>(
        r#"SELECT id, user_id, method_type, method_name, is_default, is_active, created_at
           FROM payment_methods
           WHERE id = ?"#,
    )
    .bind(method_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Payment method not found"))
}
