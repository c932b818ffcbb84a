pub mod admin;
pub mod appointments;
pub mod auth;
pub mod catalog;
pub mod events;
pub mod payment_methods;
pub mod payments;
pub mod upload;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;

/// Registers every API route. Static receipt serving is mounted by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .service(web::resource("/").route(web::get().to(index)))
    .service(web::resource("/health").route(web::get().to(health)))
    .configure(auth::configure)
    .configure(catalog::configure)
    .configure(appointments::configure)
    .configure(payments::configure)
    .configure(upload::configure)
    .configure(admin::configure);
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Mick's Barber API is running!" }))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Trims a required text field, treating blank as missing.
pub(crate) fn required(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Trims an optional text field, treating blank as absent.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
