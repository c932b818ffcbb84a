use actix_web::{web, HttpResponse};

use crate::{
    error::ApiError,
    models::{ApiResponse, BarberRow, ServiceRow},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/barbers")
            .service(web::resource("").route(web::get().to(list_barbers)))
            .service(web::resource("/{id}").route(web::get().to(get_barber))),
    )
    .service(
        web::scope("/api/services")
            .service(web::resource("").route(web::get().to(list_services)))
            .service(web::resource("/{id}").route(web::get().to(get_service))),
    );
}

async fn list_barbers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, BarberRow>(
        "SELECT id, name, specialty, rating, phone, email, created_at FROM barbers ORDER BY rating DESC, name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn get_barber(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let row = fetch_barber(&state, &barber_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Barber not found"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(row)))
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, description, price, duration, created_at FROM services ORDER BY price ASC, name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn get_service(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let service_id = path.into_inner();
    let row = fetch_service(&state, &service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(row)))
}

pub(crate) async fn fetch_barber(
    state: &AppState,
    barber_id: &str,
) -> Result<Option<BarberRow>, sqlx::Error> {
    sqlx::query_as::<_, BarberRow>(
        "SELECT id, name, specialty, rating, phone, email, created_at FROM barbers WHERE id = ?",
    )
    .bind(barber_id)
    .fetch_optional(&state.db)
    .await
}

pub(crate) async fn fetch_service(
    state: &AppState,
    service_id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, description, price, duration, created_at FROM services WHERE id = ?",
    )
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
}
