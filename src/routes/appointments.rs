use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{new_id, require_admin},
    booking::normalize_slot,
    db::fetch_appointment,
    error::ApiError,
    models::{
        ApiResponse, AppointmentDetailRow, AppointmentRow, NewAppointment, APPOINTMENT_STATUSES,
        PAYMENT_PENDING, PAYMENT_STATUSES, STATUS_CANCELLED, STATUS_PENDING,
    },
    routes::{
        catalog::{fetch_barber, fetch_service},
        optional, required,
    },
    state::{AppState, ServerEvent},
};

const SLOT_TAKEN: &str = "This barber is already booked for the selected date and time";

pub(crate) const APPOINTMENT_DETAIL_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.barber_id, a.service_id, a.appointment_date, a.appointment_time,
           a.status, a.notes, a.total_amount, a.payment_status, a.payment_id, a.created_at,
           u.name AS user_name,
           b.name AS barber_name,
           s.name AS service_name,
           s.price AS service_price
    FROM appointments a
    LEFT JOIN users u ON a.user_id = u.id
    LEFT JOIN barbers b ON a.barber_id = b.id
    LEFT JOIN services s ON a.service_id = s.id"#;

#[derive(Deserialize)]
struct AppointmentFilter {
    status: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct PaymentLinkPayload {
    payment_status: Option<String>,
    payment_id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/appointments")
            .service(
                web::resource("")
                    .route(web::get().to(list_appointments))
                    .route(web::post().to(create_appointment)),
            )
            .service(web::resource("/user/{user_id}").route(web::get().to(list_user_appointments)))
            .service(web::resource("/{id}/status").route(web::put().to(update_status)))
            .service(web::resource("/{id}/cancel").route(web::put().to(cancel_appointment)))
            .service(web::resource("/{id}").route(web::put().to(link_payment))),
    );
}

async fn list_appointments(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<AppointmentFilter>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state, &req).await?;

    let status_filter = optional(query.status.as_deref());
    let rows = match status_filter {
        Some(status) => {
            let sql = format!(
                "{APPOINTMENT_DETAIL_SELECT} WHERE a.status = ? ORDER BY a.appointment_date DESC, a.appointment_time DESC"
            );
            sqlx::query_as::<_, AppointmentDetailRow>(&sql)
                .bind(status)
                .fetch_all(&state.db)
                .await?
        }
        None => {
            let sql = format!(
                "{APPOINTMENT_DETAIL_SELECT} ORDER BY a.appointment_date DESC, a.appointment_time DESC"
            );
            sqlx::query_as::<_, AppointmentDetailRow>(&sql)
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn list_user_appointments(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let sql = format!(
        "{APPOINTMENT_DETAIL_SELECT} WHERE a.user_id = ? ORDER BY a.appointment_date DESC, a.appointment_time DESC"
    );
    let rows = sqlx::query_as::<_, AppointmentDetailRow>(&sql)
        .bind(&user_id)
        .fetch_all(&state.db)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn create_appointment(
    state: web::Data<AppState>,
    payload: web::Json<NewAppointment>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(user_id), Some(barber_id), Some(service_id), Some(date), Some(time)) = (
        required(&payload.user_id),
        required(&payload.barber_id),
        required(&payload.service_id),
        required(&payload.appointment_date),
        required(&payload.appointment_time),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    let (appointment_date, appointment_time) =
        normalize_slot(date, time).map_err(|err| ApiError::bad_request(err.to_string()))?;

    let payment_status = match optional(payload.payment_status.as_deref()) {
        Some(status) if PAYMENT_STATUSES.contains(&status.as_str()) => status,
        Some(_) => return Err(ApiError::bad_request("Invalid payment status")),
        None => PAYMENT_PENDING.to_string(),
    };

    let user_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&state.db)
        .await?;
    if user_exists == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    if fetch_barber(&state, barber_id).await?.is_none() {
        return Err(ApiError::not_found("Barber not found"));
    }
    let service = fetch_service(&state, service_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    let total_amount = payload.total_amount.unwrap_or(service.price);
    if total_amount < 0.0 {
        return Err(ApiError::bad_request("Total amount cannot be negative"));
    }

    let appointment_id = new_id();
    let mut tx = state.db.begin().await?;

    let taken: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM appointments
           WHERE barber_id = ? AND appointment_date = ? AND appointment_time = ? AND status <> ?"#,
    )
    .bind(barber_id)
    .bind(&appointment_date)
    .bind(&appointment_time)
    .bind(STATUS_CANCELLED)
    .fetch_one(&mut *tx)
    .await?;
    if taken > 0 {
        return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
    }

    sqlx::query(
        r#"INSERT INTO appointments
           (id, user_id, barber_id, service_id, appointment_date, appointment_time, status,
            notes, total_amount, payment_status, payment_id, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)"#,
    )
    .bind(&appointment_id)
    .bind(user_id)
    .bind(barber_id)
    .bind(service_id)
    .bind(&appointment_date)
    .bind(&appointment_time)
    .bind(STATUS_PENDING)
    .bind(optional(payload.notes.as_deref()))
    .bind(total_amount)
    .bind(&payment_status)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await
    .map_err(|err| ApiError::from_write(err, SLOT_TAKEN))?;

    tx.commit().await?;

    let row = load_appointment(&state, &appointment_id).await?;
    log::info!(
        "Appointment {} booked for {} {} with barber {}",
        row.id,
        row.appointment_date,
        row.appointment_time,
        row.barber_id
    );
    state.publish(ServerEvent::from_appointment("appointment_created", &row));

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Appointment created successfully", row)))
}

async fn update_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<StatusPayload>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&state, &req).await?;
    let appointment_id = path.into_inner();
    let status = payload.into_inner().status;
    if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::bad_request("Valid status is required"));
    }

    let result = sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
        .bind(&status)
        .bind(&appointment_id)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::from_write(err, SLOT_TAKEN))?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let row = load_appointment(&state, &appointment_id).await?;
    log::info!("{} set appointment {} to {}", admin.email, appointment_id, status);
    state.publish(ServerEvent::from_appointment("appointment_updated", &row));

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Appointment status updated successfully",
        row,
    )))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let result = sqlx::query("UPDATE appointments SET status = ? WHERE id = ?")
        .bind(STATUS_CANCELLED)
        .bind(&appointment_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let row = load_appointment(&state, &appointment_id).await?;
    state.publish(ServerEvent::from_appointment("appointment_cancelled", &row));

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Appointment cancelled successfully",
        row,
    )))
}

async fn link_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PaymentLinkPayload>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let payload = payload.into_inner();
    let payment_status = optional(payload.payment_status.as_deref());
    if let Some(status) = payment_status.as_deref() {
        if !PAYMENT_STATUSES.contains(&status) {
            return Err(ApiError::bad_request("Invalid payment status"));
        }
    }

    let result = sqlx::query(
        r#"UPDATE appointments
           SET payment_status = COALESCE(?, payment_status),
               payment_id = COALESCE(?, payment_id)
           WHERE id = ?"#,
    )
    .bind(payment_status)
    .bind(optional(payload.payment_id.as_deref()))
    .bind(&appointment_id)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Appointment not found"));
    }

    let row = load_appointment(&state, &appointment_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Appointment updated successfully",
        row,
    )))
}

async fn load_appointment(state: &AppState, appointment_id: &str) -> Result<AppointmentRow, ApiError> {
    fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))
}
