use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{new_id, require_admin},
    db::{fetch_appointment, fetch_payment},
    error::ApiError,
    models::{
        ApiResponse, NewPayment, PaymentDetailRow, PaymentRow, PAYMENT_COMPLETED, PAYMENT_FAILED,
        PAYMENT_PENDING, PAYMENT_STATUSES, STATUS_CANCELLED, VERIFY_APPROVED, VERIFY_REJECTED,
    },
    routes::{optional, payment_methods, required},
    state::{AppState, ServerEvent},
};

const PAYMENT_DETAIL_SELECT: &str = r#"
    SELECT p.id, p.appointment_id, p.user_id, p.amount, p.payment_method, p.transaction_id,
           p.payment_reference, p.receipt_image, p.receipt_upload_date, p.payment_status,
           p.payment_date, p.admin_verified_by, p.admin_verification_date, p.admin_notes,
           p.created_at,
           a.appointment_date, a.appointment_time, a.status AS appointment_status,
           s.name AS service_name, s.price AS service_price,
           b.name AS barber_name,
           u.name AS user_name, u.email AS user_email
    FROM payments p
    LEFT JOIN appointments a ON p.appointment_id = a.id
    LEFT JOIN services s ON a.service_id = s.id
    LEFT JOIN barbers b ON a.barber_id = b.id
    LEFT JOIN users u ON p.user_id = u.id"#;

#[derive(Deserialize)]
struct PaymentStatusPayload {
    #[serde(default)]
    payment_status: String,
    payment_date: Option<String>,
}

#[derive(Deserialize)]
struct VerifyPayload {
    #[serde(default)]
    status: String,
    notes: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/payments")
            .configure(payment_methods::configure)
            .service(web::resource("").route(web::post().to(create_payment)))
            .service(web::resource("/admin/pending").route(web::get().to(list_pending)))
            .service(web::resource("/user/{user_id}").route(web::get().to(list_user_payments)))
            .service(
                web::resource("/appointment/{appointment_id}")
                    .route(web::get().to(get_appointment_payment)),
            )
            .service(web::resource("/{id}/status").route(web::put().to(update_payment_status)))
            .service(web::resource("/{id}/verify").route(web::put().to(verify_payment)))
            .service(web::resource("/{id}").route(web::get().to(get_payment))),
    );
}

async fn list_user_payments(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    let sql = format!("{PAYMENT_DETAIL_SELECT} WHERE p.user_id = ? ORDER BY p.created_at DESC");
    let rows = sqlx::query_as::<_, PaymentDetailRow>(&sql)
        .bind(&user_id)
        .fetch_all(&state.db)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn get_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let payment_id = path.into_inner();
    let sql = format!("{PAYMENT_DETAIL_SELECT} WHERE p.id = ?");
    let row = sqlx::query_as::<_, PaymentDetailRow>(&sql)
        .bind(&payment_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(row)))
}

async fn get_appointment_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let sql = format!(
        "{PAYMENT_DETAIL_SELECT} WHERE p.appointment_id = ? ORDER BY p.created_at DESC LIMIT 1"
    );
    let row = sqlx::query_as::<_, PaymentDetailRow>(&sql)
        .bind(&appointment_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found for this appointment"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(row)))
}

async fn list_pending(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state, &req).await?;
    let sql = format!("{PAYMENT_DETAIL_SELECT} WHERE p.payment_status = ? ORDER BY p.created_at DESC");
    let rows = sqlx::query_as::<_, PaymentDetailRow>(&sql)
        .bind(PAYMENT_PENDING)
        .fetch_all(&state.db)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(rows)))
}

async fn create_payment(
    state: web::Data<AppState>,
    payload: web::Json<NewPayment>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let (Some(appointment_id), Some(user_id), Some(method), Some(amount)) = (
        required(&payload.appointment_id),
        required(&payload.user_id),
        required(&payload.payment_method),
        payload.amount.filter(|amount| *amount > 0.0),
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let appointment = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;
    if appointment.user_id != user_id {
        return Err(ApiError::bad_request("Appointment does not belong to this user"));
    }
    if appointment.status == STATUS_CANCELLED {
        return Err(ApiError::bad_request("Cannot pay for a cancelled appointment"));
    }

    let payment_id = new_id();
    let now = Utc::now().to_rfc3339();
    let receipt_image = optional(payload.receipt_image.as_deref());
    let receipt_upload_date = receipt_image.as_ref().map(|_| now.clone());

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"INSERT INTO payments
           (id, appointment_id, user_id, amount, payment_method, transaction_id, payment_reference,
            receipt_image, receipt_upload_date, payment_status, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&payment_id)
    .bind(appointment_id)
    .bind(user_id)
    .bind(amount)
    .bind(method)
    .bind(optional(payload.transaction_id.as_deref()))
    .bind(optional(payload.payment_reference.as_deref()))
    .bind(&receipt_image)
    .bind(&receipt_upload_date)
    .bind(PAYMENT_PENDING)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"UPDATE appointments
           SET payment_id = ?, total_amount = ?, payment_status = ?
           WHERE id = ?"#,
    )
    .bind(&payment_id)
    .bind(amount)
    .bind(PAYMENT_PENDING)
    .bind(appointment_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = load_payment(&state, &payment_id).await?;
    log::info!(
        "Payment {} recorded for appointment {} via {}",
        row.id,
        row.appointment_id,
        row.payment_method
    );
    state.publish(ServerEvent::from_payment("payment_created", &row));

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Payment created successfully", row)))
}

async fn update_payment_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PaymentStatusPayload>,
) -> Result<HttpResponse, ApiError> {
    let payment_id = path.into_inner();
    let payload = payload.into_inner();
    let status = payload.payment_status.trim().to_string();
    if !PAYMENT_STATUSES.contains(&status.as_str()) {
        return Err(ApiError::bad_request("Valid payment status is required"));
    }
    let payment_date =
        optional(payload.payment_date.as_deref()).unwrap_or_else(|| Utc::now().to_rfc3339());

    // Receipt payments only move through admin verification.
    let existing = load_payment(&state, &payment_id).await?;
    if existing.receipt_image.is_some() {
        return Err(ApiError::bad_request(
            "Receipt payments are settled by admin verification",
        ));
    }

    let mut tx = state.db.begin().await?;

    let result = sqlx::query("UPDATE payments SET payment_status = ?, payment_date = ? WHERE id = ?")
        .bind(&status)
        .bind(&payment_date)
        .bind(&payment_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Payment not found"));
    }

    sqlx::query("UPDATE appointments SET payment_status = ? WHERE payment_id = ?")
        .bind(&status)
        .bind(&payment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let row = load_payment(&state, &payment_id).await?;
    state.publish(ServerEvent::from_payment("payment_updated", &row));

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Payment status updated successfully",
        row,
    )))
}

/// Admin decision on an uploaded receipt. `approved` settles the payment as
/// completed, `rejected` marks it failed; the appointment mirrors the result.
async fn verify_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<VerifyPayload>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&state, &req).await?;
    let payment_id = path.into_inner();
    let payload = payload.into_inner();

    let decision = payload.status.trim();
    let status = match decision {
        VERIFY_APPROVED => PAYMENT_COMPLETED,
        VERIFY_REJECTED => PAYMENT_FAILED,
        _ => return Err(ApiError::bad_request("Missing required fields or invalid status")),
    };
    let now = Utc::now().to_rfc3339();
    let payment_date = (status == PAYMENT_COMPLETED).then(|| now.clone());

    let mut tx = state.db.begin().await?;

    let result = sqlx::query(
        r#"UPDATE payments
           SET payment_status = ?,
               payment_date = COALESCE(?, payment_date),
               admin_verified_by = ?,
               admin_verification_date = ?,
               admin_notes = ?
           WHERE id = ?"#,
    )
    .bind(status)
    .bind(payment_date)
    .bind(&admin.id)
    .bind(&now)
    .bind(optional(payload.notes.as_deref()))
    .bind(&payment_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Payment not found"));
    }

    sqlx::query("UPDATE appointments SET payment_status = ? WHERE payment_id = ?")
        .bind(status)
        .bind(&payment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let row = load_payment(&state, &payment_id).await?;
    log::info!("{} {} payment {}", admin.email, decision, payment_id);
    state.publish(ServerEvent::from_payment("payment_verified", &row));

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        format!("Payment {decision} successfully"),
        row,
    )))
}

async fn load_payment(state: &AppState, payment_id: &str) -> Result<PaymentRow, ApiError> {
    fetch_payment(&state.db, payment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))
}
