use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Local;

use crate::{
    auth::{admin_validator, AuthUser},
    booking::format_date,
    error::ApiError,
    models::{
        ApiResponse, AppointmentDetailRow, Dashboard, DashboardStats, PAYMENT_PENDING, STATUS_COMPLETED,
        STATUS_CONFIRMED, STATUS_PENDING,
    },
    routes::{appointments::APPOINTMENT_DETAIL_SELECT, events},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .service(web::resource("/me").route(web::get().to(me)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .configure(events::configure),
    );
}

async fn me(auth: web::ReqData<AuthUser>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::data(serde_json::json!({
        "id": auth.id,
        "name": auth.name,
        "email": auth.email,
        "role": auth.role,
    })))
}

async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let today = format_date(Local::now().date_naive());
    let stats = collect_stats(&state, &today).await?;

    let pending_sql = format!(
        "{APPOINTMENT_DETAIL_SELECT} WHERE a.status = ? ORDER BY a.appointment_date, a.appointment_time"
    );
    let pending = sqlx::query_as::<_, AppointmentDetailRow>(&pending_sql)
        .bind(STATUS_PENDING)
        .fetch_all(&state.db)
        .await?;

    let today_sql = format!(
        "{APPOINTMENT_DETAIL_SELECT} WHERE a.status = ? AND a.appointment_date = ? ORDER BY a.appointment_time"
    );
    let today_rows = sqlx::query_as::<_, AppointmentDetailRow>(&today_sql)
        .bind(STATUS_CONFIRMED)
        .bind(&today)
        .fetch_all(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::data(Dashboard {
        stats,
        pending,
        today: today_rows,
    })))
}

pub(crate) async fn collect_stats(state: &AppState, today: &str) -> Result<DashboardStats, sqlx::Error> {
    let total_appointments = count(state, "SELECT COUNT(*) FROM appointments", &[]).await?;
    let pending_appointments = count(
        state,
        "SELECT COUNT(*) FROM appointments WHERE status = ?",
        &[STATUS_PENDING],
    )
    .await?;
    let todays_confirmed = count(
        state,
        "SELECT COUNT(*) FROM appointments WHERE status = ? AND appointment_date = ?",
        &[STATUS_CONFIRMED, today],
    )
    .await?;
    let completed_appointments = count(
        state,
        "SELECT COUNT(*) FROM appointments WHERE status = ?",
        &[STATUS_COMPLETED],
    )
    .await?;
    let pending_payments = count(
        state,
        "SELECT COUNT(*) FROM payments WHERE payment_status = ?",
        &[PAYMENT_PENDING],
    )
    .await?;

    // Revenue counts the catalog price of every completed appointment.
    let completed_revenue: f64 = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(s.price), 0.0)
           FROM appointments a
           JOIN services s ON a.service_id = s.id
           WHERE a.status = ?"#,
    )
    .bind(STATUS_COMPLETED)
    .fetch_one(&state.db)
    .await?;

    Ok(DashboardStats {
        total_appointments,
        pending_appointments,
        todays_confirmed,
        completed_appointments,
        completed_revenue,
        pending_payments,
    })
}

async fn count(state: &AppState, query: &str, params: &[&str]) -> Result<i64, sqlx::Error> {
    let mut query = sqlx::query_scalar::<_, i64>(query);
    for param in params {
        query = query.bind(*param);
    }
    query.fetch_one(&state.db).await
}
