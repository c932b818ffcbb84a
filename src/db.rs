use std::{fs, path::Path, str::FromStr};

use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    auth::{hash_password, new_id},
    config::Config,
    models::{AppointmentRow, PaymentRow, ROLE_ADMIN},
};

pub async fn connect(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool, config: &Config) -> Result<(), sqlx::Error> {
    seed_admin(pool, config).await?;
    if config.seed_catalog {
        seed_catalog(pool).await?;
    }
    Ok(())
}

pub async fn fetch_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, user_id, barber_id, service_id, appointment_date, appointment_time,
                  status, notes, total_amount, payment_status, payment_id, created_at
           FROM appointments
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_payment(
    pool: &SqlitePool,
    payment_id: &str,
) -> Result<Option<PaymentRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = ? LIMIT 1")
        .bind(payment_id)
        .fetch_optional(pool)
        .await
}

async fn seed_admin(pool: &SqlitePool, config: &Config) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_ADMIN)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let seed = &config.admin;
    if seed.password == "admin123" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin123'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&seed.password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, name, email, password_hash, role, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&seed.name)
    .bind(seed.email.trim().to_lowercase())
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    log::info!("Seeded admin account {}", seed.email);
    Ok(())
}

async fn seed_catalog(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let barbers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM barbers")
        .fetch_one(pool)
        .await?;
    if barbers == 0 {
        let rows = [
            ("Mick Santos", "Classic cuts & fades", 4.9, "0917-555-0101"),
            ("Leo Reyes", "Beard sculpting", 4.7, "0917-555-0102"),
            ("Andy Cruz", "Modern styles", 4.5, "0917-555-0103"),
        ];
        for (name, specialty, rating, phone) in rows {
            sqlx::query(
                r#"INSERT INTO barbers (id, name, specialty, rating, phone, email, created_at)
                   VALUES (?, ?, ?, ?, ?, NULL, ?)"#,
            )
            .bind(new_id())
            .bind(name)
            .bind(specialty)
            .bind(rating)
            .bind(phone)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
        }
    }

    let services: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if services == 0 {
        let rows = [
            ("Signature Cut", "Precision cut, styling, and lineup.", 350.0, 45),
            ("Fade & Line-Up", "Skin fade with sharp finishing touches.", 300.0, 35),
            ("Beard Sculpt", "Shape, trim, and conditioning for the beard.", 200.0, 25),
            ("Full Grooming", "Cut, beard, and grooming refresh.", 550.0, 60),
        ];
        for (name, description, price, duration) in rows {
            sqlx::query(
                r#"INSERT INTO services (id, name, description, price, duration, created_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(new_id())
            .bind(name)
            .bind(description)
            .bind(price)
            .bind(duration)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_sqlite_dir_skips_memory_urls() {
        assert!(ensure_sqlite_dir("sqlite::memory:").is_ok());
        assert!(ensure_sqlite_dir("postgres://localhost/db").is_ok());
    }

    #[test]
    fn ensure_sqlite_dir_creates_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested/app.db");
        let url = format!("sqlite://{}", db_path.display());
        ensure_sqlite_dir(&url).expect("create dir");
        assert!(dir.path().join("nested").is_dir());
    }
}
