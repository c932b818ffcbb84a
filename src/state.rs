use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{
    config::Config,
    models::{AppointmentRow, PaymentRow},
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub config: Config,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { db, events, config }
    }

    /// Fan an event out to connected admin dashboards. Having no listener is fine.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub appointment_id: Option<String>,
    pub payment_id: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
}

impl ServerEvent {
    pub fn from_appointment(kind: &str, row: &AppointmentRow) -> Self {
        Self {
            kind: kind.to_string(),
            appointment_id: Some(row.id.clone()),
            payment_id: row.payment_id.clone(),
            user_id: Some(row.user_id.clone()),
            status: Some(row.status.clone()),
            payment_status: Some(row.payment_status.clone()),
            appointment_date: Some(row.appointment_date.clone()),
            appointment_time: Some(row.appointment_time.clone()),
        }
    }

    pub fn from_payment(kind: &str, row: &PaymentRow) -> Self {
        Self {
            kind: kind.to_string(),
            appointment_id: Some(row.appointment_id.clone()),
            payment_id: Some(row.id.clone()),
            user_id: Some(row.user_id.clone()),
            status: None,
            payment_status: Some(row.payment_status.clone()),
            appointment_date: None,
            appointment_time: None,
        }
    }
}
