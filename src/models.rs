use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CUSTOMER: &str = "customer";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const APPOINTMENT_STATUSES: [&str; 4] = [
    STATUS_PENDING,
    STATUS_CONFIRMED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_COMPLETED: &str = "completed";
pub const PAYMENT_FAILED: &str = "failed";
pub const PAYMENT_REFUNDED: &str = "refunded";

pub const PAYMENT_STATUSES: [&str; 4] = [
    PAYMENT_PENDING,
    PAYMENT_COMPLETED,
    PAYMENT_FAILED,
    PAYMENT_REFUNDED,
];

pub const VERIFY_APPROVED: &str = "approved";
pub const VERIFY_REJECTED: &str = "rejected";

pub const PAYMENT_METHOD_TYPES: [&str; 5] = ["cash", "card", "gcash", "paymaya", "bank_transfer"];

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

/// User as returned by login/register. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BarberRow {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub rating: f64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    /// Minutes.
    pub duration: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub user_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub status: String,
    pub notes: Option<String>,
    pub total_amount: f64,
    pub payment_status: String,
    pub payment_id: Option<String>,
    pub created_at: String,
}

/// Appointment joined with the names an appointment list needs.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppointmentDetailRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: AppointmentRow,
    pub user_name: Option<String>,
    pub barber_name: Option<String>,
    pub service_name: Option<String>,
    pub service_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: String,
    pub appointment_id: String,
    pub user_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub payment_reference: Option<String>,
    pub receipt_image: Option<String>,
    pub receipt_upload_date: Option<String>,
    pub payment_status: String,
    pub payment_date: Option<String>,
    pub admin_verified_by: Option<String>,
    pub admin_verification_date: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: String,
}

/// Payment with the appointment, customer and catalog context used by
/// history screens and the admin verification queue.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentDetailRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: PaymentRow,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub appointment_status: Option<String>,
    pub service_name: Option<String>,
    pub service_price: Option<f64>,
    pub barber_name: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentMethodRow {
    pub id: String,
    pub user_id: String,
    pub method_type: String,
    pub method_name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAppointment {
    pub user_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub notes: Option<String>,
    pub total_amount: Option<f64>,
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPayment {
    pub appointment_id: String,
    pub user_id: String,
    pub amount: Option<f64>,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub payment_reference: Option<String>,
    pub receipt_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedReceipt {
    pub filename: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    pub size: usize,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_appointments: i64,
    pub pending_appointments: i64,
    pub todays_confirmed: i64,
    pub completed_appointments: i64,
    pub completed_revenue: f64,
    pub pending_payments: i64,
}

/// Admin landing view: counters plus the two queues the shop works from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub pending: Vec<AppointmentDetailRow>,
    pub today: Vec<AppointmentDetailRow>,
}

/// Envelope every JSON endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}
