//! Customer and admin side of the API: a typed REST client, the booking
//! wizard that drives it, and the simulated card gateway used for direct
//! payments.

mod api;
mod gateway;
mod wizard;

pub use api::ApiClient;
pub use gateway::{GatewayOutcome, PaymentGateway, SimulatedGateway};
pub use wizard::{BookingBackend, BookingSummary, BookingWizard, WizardError, WizardStep};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("response carried no data")]
    MissingData,
}
