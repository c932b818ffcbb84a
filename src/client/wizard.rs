//! Five-step booking flow: service, barber, date and time, payment, overview.
//!
//! The appointment is created when the customer moves from the date and time
//! step to payment, so the payment step always has an appointment id to pay
//! for. Going back and forward again with the same selection reuses it; a
//! changed selection cancels the superseded booking before booking again.

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use super::{ApiClient, ClientError, GatewayOutcome, PaymentGateway};
use crate::{
    booking::{check_business_hours, check_not_past, format_date, format_time, BookingError},
    models::{
        AppointmentRow, BarberRow, NewAppointment, NewPayment, PaymentRow, ServiceRow,
        UploadedReceipt, PAYMENT_COMPLETED,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Service,
    Barber,
    DateTime,
    Payment,
    Overview,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        match self {
            Self::Service => 1,
            Self::Barber => 2,
            Self::DateTime => 3,
            Self::Payment => 4,
            Self::Overview => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Service => "Choose Service",
            Self::Barber => "Select Barber",
            Self::DateTime => "Pick Date & Time",
            Self::Payment => "Payment",
            Self::Overview => "Overview",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Service => Some(Self::Barber),
            Self::Barber => Some(Self::DateTime),
            Self::DateTime => Some(Self::Payment),
            Self::Payment => Some(Self::Overview),
            Self::Overview => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            Self::Service => None,
            Self::Barber => Some(Self::Service),
            Self::DateTime => Some(Self::Barber),
            Self::Payment => Some(Self::DateTime),
            Self::Overview => Some(Self::Payment),
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Complete the '{0}' step before continuing")]
    IncompleteStep(WizardStep),
    #[error(transparent)]
    Slot(#[from] BookingError),
    #[error("Payments can only be made on the payment step")]
    NotAtPayment,
    #[error("{0}")]
    PaymentDeclined(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// The server calls the wizard needs. [`ApiClient`] is the real one.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn create_appointment(&self, request: &NewAppointment) -> Result<AppointmentRow, ClientError>;
    async fn cancel_appointment(&self, appointment_id: &str) -> Result<AppointmentRow, ClientError>;
    async fn create_payment(&self, request: &NewPayment) -> Result<PaymentRow, ClientError>;
    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: &str,
    ) -> Result<PaymentRow, ClientError>;
}

#[async_trait]
impl BookingBackend for ApiClient {
    async fn create_appointment(&self, request: &NewAppointment) -> Result<AppointmentRow, ClientError> {
        ApiClient::create_appointment(self, request).await
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> Result<AppointmentRow, ClientError> {
        ApiClient::cancel_appointment(self, appointment_id).await
    }

    async fn create_payment(&self, request: &NewPayment) -> Result<PaymentRow, ClientError> {
        ApiClient::create_payment(self, request).await
    }

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: &str,
    ) -> Result<PaymentRow, ClientError> {
        ApiClient::update_payment_status(self, payment_id, status).await
    }
}

/// What the overview step shows.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSummary {
    pub appointment_id: String,
    pub service_name: String,
    pub barber_name: String,
    pub date: String,
    pub time: String,
    pub total: f64,
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: WizardStep,
    user_id: String,
    today: NaiveDate,
    service: Option<ServiceRow>,
    barber: Option<BarberRow>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    notes: Option<String>,
    appointment: Option<AppointmentRow>,
    payment: Option<PaymentRow>,
}

impl BookingWizard {
    /// `today` bounds the dates the customer may pick.
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            step: WizardStep::Service,
            user_id: user_id.into(),
            today,
            service: None,
            barber: None,
            date: None,
            time: None,
            notes: None,
            appointment: None,
            payment: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn service(&self) -> Option<&ServiceRow> {
        self.service.as_ref()
    }

    pub fn barber(&self) -> Option<&BarberRow> {
        self.barber.as_ref()
    }

    pub fn appointment(&self) -> Option<&AppointmentRow> {
        self.appointment.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentRow> {
        self.payment.as_ref()
    }

    pub fn select_service(&mut self, service: ServiceRow) {
        self.service = Some(service);
    }

    pub fn select_barber(&mut self, barber: BarberRow) {
        self.barber = Some(barber);
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.date = Some(check_not_past(date, self.today)?);
        Ok(())
    }

    pub fn select_time(&mut self, time: NaiveTime) -> Result<(), WizardError> {
        self.time = Some(check_business_hours(time)?);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
    }

    pub fn can_proceed(&self) -> bool {
        match self.step {
            WizardStep::Service => self.service.is_some(),
            WizardStep::Barber => self.barber.is_some(),
            WizardStep::DateTime => self.date.is_some() && self.time.is_some(),
            WizardStep::Payment => self.payment.is_some(),
            WizardStep::Overview => false,
        }
    }

    /// Advances one step. Leaving the date and time step books the slot.
    pub async fn next<B: BookingBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<WizardStep, WizardError> {
        let Some(next) = self.step.next().filter(|_| self.can_proceed()) else {
            return Err(WizardError::IncompleteStep(self.step));
        };

        if next == WizardStep::Payment {
            let request = self.appointment_request()?;
            if !self.booked_matches(&request) {
                // A superseded booking must not keep holding its slot.
                if let Some(superseded) = self.appointment.as_ref().map(|a| a.id.clone()) {
                    backend.cancel_appointment(&superseded).await?;
                    log::info!("Cancelled superseded appointment {superseded}");
                    self.appointment = None;
                }
                let appointment = backend.create_appointment(&request).await?;
                log::info!("Booked appointment {}", appointment.id);
                self.appointment = Some(appointment);
                self.payment = None;
            }
        }

        self.step = next;
        Ok(next)
    }

    pub fn back(&mut self) -> WizardStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Drops every selection and returns to the first step.
    pub fn cancel(&mut self) {
        *self = Self::new(std::mem::take(&mut self.user_id), self.today);
    }

    /// Charges through `gateway`, records the payment and marks it completed.
    pub async fn pay_direct<B, G>(
        &mut self,
        backend: &B,
        gateway: &G,
        method: &str,
    ) -> Result<&PaymentRow, WizardError>
    where
        B: BookingBackend + ?Sized,
        G: PaymentGateway + ?Sized,
    {
        let appointment = self.payable_appointment()?.clone();
        let (transaction_id, reference) =
            match gateway.charge(appointment.total_amount, method).await {
                GatewayOutcome::Approved {
                    transaction_id,
                    reference,
                } => (transaction_id, reference),
                GatewayOutcome::Declined { message } => {
                    return Err(WizardError::PaymentDeclined(message))
                }
            };

        let request = NewPayment {
            appointment_id: appointment.id.clone(),
            user_id: self.user_id.clone(),
            amount: Some(appointment.total_amount),
            payment_method: method.to_string(),
            transaction_id: Some(transaction_id),
            payment_reference: Some(reference),
            receipt_image: None,
        };
        let payment = backend.create_payment(&request).await?;
        let payment = backend
            .update_payment_status(&payment.id, PAYMENT_COMPLETED)
            .await?;
        Ok(self.finish_payment(payment))
    }

    /// Records a payment backed by an uploaded receipt. It stays pending
    /// until an admin verifies it.
    pub async fn pay_with_receipt<B: BookingBackend + ?Sized>(
        &mut self,
        backend: &B,
        receipt: &UploadedReceipt,
        method: &str,
    ) -> Result<&PaymentRow, WizardError> {
        let appointment = self.payable_appointment()?;
        let request = NewPayment {
            appointment_id: appointment.id.clone(),
            user_id: self.user_id.clone(),
            amount: Some(appointment.total_amount),
            payment_method: method.to_string(),
            transaction_id: None,
            payment_reference: None,
            receipt_image: Some(receipt.url.clone()),
        };
        let payment = backend.create_payment(&request).await?;
        Ok(self.finish_payment(payment))
    }

    pub fn summary(&self) -> Option<BookingSummary> {
        let appointment = self.appointment.as_ref()?;
        Some(BookingSummary {
            appointment_id: appointment.id.clone(),
            service_name: self.service.as_ref()?.name.clone(),
            barber_name: self.barber.as_ref()?.name.clone(),
            date: appointment.appointment_date.clone(),
            time: appointment.appointment_time.clone(),
            total: appointment.total_amount,
            payment_status: self.payment.as_ref().map(|p| p.payment_status.clone()),
        })
    }

    fn appointment_request(&self) -> Result<NewAppointment, WizardError> {
        let (Some(service), Some(barber), Some(date), Some(time)) =
            (&self.service, &self.barber, self.date, self.time)
        else {
            return Err(WizardError::IncompleteStep(self.step));
        };
        Ok(NewAppointment {
            user_id: self.user_id.clone(),
            barber_id: barber.id.clone(),
            service_id: service.id.clone(),
            appointment_date: format_date(date),
            appointment_time: format_time(time),
            notes: self.notes.clone(),
            total_amount: Some(service.price),
            payment_status: None,
        })
    }

    fn booked_matches(&self, request: &NewAppointment) -> bool {
        self.appointment.as_ref().is_some_and(|booked| {
            booked.barber_id == request.barber_id
                && booked.service_id == request.service_id
                && booked.appointment_date == request.appointment_date
                && booked.appointment_time == request.appointment_time
                && booked.notes == request.notes
        })
    }

    fn payable_appointment(&self) -> Result<&AppointmentRow, WizardError> {
        if self.step != WizardStep::Payment {
            return Err(WizardError::NotAtPayment);
        }
        self.appointment
            .as_ref()
            .ok_or(WizardError::IncompleteStep(WizardStep::DateTime))
    }

    fn finish_payment(&mut self, payment: PaymentRow) -> &PaymentRow {
        log::info!(
            "Payment {} recorded as {}",
            payment.id,
            payment.payment_status
        );
        if let Some(appointment) = self.appointment.as_mut() {
            appointment.payment_id = Some(payment.id.clone());
            appointment.payment_status = payment.payment_status.clone();
        }
        self.step = WizardStep::Overview;
        self.payment.insert(payment)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;
    use crate::client::SimulatedGateway;

    #[derive(Default)]
    struct FakeBackend {
        appointments: Mutex<Vec<NewAppointment>>,
        cancelled: Mutex<Vec<String>>,
        payments: Mutex<Vec<NewPayment>>,
        status_updates: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BookingBackend for FakeBackend {
        async fn create_appointment(
            &self,
            request: &NewAppointment,
        ) -> Result<AppointmentRow, ClientError> {
            let mut appointments = self.appointments.lock().expect("lock");
            appointments.push(request.clone());
            let id = format!("appt-{}", appointments.len());
            Ok(appointment_row(id, request, "pending"))
        }

        async fn cancel_appointment(
            &self,
            appointment_id: &str,
        ) -> Result<AppointmentRow, ClientError> {
            self.cancelled
                .lock()
                .expect("lock")
                .push(appointment_id.to_string());
            let index: usize = appointment_id
                .trim_start_matches("appt-")
                .parse()
                .expect("fake id");
            let appointments = self.appointments.lock().expect("lock");
            let request = &appointments[index - 1];
            Ok(appointment_row(appointment_id.to_string(), request, "cancelled"))
        }

        async fn create_payment(&self, request: &NewPayment) -> Result<PaymentRow, ClientError> {
            let mut payments = self.payments.lock().expect("lock");
            payments.push(request.clone());
            Ok(payment_row(format!("pay-{}", payments.len()), request, "pending"))
        }

        async fn update_payment_status(
            &self,
            payment_id: &str,
            status: &str,
        ) -> Result<PaymentRow, ClientError> {
            self.status_updates
                .lock()
                .expect("lock")
                .push((payment_id.to_string(), status.to_string()));
            let payments = self.payments.lock().expect("lock");
            let request = payments.last().expect("payment recorded first");
            Ok(payment_row(payment_id.to_string(), request, status))
        }
    }

    fn appointment_row(id: String, request: &NewAppointment, status: &str) -> AppointmentRow {
        AppointmentRow {
            id,
            user_id: request.user_id.clone(),
            barber_id: request.barber_id.clone(),
            service_id: request.service_id.clone(),
            appointment_date: request.appointment_date.clone(),
            appointment_time: request.appointment_time.clone(),
            status: status.to_string(),
            notes: request.notes.clone(),
            total_amount: request.total_amount.unwrap_or_default(),
            payment_status: "pending".to_string(),
            payment_id: None,
            created_at: "2030-01-01T00:00:00Z".to_string(),
        }
    }

    fn payment_row(id: String, request: &NewPayment, status: &str) -> PaymentRow {
        PaymentRow {
            id,
            appointment_id: request.appointment_id.clone(),
            user_id: request.user_id.clone(),
            amount: request.amount.unwrap_or_default(),
            payment_method: request.payment_method.clone(),
            transaction_id: request.transaction_id.clone(),
            payment_reference: request.payment_reference.clone(),
            receipt_image: request.receipt_image.clone(),
            receipt_upload_date: None,
            payment_status: status.to_string(),
            payment_date: None,
            admin_verified_by: None,
            admin_verification_date: None,
            admin_notes: None,
            created_at: "2030-01-01T00:00:00Z".to_string(),
        }
    }

    fn service() -> ServiceRow {
        ServiceRow {
            id: "svc-1".to_string(),
            name: "Classic Haircut".to_string(),
            description: None,
            price: 350.0,
            duration: 30,
            created_at: String::new(),
        }
    }

    fn barber(id: &str) -> BarberRow {
        BarberRow {
            id: id.to_string(),
            name: "Mick".to_string(),
            specialty: None,
            rating: 4.8,
            phone: None,
            email: None,
            created_at: String::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 10).expect("date")
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("time")
    }

    async fn wizard_at_payment(backend: &FakeBackend) -> BookingWizard {
        let mut wizard = BookingWizard::new("user-1", today());
        wizard.select_service(service());
        wizard.next(backend).await.expect("to barber");
        wizard.select_barber(barber("barber-1"));
        wizard.next(backend).await.expect("to date");
        wizard.select_date(today()).expect("today is bookable");
        wizard.select_time(time(10, 30)).expect("open");
        wizard.next(backend).await.expect("to payment");
        wizard
    }

    #[actix_web::test]
    async fn steps_require_selection() {
        let backend = FakeBackend::default();
        let mut wizard = BookingWizard::new("user-1", today());

        assert!(!wizard.can_proceed());
        assert!(matches!(
            wizard.next(&backend).await,
            Err(WizardError::IncompleteStep(WizardStep::Service))
        ));

        wizard.select_service(service());
        assert_eq!(wizard.next(&backend).await.expect("next"), WizardStep::Barber);
        assert!(!wizard.can_proceed());
        assert_eq!(wizard.back(), WizardStep::Service);
        assert_eq!(wizard.back(), WizardStep::Service);
    }

    #[test]
    fn rejects_past_dates_and_closed_hours() {
        let mut wizard = BookingWizard::new("user-1", today());
        let yesterday = today().pred_opt().expect("date");

        assert!(matches!(
            wizard.select_date(yesterday),
            Err(WizardError::Slot(BookingError::DateInPast))
        ));
        assert!(matches!(
            wizard.select_time(time(8, 59)),
            Err(WizardError::Slot(BookingError::OutsideBusinessHours))
        ));
        assert!(matches!(
            wizard.select_time(time(18, 0)),
            Err(WizardError::Slot(BookingError::OutsideBusinessHours))
        ));
        wizard.select_time(time(17, 59)).expect("last bookable minute");
    }

    #[actix_web::test]
    async fn entering_payment_books_once() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;

        assert_eq!(wizard.step(), WizardStep::Payment);
        let booked = backend.appointments.lock().expect("lock").clone();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].appointment_date, "2030-05-10");
        assert_eq!(booked[0].appointment_time, "10:30");
        assert_eq!(booked[0].total_amount, Some(350.0));

        wizard.back();
        wizard.next(&backend).await.expect("back to payment");
        assert_eq!(backend.appointments.lock().expect("lock").len(), 1);
        assert!(backend.cancelled.lock().expect("lock").is_empty());

        wizard.back();
        wizard.select_time(time(11, 0)).expect("open");
        wizard.next(&backend).await.expect("rebook");
        assert_eq!(backend.appointments.lock().expect("lock").len(), 2);
        assert_eq!(
            backend.cancelled.lock().expect("lock").as_slice(),
            &["appt-1".to_string()]
        );
        assert_eq!(
            wizard.appointment().map(|a| a.appointment_time.as_str()),
            Some("11:00")
        );
    }

    #[actix_web::test]
    async fn changing_service_keeps_slot_and_cancels_old_booking() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;

        wizard.back();
        wizard.back();
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::Service);
        wizard.select_service(ServiceRow {
            id: "svc-2".to_string(),
            name: "Beard Trim".to_string(),
            price: 200.0,
            ..service()
        });
        wizard.next(&backend).await.expect("to barber");
        wizard.next(&backend).await.expect("to date");
        wizard.next(&backend).await.expect("rebook same slot");

        assert_eq!(
            backend.cancelled.lock().expect("lock").as_slice(),
            &["appt-1".to_string()]
        );
        let appointment = wizard.appointment().expect("rebooked");
        assert_eq!(appointment.id, "appt-2");
        assert_eq!(appointment.service_id, "svc-2");
        assert_eq!(appointment.appointment_time, "10:30");
        assert_eq!(appointment.total_amount, 200.0);
    }

    #[actix_web::test]
    async fn direct_payment_completes() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;
        let gateway = SimulatedGateway::new(1.0, Duration::ZERO);

        let payment = wizard
            .pay_direct(&backend, &gateway, "card")
            .await
            .expect("approved")
            .clone();

        assert_eq!(payment.payment_status, PAYMENT_COMPLETED);
        assert!(payment
            .transaction_id
            .as_deref()
            .is_some_and(|id| id.starts_with("TXN_")));
        assert_eq!(wizard.step(), WizardStep::Overview);
        assert_eq!(
            backend.status_updates.lock().expect("lock").as_slice(),
            &[(payment.id.clone(), PAYMENT_COMPLETED.to_string())]
        );

        let summary = wizard.summary().expect("summary");
        assert_eq!(summary.service_name, "Classic Haircut");
        assert_eq!(summary.total, 350.0);
        assert_eq!(summary.payment_status.as_deref(), Some(PAYMENT_COMPLETED));
    }

    #[actix_web::test]
    async fn declined_payment_stays_on_step() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;
        let gateway = SimulatedGateway::new(0.0, Duration::ZERO);

        let result = wizard.pay_direct(&backend, &gateway, "card").await;
        assert!(matches!(result, Err(WizardError::PaymentDeclined(_))));
        assert_eq!(wizard.step(), WizardStep::Payment);
        assert!(backend.payments.lock().expect("lock").is_empty());
    }

    #[actix_web::test]
    async fn receipt_payment_stays_pending() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;
        let receipt = UploadedReceipt {
            filename: "receipt-1-2.png".to_string(),
            original_name: "gcash.png".to_string(),
            size: 1024,
            url: "/uploads/receipts/receipt-1-2.png".to_string(),
        };

        let payment = wizard
            .pay_with_receipt(&backend, &receipt, "gcash")
            .await
            .expect("recorded")
            .clone();

        assert_eq!(payment.payment_status, "pending");
        assert_eq!(payment.receipt_image.as_deref(), Some(receipt.url.as_str()));
        assert!(backend.status_updates.lock().expect("lock").is_empty());
        assert_eq!(
            wizard.appointment().and_then(|a| a.payment_id.clone()),
            Some(payment.id)
        );
    }

    #[actix_web::test]
    async fn payment_outside_payment_step_is_refused() {
        let backend = FakeBackend::default();
        let mut wizard = BookingWizard::new("user-1", today());
        let gateway = SimulatedGateway::new(1.0, Duration::ZERO);
        assert!(matches!(
            wizard.pay_direct(&backend, &gateway, "card").await,
            Err(WizardError::NotAtPayment)
        ));
    }

    #[actix_web::test]
    async fn cancel_clears_everything() {
        let backend = FakeBackend::default();
        let mut wizard = wizard_at_payment(&backend).await;
        wizard.cancel();
        assert_eq!(wizard.step(), WizardStep::Service);
        assert!(wizard.service().is_none());
        assert!(wizard.appointment().is_none());
        assert!(wizard.summary().is_none());
    }
}
