use reqwest::{multipart, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::ClientError;
use crate::models::{
    ApiResponse, AppointmentDetailRow, AppointmentRow, BarberRow, Dashboard, NewAppointment,
    NewPayment, PaymentDetailRow, PaymentMethodRow, PaymentRow, ServiceRow, UploadedReceipt,
    UserProfile,
};

/// Thin typed wrapper over the REST API. Admin calls send the Basic
/// credentials set with [`ApiClient::with_admin`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    admin: Option<(String, String)>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin: None,
        }
    }

    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin = Some((email.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin_request(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin {
            Some((email, password)) => request.basic_auth(email, Some(password)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiResponse<serde_json::Value>>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<ApiResponse<T>>().await?)
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.send(request).await?.data.ok_or(ClientError::MissingData)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        self.data(self.http.post(self.url("/api/auth/register")).json(&body))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.data(self.http.post(self.url("/api/auth/login")).json(&body))
            .await
    }

    pub async fn services(&self) -> Result<Vec<ServiceRow>, ClientError> {
        self.data(self.http.get(self.url("/api/services"))).await
    }

    pub async fn barbers(&self) -> Result<Vec<BarberRow>, ClientError> {
        self.data(self.http.get(self.url("/api/barbers"))).await
    }

    pub async fn create_appointment(
        &self,
        request: &NewAppointment,
    ) -> Result<AppointmentRow, ClientError> {
        self.data(self.http.post(self.url("/api/appointments")).json(request))
            .await
    }

    pub async fn user_appointments(
        &self,
        user_id: &str,
    ) -> Result<Vec<AppointmentDetailRow>, ClientError> {
        let url = self.url(&format!("/api/appointments/user/{user_id}"));
        self.data(self.http.get(url)).await
    }

    pub async fn cancel_appointment(&self, appointment_id: &str) -> Result<AppointmentRow, ClientError> {
        let url = self.url(&format!("/api/appointments/{appointment_id}/cancel"));
        self.data(self.http.put(url)).await
    }

    pub async fn create_payment(&self, request: &NewPayment) -> Result<PaymentRow, ClientError> {
        self.data(self.http.post(self.url("/api/payments")).json(request))
            .await
    }

    pub async fn update_payment_status(
        &self,
        payment_id: &str,
        status: &str,
    ) -> Result<PaymentRow, ClientError> {
        let url = self.url(&format!("/api/payments/{payment_id}/status"));
        let body = json!({ "payment_status": status });
        self.data(self.http.put(url).json(&body)).await
    }

    pub async fn user_payments(&self, user_id: &str) -> Result<Vec<PaymentDetailRow>, ClientError> {
        let url = self.url(&format!("/api/payments/user/{user_id}"));
        self.data(self.http.get(url)).await
    }

    pub async fn payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethodRow>, ClientError> {
        let url = self.url(&format!("/api/payments/methods/{user_id}"));
        self.data(self.http.get(url)).await
    }

    pub async fn upload_receipt(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedReceipt, ClientError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("receipt", part);
        self.data(self.http.post(self.url("/api/upload/receipt")).multipart(form))
            .await
    }

    pub async fn all_appointments(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<AppointmentDetailRow>, ClientError> {
        let mut request = self.http.get(self.url("/api/appointments"));
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        self.data(self.admin_request(request)).await
    }

    pub async fn update_appointment_status(
        &self,
        appointment_id: &str,
        status: &str,
    ) -> Result<AppointmentRow, ClientError> {
        let url = self.url(&format!("/api/appointments/{appointment_id}/status"));
        let request = self.http.put(url).json(&json!({ "status": status }));
        self.data(self.admin_request(request)).await
    }

    pub async fn pending_payments(&self) -> Result<Vec<PaymentDetailRow>, ClientError> {
        let request = self.http.get(self.url("/api/payments/admin/pending"));
        self.data(self.admin_request(request)).await
    }

    /// `decision` is `approved` or `rejected`.
    pub async fn verify_payment(
        &self,
        payment_id: &str,
        decision: &str,
        notes: Option<&str>,
    ) -> Result<PaymentRow, ClientError> {
        let url = self.url(&format!("/api/payments/{payment_id}/verify"));
        let request = self
            .http
            .put(url)
            .json(&json!({ "status": decision, "notes": notes }));
        self.data(self.admin_request(request)).await
    }

    pub async fn dashboard(&self) -> Result<Dashboard, ClientError> {
        let request = self.http.get(self.url("/api/admin/dashboard"));
        self.data(self.admin_request(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/api/services"), "http://localhost:3000/api/services");
    }
}
