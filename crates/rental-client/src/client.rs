//! Rental API HTTP client.

use crate::backend::RentalBackend;
use crate::error::RentalApiError;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

/// Rental API client.
///
/// The API key is kept in a `SecretString` so it never shows up in logs
/// or debug output.
#[derive(Clone)]
pub struct RentalClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl RentalClient {
    /// Create a new client. `timeout` bounds every request independently of
    /// the poll cadence.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RentalApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: SecretString::new(api_key.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )
    }

    fn rental_url(&self, request_id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/rentals/{}/{}", self.base_url, encode(request_id), action),
            None => format!("{}/rentals/{}", self.base_url, encode(request_id)),
        }
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RentalApiError> {
        if response.status().is_success() {
            let body = response.text().await?;
            debug!("Response body: {}", body.chars().take(200).collect::<String>());
            serde_json::from_str(&body).map_err(RentalApiError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Map a failed response onto the error taxonomy.
    async fn extract_error(&self, response: reqwest::Response) -> RentalApiError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body.message.unwrap_or(text);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Authentication failed");
                RentalApiError::Unauthorized
            }
            StatusCode::NOT_FOUND => RentalApiError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limit exceeded");
                RentalApiError::RateLimited
            }
            s if s.is_server_error() => RentalApiError::Api {
                status: s.as_u16(),
                message,
            },
            s => rejection(s.as_u16(), body.error.as_deref(), message),
        }
    }
}

/// Classify a refusal by the API's error code.
fn rejection(status: u16, code: Option<&str>, message: String) -> RentalApiError {
    match code {
        Some("NO_NUMBERS_AVAILABLE") => RentalApiError::NoNumbersAvailable(message),
        Some("INVALID_PROVIDER") => RentalApiError::InvalidProvider(message),
        _ => RentalApiError::Rejected { status, message },
    }
}

#[async_trait]
impl RentalBackend for RentalClient {
    #[instrument(skip(self), fields(provider = %request.provider))]
    async fn create_rental(
        &self,
        request: &CreateRentalRequest,
    ) -> Result<CreateRentalResponse, RentalApiError> {
        let response = self
            .authorized(self.client.post(format!("{}/rentals", self.base_url)))
            .json(request)
            .send()
            .await?;

        // A refused rental comes back as 200 without the rental fields.
        let body: serde_json::Value = self.handle_response(response).await?;
        let refused: ErrorBody = serde_json::from_value(body.clone()).unwrap_or_default();
        if !refused.success {
            let message = refused
                .message
                .unwrap_or_else(|| "rental was not created".into());
            warn!("Rental refused: {}", message);
            return Err(rejection(200, refused.error.as_deref(), message));
        }
        let created: CreateRentalResponse = serde_json::from_value(body)?;

        debug!("Allocated {} as {}", created.phone_number, created.session_id);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn check_otp(&self, request_id: &str) -> Result<CheckOtpResponse, RentalApiError> {
        let response = self
            .authorized(self.client.post(self.rental_url(request_id, Some("check-otp"))))
            .json(&EmptyBody {})
            .send()
            .await?;

        let checked: CheckOtpResponse = self.handle_response(response).await?;
        if !checked.success {
            return Err(RentalApiError::Rejected {
                status: 200,
                message: checked.message.unwrap_or_else(|| "check rejected".into()),
            });
        }

        Ok(checked)
    }

    #[instrument(skip(self))]
    async fn get_session(&self, request_id: &str) -> Result<RemoteSession, RentalApiError> {
        let response = self
            .authorized(self.client.get(self.rental_url(request_id, None)))
            .send()
            .await?;

        self.handle_response::<SessionEnvelope>(response)
            .await
            .map(|envelope| envelope.session)
    }

    #[instrument(skip(self))]
    async fn list_sessions(&self) -> Result<Vec<RemoteSession>, RentalApiError> {
        let response = self
            .authorized(self.client.get(format!("{}/rentals", self.base_url)))
            .send()
            .await?;

        let list: SessionList = self.handle_response(response).await?;
        debug!("Listed {} sessions", list.sessions.len());
        Ok(list.sessions)
    }

    #[instrument(skip(self))]
    async fn cancel_rental(&self, request_id: &str) -> Result<(), RentalApiError> {
        let response = self
            .authorized(self.client.post(self.rental_url(request_id, Some("cancel"))))
            .json(&EmptyBody {})
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }
        Ok(())
    }
}
