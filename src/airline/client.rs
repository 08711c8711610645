use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pages::{
    classify_status, parse_confirmation, parse_itinerary, session_body, ApiFailure, CHECK_IN_PAGE,
    RESERVATION_PAGE,
};
use crate::checkin::{
    CheckInExecutor, CheckInOutcome, Identity, Itinerary, LookupError, Passenger, ReservationLookup,
};
use crate::config::Config;
use crate::redact;

/// Build the headers sent on every airline request
pub fn build_headers(config: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).context("AIRLINE_USER_AGENT is not a valid header value")?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    if let Some(key) = &config.airline_api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(key).context("AIRLINE_API_KEY is not a valid header value")?,
        );
    }

    for (name, value) in &config.airline_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{}' in AIRLINE_API_HEADERS", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{}' in AIRLINE_API_HEADERS", name))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Client for the airline's mobile API
pub struct AirlineClient {
    http: reqwest::Client,
    base_url: String,
}

impl AirlineClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(build_headers(config)?)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build airline HTTP client")?;

        Ok(Self {
            http,
            base_url: config.airline_base_url.clone(),
        })
    }

    /// URL of an API page, optionally scoped to a record locator
    pub fn page_url(&self, page: &str, confirmation: Option<&str>) -> String {
        match confirmation {
            Some(code) => format!("{}/{}/{}", self.base_url, page, urlencoding::encode(code)),
            None => format!("{}/{}", self.base_url, page),
        }
    }

    async fn get_page(&self, url: &str, lead: &Passenger) -> Result<String, ApiFailure> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("first-name", lead.first_name.as_str()),
                ("last-name", lead.last_name.as_str()),
            ])
            .send()
            .await
            .map_err(transport_failure)?;

        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<String, ApiFailure> {
    let status = response.status();
    let body = response.text().await.map_err(transport_failure)?;

    if status.is_success() {
        Ok(body)
    } else {
        let failure = classify_status(status.as_u16(), &body);
        debug!("Airline API returned {}: {:?}", status, failure);
        Err(failure)
    }
}

/// Timeouts, refused connections and truncated bodies are all worth retrying
fn transport_failure(err: reqwest::Error) -> ApiFailure {
    ApiFailure::Transient(format!("request failed: {}", err))
}

impl ReservationLookup for AirlineClient {
    async fn fetch(&self, identity: &Identity, lead: &Passenger) -> Result<Itinerary, LookupError> {
        let code = identity.confirmation_code();
        debug!("Fetching reservation {}", redact::confirmation(code));

        let url = self.page_url(RESERVATION_PAGE, Some(code));
        let body = self
            .get_page(&url, lead)
            .await
            .map_err(ApiFailure::into_lookup_error)?;

        let itinerary = parse_itinerary(&body)?;
        info!(
            "Reservation {} has {} flight(s)",
            redact::confirmation(code),
            itinerary.legs.len()
        );
        Ok(itinerary)
    }
}

impl CheckInExecutor for AirlineClient {
    async fn check_in(&self, passengers: &[Passenger], identity: &Identity) -> CheckInOutcome {
        let Some(lead) = passengers.first() else {
            return CheckInOutcome::PermanentFailure("no passengers to check in".to_string());
        };
        let code = identity.confirmation_code();

        info!(
            "Checking in {} passenger(s) on {}",
            passengers.len(),
            redact::confirmation(code)
        );

        // The GET hands out a session token inside the body we must POST back
        let session_page = match self.get_page(&self.page_url(CHECK_IN_PAGE, Some(code)), lead).await {
            Ok(body) => body,
            Err(failure) => return failure.into_outcome(),
        };
        let session = match session_body(&session_page) {
            Ok(session) => session,
            Err(msg) => {
                warn!("{}", msg);
                return CheckInOutcome::PermanentFailure(msg);
            }
        };

        let response = match self
            .http
            .post(self.page_url(CHECK_IN_PAGE, None))
            .json(&session)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e).into_outcome(),
        };

        match read_response(response).await {
            Ok(body) => parse_confirmation(&body),
            Err(failure) => failure.into_outcome(),
        }
    }
}
