/// Response shapes of the airline's mobile API and how they map onto the
/// check-in domain. Everything here is pure so it can be tested without a
/// server.

use serde::Deserialize;
use serde_json::Value;

use crate::checkin::{
    parse_departure, BoardingInfo, BoardingPass, CheckInOutcome, FlightLeg, Itinerary, LookupError,
};

pub const RESERVATION_PAGE: &str = "mobile-air-booking/v1/mobile-air-booking/page/view-reservation";
pub const CHECK_IN_PAGE: &str = "mobile-air-operations/v1/mobile-air-operations/page/check-in";

/// Title key of a confirmed check-in
pub const CHECKED_IN_TITLE_KEY: &str = "CHECKIN__YOURE_CHECKEDIN";

/// Error codes the API uses when check-in has not opened yet
const WINDOW_NOT_OPEN_CODES: &[&str] = &[
    "ERROR__AIR_TRAVEL__BEFORE_CHECKIN_WINDOW",
    "ERROR__CHECKIN_NOT_AVAILABLE",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationPage {
    view_reservation_view_page: ViewReservation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewReservation {
    share_details: ShareDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareDetails {
    flight_info: Vec<FlightInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightInfo {
    departure_date_time: String,
    #[serde(default)]
    flight_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInSessionPage {
    check_in_view_reservation_page: CheckInViewReservation,
}

#[derive(Debug, Deserialize)]
struct CheckInViewReservation {
    #[serde(rename = "_links")]
    links: CheckInLinks,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckInLinks {
    check_in: CheckInLink,
}

#[derive(Debug, Deserialize)]
struct CheckInLink {
    body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationPage {
    check_in_confirmation_page: Confirmation,
}

#[derive(Debug, Deserialize)]
struct Confirmation {
    title: Title,
    #[serde(default)]
    flights: Vec<ConfirmedFlight>,
}

#[derive(Debug, Deserialize)]
struct Title {
    key: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmedFlight {
    #[serde(default)]
    passengers: Vec<ConfirmedPassenger>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmedPassenger {
    name: String,
    #[serde(default)]
    boarding_group: Option<String>,
    #[serde(default)]
    boarding_position: Option<String>,
}

/// A non-2xx response or a failed request, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailure {
    /// 404: the reservation does not exist (any more)
    NotFound,
    /// 429, 5xx, timeouts and connection errors
    Transient(String),
    /// The API says check-in has not opened yet
    NotYetAvailable(String),
    /// Anything else
    Permanent(String),
}

impl ApiFailure {
    pub fn into_lookup_error(self) -> LookupError {
        match self {
            ApiFailure::NotFound => LookupError::NotFound,
            ApiFailure::Transient(msg) => LookupError::Transient(msg),
            ApiFailure::NotYetAvailable(msg) | ApiFailure::Permanent(msg) => LookupError::Contract(msg),
        }
    }

    pub fn into_outcome(self) -> CheckInOutcome {
        match self {
            ApiFailure::NotFound => CheckInOutcome::ReservationCancelled,
            ApiFailure::Transient(msg) => CheckInOutcome::TransientFailure(msg),
            ApiFailure::NotYetAvailable(_) => CheckInOutcome::NotYetAvailable,
            ApiFailure::Permanent(msg) => CheckInOutcome::PermanentFailure(msg),
        }
    }
}

/// Classify an error response by status code and body
pub fn classify_status(status: u16, body: &str) -> ApiFailure {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| reason_phrase(status).to_string());
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .map(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    match status {
        404 => ApiFailure::NotFound,
        // Throttled, or the request headers have expired
        429 => ApiFailure::Transient(format!("status_code=429 msg=\"{}\"", message)),
        500..=599 => ApiFailure::Transient(format!("status_code={} msg=\"{}\"", status, message)),
        _ if window_not_open(code.as_deref(), &message) => ApiFailure::NotYetAvailable(message),
        _ => ApiFailure::Permanent(format!("status_code={} msg=\"{}\"", status, message)),
    }
}

fn window_not_open(code: Option<&str>, message: &str) -> bool {
    if let Some(code) = code {
        if WINDOW_NOT_OPEN_CODES.contains(&code) {
            return true;
        }
    }
    let lower = message.to_lowercase();
    lower.contains("not yet available") || lower.contains("before check-in opens") || lower.contains("too early")
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Flight legs from a view-reservation page, in listed order
pub fn parse_itinerary(body: &str) -> Result<Itinerary, LookupError> {
    let page: ReservationPage = serde_json::from_str(body)
        .map_err(|e| LookupError::Contract(format!("reservation page: {}", e)))?;

    let legs = page
        .view_reservation_view_page
        .share_details
        .flight_info
        .into_iter()
        .map(|flight| {
            let departure = parse_departure(&flight.departure_date_time).map_err(|e| {
                LookupError::Contract(format!(
                    "departure time '{}': {}",
                    flight.departure_date_time, e
                ))
            })?;
            let leg = FlightLeg::new(departure);
            Ok(match flight.flight_number {
                Some(number) => leg.with_label(number),
                None => leg,
            })
        })
        .collect::<Result<Vec<_>, LookupError>>()?;

    Ok(Itinerary::new(legs))
}

/// The POST body the check-in page hands back with its session token
pub fn session_body(body: &str) -> Result<Value, String> {
    serde_json::from_str::<CheckInSessionPage>(body)
        .map(|page| page.check_in_view_reservation_page.links.check_in.body)
        .map_err(|e| format!("Error getting check-in session: {}", e))
}

/// Outcome of the check-in POST
pub fn parse_confirmation(body: &str) -> CheckInOutcome {
    let page: ConfirmationPage = match serde_json::from_str(body) {
        Ok(page) => page,
        Err(e) => return CheckInOutcome::PermanentFailure(format!("confirmation page: {}", e)),
    };

    let confirmation = page.check_in_confirmation_page;
    if confirmation.title.key != CHECKED_IN_TITLE_KEY {
        return CheckInOutcome::PermanentFailure(format!(
            "Check in failed. title={}",
            confirmation.title.key
        ));
    }

    let passes = confirmation
        .flights
        .into_iter()
        .flat_map(|flight| flight.passengers)
        .map(|p| BoardingPass {
            name: p.name,
            group: p.boarding_group.unwrap_or_default(),
            position: p.boarding_position.unwrap_or_default(),
        })
        .collect();

    CheckInOutcome::Success(BoardingInfo { passes })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Arbitrary bodies never panic any parser
        #[test]
        fn parsers_never_panic(body in ".*") {
            let _ = parse_itinerary(&body);
            let _ = session_body(&body);
            let _ = parse_confirmation(&body);
        }

        /// 5xx is always transient whatever the body says
        #[test]
        fn server_errors_transient(status in 500u16..600u16, body in ".*") {
            prop_assert!(matches!(classify_status(status, &body), ApiFailure::Transient(_)));
        }

        /// Only 404 maps to not found
        #[test]
        fn not_found_only_for_404(status in 400u16..600u16, body in ".*") {
            let failure = classify_status(status, &body);
            prop_assert_eq!(failure == ApiFailure::NotFound, status == 404);
        }
    }
}
