mod client;
mod pages;

pub use client::{build_headers, AirlineClient};
pub use pages::{
    classify_status, parse_confirmation, parse_itinerary, session_body, ApiFailure, CHECKED_IN_TITLE_KEY,
    CHECK_IN_PAGE, RESERVATION_PAGE,
};
