mod machine;
mod planner;
mod state;
mod timemath;

#[cfg(test)]
mod model;

pub use machine::{
    BoardingInfo, BoardingPass, CheckInError, CheckInExecutor, CheckInOutcome, CheckInStateMachine,
    LookupError, ReservationLookup, Step,
};
pub use planner::{FlightLeg, Itinerary, ItineraryPlanner};
pub use state::{CheckInQueue, Identity, Passenger, Phase, ScheduleState, StateError};
pub use timemath::{
    check_in_instant, dispatch_minute, minute_timestamp, parse_departure, CheckInInstant,
    CHECK_IN_WINDOW_HOURS, DEFAULT_SKEW_SECS,
};
