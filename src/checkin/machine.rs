//! Check-in state machine
//!
//! AWAITING_LOOKUP -> SCHEDULED(due) -> ATTEMPTING -> SCHEDULED | DONE
//!
//! The machine never reads the clock and never sleeps. Whoever drives it
//! calls `advance` when a leg is due to be scheduled and `complete` with the
//! outcome of each attempt, then decides from the returned `Step` whether
//! to advance again, retry in place, or stop.

use chrono::{DateTime, TimeZone};
use std::future::Future;
use tracing::{debug, info, warn};

use super::planner::{Itinerary, ItineraryPlanner};
use super::state::{CheckInQueue, Identity, Passenger, ScheduleState};
use super::timemath::CheckInInstant;
use crate::redact;

/// Boarding assignment for one passenger on one flight
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardingPass {
    pub name: String,
    pub group: String,
    pub position: String,
}

/// What the airline handed back after a successful check-in
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoardingInfo {
    pub passes: Vec<BoardingPass>,
}

/// Classified result of one check-in attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckInOutcome {
    Success(BoardingInfo),
    /// Reservation no longer exists; nothing further can be checked in
    ReservationCancelled,
    /// Attempted before the window opened
    NotYetAvailable,
    /// Network trouble, throttling or a 5xx; retry at the same instant
    TransientFailure(String),
    /// The API answered in a way we do not understand; skip this leg
    PermanentFailure(String),
}

impl CheckInOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ReservationCancelled => "cancelled",
            Self::NotYetAvailable => "not_yet_available",
            Self::TransientFailure(_) => "transient_failure",
            Self::PermanentFailure(_) => "permanent_failure",
        }
    }
}

/// What the driver should do after `complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Nothing left to do for this reservation
    pub is_done: bool,
    /// The due instant was kept; attempt it again instead of advancing
    pub retry_in_place: bool,
}

impl Step {
    fn consumed(remaining: &CheckInQueue) -> Self {
        Self { is_done: remaining.is_empty(), retry_in_place: false }
    }

    fn retry() -> Self {
        Self { is_done: false, retry_in_place: true }
    }

    fn finished() -> Self {
        Self { is_done: true, retry_in_place: false }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("reservation not found")]
    NotFound,

    #[error("temporary lookup failure: {0}")]
    Transient(String),

    #[error("unexpected reservation response: {0}")]
    Contract(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckInError {
    #[error("lookup of reservation {confirmation} failed: {source}")]
    LookupFailed {
        confirmation: String,
        #[source]
        source: LookupError,
    },

    #[error("no check-in instants remain")]
    QueueExhausted,

    #[error("no check-in is due")]
    NothingDue,

    #[error("check-in at {0} is still due")]
    AlreadyDue(CheckInInstant),

    #[error("at least one passenger is required")]
    NoPassengers,
}

/// Fetches the itinerary for a reservation
pub trait ReservationLookup {
    fn fetch(
        &self,
        identity: &Identity,
        lead: &Passenger,
    ) -> impl Future<Output = Result<Itinerary, LookupError>> + Send;
}

/// Performs the check-in call for every passenger on a reservation
pub trait CheckInExecutor {
    fn check_in(
        &self,
        passengers: &[Passenger],
        identity: &Identity,
    ) -> impl Future<Output = CheckInOutcome> + Send;
}

/// Confirmation code as it may appear in logs
fn masked(identity: &Identity) -> String {
    redact::confirmation(identity.confirmation_code())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInStateMachine {
    planner: ItineraryPlanner,
}

impl CheckInStateMachine {
    pub fn new(planner: ItineraryPlanner) -> Self {
        Self { planner }
    }

    pub fn planner(&self) -> &ItineraryPlanner {
        &self.planner
    }

    /// Look up the reservation and build its first state.
    ///
    /// When any check-in instant lies after `now`, the soonest is already
    /// due in the returned state. Returns the itinerary too so callers can
    /// describe it (e.g. in a confirmation email).
    pub async fn start<L, Tz>(
        &self,
        lookup: &L,
        identity: Identity,
        passengers: Vec<Passenger>,
        notify_to: Option<String>,
        now: &DateTime<Tz>,
    ) -> Result<(ScheduleState, Itinerary), CheckInError>
    where
        L: ReservationLookup,
        Tz: TimeZone,
    {
        let lead = passengers.first().ok_or(CheckInError::NoPassengers)?;

        info!("Looking up reservation {}", masked(&identity));
        let itinerary = lookup
            .fetch(&identity, lead)
            .await
            .map_err(|source| CheckInError::LookupFailed {
                confirmation: identity.confirmation_code().to_string(),
                source,
            })?;

        let plan = self.planner.plan(&itinerary, now, false);
        let state = self.schedule(identity, passengers, notify_to, plan)?;
        Ok((state, itinerary))
    }

    /// Build a state from an already planned queue, advancing once if
    /// anything is queued
    pub fn schedule(
        &self,
        identity: Identity,
        passengers: Vec<Passenger>,
        notify_to: Option<String>,
        plan: Vec<CheckInInstant>,
    ) -> Result<ScheduleState, CheckInError> {
        if passengers.is_empty() {
            return Err(CheckInError::NoPassengers);
        }

        let state = ScheduleState {
            identity,
            passengers,
            notify_to,
            remaining: CheckInQueue::from(plan),
            due: None,
        };

        info!(
            "Scheduled {} check-in(s) for {}",
            state.remaining.len(),
            masked(&state.identity)
        );

        if state.remaining.is_empty() {
            warn!("No upcoming check-ins for {}", masked(&state.identity));
            return Ok(state);
        }
        self.advance(state)
    }

    /// Pop the soonest remaining instant into the due slot.
    ///
    /// The due slot must be empty: only a consuming `complete` clears it.
    pub fn advance(&self, mut state: ScheduleState) -> Result<ScheduleState, CheckInError> {
        if let Some(due) = state.due {
            return Err(CheckInError::AlreadyDue(due));
        }
        let next = state.remaining.pop_soonest().ok_or(CheckInError::QueueExhausted)?;
        state.due = Some(next);
        debug!(
            "Next check-in for {} at {} ({} after)",
            masked(&state.identity),
            next,
            state.remaining.len()
        );
        Ok(state)
    }

    /// Apply the outcome of an attempt at the due instant
    pub fn complete(
        &self,
        mut state: ScheduleState,
        outcome: &CheckInOutcome,
    ) -> Result<(ScheduleState, Step), CheckInError> {
        let due = state.due.ok_or(CheckInError::NothingDue)?;

        let step = match outcome {
            CheckInOutcome::Success(info) => {
                info!("Checked in {} at {} ({} boarding passes)", masked(&state.identity), due, info.passes.len());
                state.due = None;
                Step::consumed(&state.remaining)
            }
            CheckInOutcome::ReservationCancelled => {
                warn!(
                    "Reservation {} not found, it may have been cancelled; dropping {} remaining check-in(s)",
                    masked(&state.identity),
                    state.remaining.len()
                );
                state.due = None;
                state.remaining.clear();
                Step::finished()
            }
            CheckInOutcome::NotYetAvailable => {
                warn!("Check-in for {} not open yet at {}; will retry", masked(&state.identity), due);
                Step::retry()
            }
            CheckInOutcome::TransientFailure(reason) => {
                warn!("Transient check-in failure for {} at {}: {}", masked(&state.identity), due, reason);
                Step::retry()
            }
            CheckInOutcome::PermanentFailure(reason) => {
                warn!("Check-in for {} at {} failed permanently: {}", masked(&state.identity), due, reason);
                state.due = None;
                Step::consumed(&state.remaining)
            }
        };

        Ok((state, step))
    }
}
