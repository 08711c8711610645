//! Check-in orchestration
//!
//! Glues the state machine to its collaborators: the airline for lookups and
//! check-ins, and the mailer for telling the traveler what happened.

use chrono::{DateTime, TimeZone};
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::checkin::{
    minute_timestamp, CheckInError, CheckInExecutor, CheckInInstant, CheckInOutcome,
    CheckInStateMachine, Identity, Itinerary, Passenger, ReservationLookup, ScheduleState, Step,
};
use crate::notify::{send_best_effort, Mailer};
use crate::redact;
use crate::templates;

/// A new check-in request
#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub identity: Identity,
    pub passengers: Vec<Passenger>,
    pub notify_to: Option<String>,
    pub send_confirmation: bool,
}

/// Result of one attempt, after the machine has consumed it
#[derive(Debug, Clone)]
pub struct Attempt {
    pub state: ScheduleState,
    pub step: Step,
    pub outcome: CheckInOutcome,
}

/// One row of `--plan` output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCheckIn {
    pub check_in: CheckInInstant,
    pub dispatch_minute: String,
    pub minute_timestamp: i64,
    pub local: String,
}

/// Describe planned instants soonest first, with the minute bucket a
/// minute-granularity dispatcher would file each one under
pub fn plan_listing(plan: &[CheckInInstant]) -> Vec<PlannedCheckIn> {
    let mut rows: Vec<PlannedCheckIn> = plan
        .iter()
        .map(|instant| PlannedCheckIn {
            check_in: *instant,
            dispatch_minute: instant.dispatch_minute().to_rfc3339(),
            minute_timestamp: minute_timestamp(&instant.at()),
            local: instant.day_datetime_string(),
        })
        .collect();
    rows.sort_by(|a, b| a.check_in.cmp(&b.check_in));
    rows
}

/// Human-readable run name, e.g. `bush-george-3fa2c901`
pub fn run_name<R: Rng>(lead: &Passenger, rng: &mut R) -> String {
    let slug = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect()
    };
    format!(
        "{}-{}-{:08x}",
        slug(&lead.last_name),
        slug(&lead.first_name),
        rng.gen::<u32>()
    )
}

/// Look up a reservation, build its schedule and send the scheduled email
pub async fn schedule_reservation<L, M, Tz>(
    machine: &CheckInStateMachine,
    lookup: &L,
    mailer: &M,
    request: CheckInRequest,
    now: &DateTime<Tz>,
) -> Result<(ScheduleState, Itinerary), CheckInError>
where
    L: ReservationLookup,
    M: Mailer,
    Tz: TimeZone,
{
    let send_confirmation = request.send_confirmation;
    let (state, itinerary) = machine
        .start(lookup, request.identity, request.passengers, request.notify_to, now)
        .await?;

    if state.due.is_none() {
        warn!(
            "Reservation {} has no upcoming check-ins ({} flight(s) found)",
            redact::confirmation(state.identity.confirmation_code()),
            itinerary.legs.len()
        );
    } else if send_confirmation {
        let message = templates::scheduled_from_queue(&state.identity, state.due, &state.remaining);
        send_best_effort(mailer, state.notify_to.as_deref(), &message).await;
    }

    Ok((state, itinerary))
}

/// Check in at the due instant and apply the outcome
pub async fn run_attempt<E, M>(
    machine: &CheckInStateMachine,
    executor: &E,
    mailer: &M,
    state: ScheduleState,
) -> Result<Attempt, CheckInError>
where
    E: CheckInExecutor,
    M: Mailer,
{
    if state.due.is_none() {
        return Err(CheckInError::NothingDue);
    }

    let outcome = executor.check_in(&state.passengers, &state.identity).await;
    info!("Check-in attempt finished: {}", outcome.label());

    let (state, step) = settle(machine, mailer, state, &outcome).await?;
    Ok(Attempt { state, step, outcome })
}

/// Feed an outcome to the machine and send whatever email it calls for
pub async fn settle<M: Mailer>(
    machine: &CheckInStateMachine,
    mailer: &M,
    state: ScheduleState,
    outcome: &CheckInOutcome,
) -> Result<(ScheduleState, Step), CheckInError> {
    let identity = state.identity.clone();
    let lead = state.lead_passenger().cloned();
    let (state, step) = machine.complete(state, outcome)?;
    let to = state.notify_to.as_deref();

    match outcome {
        CheckInOutcome::Success(info) => {
            for pass in &info.passes {
                info!(
                    "{} boards at {}{}",
                    redact::name(&pass.name),
                    pass.group,
                    pass.position
                );
            }
            send_best_effort(mailer, to, &templates::boarding(&identity, info)).await;
        }
        CheckInOutcome::ReservationCancelled => {
            send_best_effort(mailer, to, &templates::cancelled(&identity)).await;
        }
        CheckInOutcome::PermanentFailure(reason) => {
            error!(
                "Giving up on this leg of {}: {}",
                redact::confirmation(identity.confirmation_code()),
                reason
            );
            if step.is_done {
                match &lead {
                    Some(lead) => {
                        send_best_effort(mailer, to, &templates::failure(&identity, lead)).await
                    }
                    None => warn!("No passenger on record; cannot build failure email"),
                }
            }
        }
        CheckInOutcome::NotYetAvailable | CheckInOutcome::TransientFailure(_) => {}
    }

    Ok((state, step))
}
