/// Check-in driver
/// Sleeps until each due instant, runs the attempt, retries transient
/// failures in place, and advances through the itinerary until it is done.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::checkin::{
    CheckInError, CheckInExecutor, CheckInInstant, CheckInOutcome, CheckInStateMachine, Phase,
    ScheduleState,
};
use crate::notify::Mailer;
use crate::orchestrator::{run_attempt, settle};
use crate::redact;

/// Longest single sleep; waits are recomputed against the wall clock after each
pub const MAX_SLEEP_CHUNK: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    /// Delay before retrying a transient failure at the same instant
    pub transient_retry: Duration,
    /// Retries allowed per leg before it is given up as a permanent failure
    pub max_transient_retries: u32,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            transient_retry: Duration::from_secs(30),
            max_transient_retries: 5,
        }
    }
}

/// How a driver run ended
#[derive(Debug)]
pub enum DriveResult {
    /// Every leg was processed
    Finished(ScheduleState),
    /// Shutdown was requested; the state can be resumed later
    Interrupted(ScheduleState),
}

/// Time left until `due`, or None if it is already due
pub fn time_until_due(due: &CheckInInstant, now: &DateTime<Utc>) -> Option<Duration> {
    due.at()
        .signed_duration_since(*now)
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

/// Sleep, returning false if cancelled first
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Drive a schedule to completion
pub async fn run_schedule<E, M>(
    machine: &CheckInStateMachine,
    executor: &E,
    mailer: &M,
    settings: DriverSettings,
    mut state: ScheduleState,
    cancel: CancellationToken,
) -> Result<DriveResult, CheckInError>
where
    E: CheckInExecutor,
    M: Mailer,
{
    let mut retries: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(DriveResult::Interrupted(state));
        }

        let due = match state.phase() {
            Phase::Done => {
                info!(
                    "All check-ins for {} processed",
                    redact::confirmation(state.identity.confirmation_code())
                );
                return Ok(DriveResult::Finished(state));
            }
            Phase::Waiting => {
                state = machine.advance(state)?;
                retries = 0;
                continue;
            }
            Phase::Scheduled(due) => due,
        };

        if let Some(wait) = time_until_due(&due, &Utc::now()) {
            info!("Next check-in at {} (in {})", due, format_duration(wait));
            if !sleep_or_cancel(wait.min(MAX_SLEEP_CHUNK), &cancel).await {
                return Ok(DriveResult::Interrupted(state));
            }
            continue;
        }

        debug!("Check-in due at {}, attempting now", due);
        let attempt = run_attempt(machine, executor, mailer, state).await?;
        state = attempt.state;

        if !attempt.step.retry_in_place {
            retries = 0;
            continue;
        }

        retries += 1;
        if retries > settings.max_transient_retries {
            warn!(
                "Check-in at {} still failing after {} retries; skipping this leg",
                due, settings.max_transient_retries
            );
            let reason = format!(
                "gave up after {} transient failures ({})",
                settings.max_transient_retries,
                attempt.outcome.label()
            );
            let (next, _) = settle(machine, mailer, state, &CheckInOutcome::PermanentFailure(reason)).await?;
            state = next;
            retries = 0;
            continue;
        }

        info!(
            "Retrying check-in in {} (attempt {}/{})",
            format_duration(settings.transient_retry),
            retries,
            settings.max_transient_retries
        );
        if !sleep_or_cancel(settings.transient_retry, &cancel).await {
            return Ok(DriveResult::Interrupted(state));
        }
    }
}
