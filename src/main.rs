use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use earlybird::airline::AirlineClient;
use earlybird::checkin::{CheckInStateMachine, ItineraryPlanner, ReservationLookup, ScheduleState};
use earlybird::cli::{self, Mode};
use earlybird::config::Config;
use earlybird::notify::Notifier;
use earlybird::orchestrator::{plan_listing, run_name, schedule_reservation};
use earlybird::redact;
use earlybird::scheduler::{run_schedule, DriveResult, DriverSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if args.mode() == Mode::Help {
        cli::print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("earlybird=info".parse().context("invalid log directive")?),
        )
        .init();

    info!("earlybird v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Airline API: {}", config.airline_base_url);
    info!("  Check-in skew: {}s", config.check_in_skew_secs);
    info!(
        "  Email: {}",
        match &config.mail {
            Some(mail) => format!("enabled (from {})", redact::email(&mail.from)),
            None => "disabled (messages are logged)".to_string(),
        }
    );

    let validation = config.validate();
    if args.mode() == Mode::Validate {
        info!("Validating configuration...");
        return match validation {
            Ok(()) => {
                info!("Configuration is valid");
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        };
    }
    validation?;

    let machine = CheckInStateMachine::new(ItineraryPlanner::new(config.check_in_skew_secs));
    let airline = AirlineClient::new(&config)?;
    let notifier = Notifier::new(&config);
    let settings = DriverSettings {
        transient_retry: Duration::from_secs(config.transient_retry_secs),
        max_transient_retries: config.max_transient_retries,
    };

    let state = match args.mode() {
        Mode::Plan => {
            let request = args.check_in_request()?;
            let lead = request
                .passengers
                .first()
                .context("At least one passenger is required")?;
            let itinerary = airline
                .fetch(&request.identity, lead)
                .await
                .with_context(|| {
                    format!(
                        "Lookup of reservation {} failed",
                        redact::confirmation(request.identity.confirmation_code())
                    )
                })?;
            let plan = machine.planner().plan(&itinerary, &Utc::now(), args.include_expired);
            println!("{}", serde_json::to_string_pretty(&plan_listing(&plan))?);
            return Ok(());
        }
        Mode::Resume(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read schedule from {}", path))?;
            let state = ScheduleState::from_json(&raw)
                .with_context(|| format!("Invalid schedule in {}", path))?;
            info!(
                "Resuming {} ({} check-in(s) left)",
                redact::confirmation(state.identity.confirmation_code()),
                state.remaining.len() + usize::from(state.due.is_some())
            );
            state
        }
        Mode::Schedule => {
            let request = args.check_in_request()?;
            let (state, _) = schedule_reservation(&machine, &airline, &notifier, request, &Utc::now()).await?;
            state
        }
        Mode::Help | Mode::Validate => return Ok(()),
    };

    let name = match state.lead_passenger() {
        Some(lead) => run_name(lead, &mut rand::thread_rng()),
        None => format!("{}-run", state.identity.confirmation_code().to_lowercase()),
    };

    // Ctrl-C stops the driver; the state it hands back can be resumed
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let result = run_schedule(&machine, &airline, &notifier, settings, state, cancel)
        .instrument(info_span!("run", name = %name))
        .await?;

    match result {
        DriveResult::Finished(_) => {
            info!("Done");
        }
        DriveResult::Interrupted(state) => {
            warn!("Stopped before finishing; resume with --resume and this state:");
            println!("{}", state.to_json()?);
        }
    }

    Ok(())
}
