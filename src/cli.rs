//! Command-line argument parsing for earlybird

use anyhow::{bail, Context, Result};

use crate::checkin::{Identity, Passenger};
use crate::config::Config;
use crate::orchestrator::CheckInRequest;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub confirmation: Option<String>,
    /// (first, last) pairs; the first is the lead passenger
    pub names: Vec<(String, String)>,
    pub email: Option<String>,
    pub no_confirmation_email: bool,
    pub resume: Option<String>,
    pub plan: bool,
    pub include_expired: bool,
    pub validate: bool,
    pub help: bool,
}

/// What the binary should do
#[derive(Debug, PartialEq)]
pub enum Mode {
    Help,
    Validate,
    /// Print planned check-in times and exit
    Plan,
    /// Continue a persisted schedule
    Resume(String),
    /// Look up and schedule a new reservation
    Schedule,
}

pub fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// Parse arguments; `args[0]` is the program name
pub fn parse_args_from(args: &[String]) -> Result<Args> {
    let mut result = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--confirmation" | "-c" => {
                result.confirmation = Some(take_value(args, &mut i, "--confirmation")?);
            }
            "--name" | "-n" => {
                let first = take_value(args, &mut i, "--name")?;
                let last = take_value(args, &mut i, "--name")
                    .context("--name needs both FIRST and LAST")?;
                result.names.push((first, last));
            }
            "--email" | "-e" => result.email = Some(take_value(args, &mut i, "--email")?),
            "--no-confirmation-email" => result.no_confirmation_email = true,
            "--resume" => result.resume = Some(take_value(args, &mut i, "--resume")?),
            "--plan" => result.plan = true,
            "--include-expired" => result.include_expired = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            other => bail!("Unknown argument '{}'. Try --help.", other),
        }
        i += 1;
    }

    Ok(result)
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    match args.get(*i + 1) {
        Some(value) if !value.starts_with("--") => {
            *i += 1;
            Ok(value.clone())
        }
        _ => bail!("{} requires a value", flag),
    }
}

impl Args {
    pub fn mode(&self) -> Mode {
        if self.help {
            Mode::Help
        } else if self.validate {
            Mode::Validate
        } else if self.plan {
            Mode::Plan
        } else if let Some(path) = &self.resume {
            Mode::Resume(path.clone())
        } else {
            Mode::Schedule
        }
    }

    /// Build a check-in request from --confirmation, --name and --email
    pub fn check_in_request(&self) -> Result<CheckInRequest> {
        let code = self.confirmation.as_deref().context("--confirmation is required")?;
        let identity = Identity::new(code)?;

        if self.names.is_empty() {
            bail!("At least one --name FIRST LAST is required");
        }
        let passengers = self
            .names
            .iter()
            .map(|(first, last)| Passenger::new(first, last))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(email) = &self.email {
            if !Config::looks_like_email(email) {
                bail!("--email '{}' is not an email address", email);
            }
        }

        Ok(CheckInRequest {
            identity,
            passengers,
            notify_to: self.email.clone(),
            send_confirmation: !self.no_confirmation_email,
        })
    }
}

pub fn print_help() {
    println!("earlybird - automatic airline check-in\n");
    println!("USAGE:");
    println!("    earlybird --confirmation CODE --name FIRST LAST [--name FIRST LAST ...] [OPTIONS]");
    println!("    earlybird --resume FILE\n");
    println!("OPTIONS:");
    println!("    --confirmation, -c CODE   6-character confirmation number");
    println!("    --name, -n FIRST LAST     Passenger name (repeatable; the first is used for lookup)");
    println!("    --email, -e ADDR          Where to send notifications");
    println!("    --no-confirmation-email   Don't email the scheduled check-in times");
    println!("    --resume FILE             Continue from a saved schedule (JSON)");
    println!("    --plan                    Print the check-in times and exit");
    println!("    --include-expired         With --plan, include check-in times already past");
    println!("    --validate                Validate configuration and exit");
    println!("    --help, -h                Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    See .env.example for configuration variables");
}
