mod app;

use anyhow::Result;
use std::process::ExitCode;

use app::App;
use pulse_core::{AppError, Config, ConfigError};
use pulse_location::{AcquireOutcome, GateView, Location};

const USAGE: &str = "usage: citypulse [status | search <place> | reset]";

#[derive(Debug, PartialEq)]
enum Command {
    Status,
    Search(String),
    Reset,
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        match args {
            [] => Some(Command::Status),
            [cmd] if cmd == "status" => Some(Command::Status),
            [cmd] if cmd == "reset" => Some(Command::Reset),
            [cmd, rest @ ..] if cmd == "search" && !rest.is_empty() => {
                Some(Command::Search(rest.join(" ")))
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    pulse_core::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::FAILURE);
    };

    let config = match Config::load_validated() {
        Ok((config, _validation)) => config,
        Err(e) => {
            report(&ConfigError::Invalid(format!("{:#}", e)).into());
            return Ok(ExitCode::FAILURE);
        }
    };

    let app = App::new(config)?;
    tracing::info!("CityPulse started");
    tracing::debug!("Config directory: {}", app.config().config_dir.display());

    app.boot().await;

    let code = match command {
        Command::Status => {
            print_gate(&app.gate(), &app.location());
            gate_code(&app.gate())
        }
        Command::Search(query) => match app.search(&query).await {
            Ok(Some(location)) => {
                println!("Location set to {}", describe(&location));
                ExitCode::SUCCESS
            }
            Ok(None) => {
                eprintln!("{}", USAGE);
                ExitCode::FAILURE
            }
            Err(e) => {
                report(&e.into());
                ExitCode::FAILURE
            }
        },
        Command::Reset => {
            if let AcquireOutcome::Denied(e) = app.reset().await {
                tracing::debug!("Reset ended denied: {}", e);
            }
            print_gate(&app.gate(), &app.location());
            gate_code(&app.gate())
        }
    };

    Ok(code)
}

/// Log the full error and show the user-facing message
fn report(err: &AppError) {
    tracing::error!("{}", err);
    eprintln!("{}", err.user_message());
}

fn describe(location: &Location) -> String {
    format!(
        "{} ({:.4}, {:.4})",
        location.display_label(),
        location.latitude,
        location.longitude
    )
}

fn print_gate(view: &GateView, location: &Location) {
    if view.is_open() {
        println!("{}", describe(location));
        return;
    }

    if let Some(title) = view.title() {
        println!("{}", title);
    }
    if let Some(message) = view.message() {
        println!("  {}", message);
    }
    if let Some(action) = view.retry_action() {
        println!("  Run `citypulse reset` to {}.", action.to_lowercase());
    }
}

fn gate_code(view: &GateView) -> ExitCode {
    if view.is_open() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])), Some(Command::Status));
        assert_eq!(Command::parse(&args(&["status"])), Some(Command::Status));
        assert_eq!(Command::parse(&args(&["reset"])), Some(Command::Reset));
        assert_eq!(
            Command::parse(&args(&["search", "New", "York"])),
            Some(Command::Search("New York".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(Command::parse(&args(&["search"])), None);
        assert_eq!(Command::parse(&args(&["locate"])), None);
        assert_eq!(Command::parse(&args(&["status", "now"])), None);
    }

    #[test]
    fn test_describe_uses_coordinates_without_label() {
        let location = Location::new(51.5074, -0.1278, "").unwrap();
        assert_eq!(describe(&location), "51.5074, -0.1278 (51.5074, -0.1278)");
    }
}
