use std::process::ExitCode;

use one_monitor::{
    cli::parse_args,
    monitor::{self, Monitor},
    runtime::Locations,
};

fn main() -> ExitCode {
    let args = parse_args();
    let locations = Locations::from_env();

    if args.check {
        return check(&locations);
    }

    match Monitor::new(locations).start() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            // Once logging is up the controller has already recorded the error.
            if !tracing::dispatcher::has_been_set() {
                eprintln!("{err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn check(locations: &Locations) -> ExitCode {
    let report = match monitor::check(locations) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to render configuration: {err}");
            ExitCode::FAILURE
        }
    }
}
