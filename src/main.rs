use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info};

use cdb_snap_crab::app::{App, RunConfig, RunSummary};
use cdb_snap_crab::cli::Args;
use cdb_snap_crab::cloud::{CloudDatabasesClient, IDENTITY_URL};
use cdb_snap_crab::credentials::load_credentials;
use cdb_snap_crab::error::{Failure, USAGE_EXIT_CODE};
use cdb_snap_crab::logging::{self, LogSettings};
use cdb_snap_crab::notify::{Mailer, Notification};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(USAGE_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let settings = LogSettings {
        directory: args.logdir.clone(),
        verbose: args.verbose,
    };
    let _log_guard = match logging::install(&settings) {
        Ok(guard) => guard,
        Err(failure) => {
            eprintln!("{failure}");
            notify(&args, Err(&failure)).await;
            return ExitCode::from(failure.exit_code() as u8);
        }
    };

    let outcome = run(&args).await;
    match &outcome {
        Ok(summary) => info!(
            deleted = summary.deleted.len(),
            kept = summary.matches.len() - summary.deleted.len(),
            "rotation finished"
        ),
        Err(failure) => error!(exit_code = failure.exit_code(), "{failure}"),
    }

    notify(&args, outcome.as_ref()).await;

    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(failure) => ExitCode::from(failure.exit_code() as u8),
    }
}

async fn run(args: &Args) -> Result<RunSummary, Failure> {
    let credentials = load_credentials(&args.credfile)?;
    let region = args.resolve_region(credentials.region);
    debug!(username = %credentials.username, %region, "authenticating");

    let client = CloudDatabasesClient::authenticate(IDENTITY_URL, &credentials, region)
        .await
        .map_err(|e| Failure::Authentication(format!("{e:#}")))?;

    let app = App::new(Box::new(client), RunConfig::from_args(args));
    app.run(Local::now()).await
}

async fn notify(args: &Args, outcome: Result<&RunSummary, &Failure>) {
    let Some(address) = args.notify_address() else {
        return;
    };

    let notification = match outcome {
        Ok(summary) => Notification::success(address, &args.instance, summary),
        Err(failure) => Notification::failure(address, &args.instance, failure),
    };

    match Mailer::new(&args.sendmail).send(&notification).await {
        Ok(()) => info!(to = %address, "notification sent"),
        Err(e) => error!(to = %address, "failed to send notification: {e:#}"),
    }
}
