use safe_queue_cli::run_cli;
use tracing::{error, Level};

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        // Logging may have failed to start or be filtered off entirely
        if tracing::enabled!(Level::ERROR) {
            error!("CLI error: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        // Exit with appropriate code based on error type
        let exit_code = match e {
            safe_queue_cli::CliError::Configuration(_) => 1,
            safe_queue_cli::CliError::Queue(_) => 2,
            safe_queue_cli::CliError::CommandFailed { .. } => 3,
            safe_queue_cli::CliError::InvalidArgument { .. } => 4,
            safe_queue_cli::CliError::Output { .. } => 5,
        };

        std::process::exit(exit_code);
    }
}
