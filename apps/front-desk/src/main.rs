//! # Front Desk Entry Point
//!
//! Opens the configured database and prints the bed status board as JSON.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `BEDBOOK_*` configuration
//! 3. Connect to database & run migrations
//! 4. Read the status board with the system clock

use std::process::ExitCode;
use std::sync::Arc;

use bedbook_core::SystemClock;
use front_desk::commands::booking;
use front_desk::{init_tracing, ApiError, ApiResult, DeskConfig, FrontDesk};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    info!("Starting Bedbook front desk");

    match run().await {
        Ok(board) => {
            println!("{board}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(code = ?err.code, "{}", err.message);
            eprintln!("{}", err.to_json());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ApiResult<String> {
    let config = DeskConfig::from_env()?;
    config.ensure_data_dir()?;
    info!(path = %config.database_path.display(), "Database path determined");

    let desk = FrontDesk::open(config, Arc::new(SystemClock)).await?;
    let board = booking::status_board(&desk).await?;
    desk.db().close().await;

    serde_json::to_string_pretty(&board).map_err(|e| ApiError::internal(e.to_string()))
}
