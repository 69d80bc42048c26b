mod cli;
mod infra;
mod reporting;
mod routes;
mod server;

use refi_ready::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
