mod cli;
mod infra;
mod offline;
mod routes;
mod server;

use filing_binder::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
