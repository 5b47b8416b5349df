use crate::offline::{run_catalog, run_compile, CatalogArgs, CompileArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use filing_binder::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Filing Binder",
    about = "Check readiness and compile immigration filing packages",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Show the support matrix or the rules behind one forum's profile
    Catalog(CatalogArgs),
    /// Evaluate and plan a matter from a JSON file without starting the server
    Compile(CompileArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Catalog(args) => run_catalog(args),
        Command::Compile(args) => run_compile(args),
    }
}
