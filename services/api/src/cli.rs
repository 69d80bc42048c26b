use crate::reporting::{run_report, run_verify, ReportArgs, VerifyArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use refi_ready::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Refinance Readiness",
    about = "Serve and report the refinance-eligible borrower audience",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP dashboard service (default command)
    Serve(ServeArgs),
    /// Print the refinance dashboard for the configured data root
    Report(ReportArgs),
    /// Re-derive the audience from the raw tables and summarise the result
    Verify(VerifyArgs),
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
        Command::Report(args) => run_report(args),
        Command::Verify(args) => run_verify(args),
    }
}
