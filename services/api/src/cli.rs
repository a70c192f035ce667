use crate::commands::{
    run_audit, run_compare, run_resolve, run_scheduled, AuditArgs, CompareArgs, ResolveArgs,
    ScheduledArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use seo_audit::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "SEO Audit Runner",
    about = "Audit a content tree for SEO defects and track score changes between runs",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a synchronous audit over a content export
    Audit(AuditArgs),
    /// Queue one or more scopes and process the queue
    RunScheduled(ScheduledArgs),
    /// Diff two saved audit runs
    Compare(CompareArgs),
    /// Resolve a metadata template against field values
    Resolve(ResolveArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON content export served to the auditors (empty tree when omitted)
    #[arg(long)]
    pub(crate) content: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Audit(args) => run_audit(args).await,
        Command::RunScheduled(args) => run_scheduled(args).await,
        Command::Compare(args) => run_compare(args),
        Command::Resolve(args) => run_resolve(args),
    }
}
