use crate::demo::{run_demo, run_timeline, DemoArgs, TimelineArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use student_portal::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Student Services Portal",
    about = "Run the student services request API or exercise it from the command line",
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
    /// Render the progress timeline for a status and creation date
    Timeline(TimelineArgs),
    /// Submit, track and update a request against the in-memory backend
    Demo(DemoArgs),
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
        Command::Timeline(args) => run_timeline(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
