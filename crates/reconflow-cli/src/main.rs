//! `reconflow` command-line entry point.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};
use commands::Context;

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reconflow=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    tracing::debug!("Starting reconflow v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Config(args) => commands::config::run(&args, cli.config.as_deref()),
        command => {
            let ctx = Context::open(cli.config.as_deref(), cli.database).await?;
            let outcome = dispatch(&ctx, command).await;
            ctx.close().await;
            outcome
        }
    }
}

async fn dispatch(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Targets(args) => commands::targets::run(ctx, args).await,
        Command::Settings(args) => commands::settings::run(ctx, args).await,
        Command::Scan(args) => commands::scan::run(ctx, args).await,
        Command::Status { job_id } => commands::jobs::status(ctx, &job_id).await,
        Command::Jobs { target } => commands::jobs::list(ctx, target.as_deref()).await,
        Command::Results { target_id } => commands::jobs::results(ctx, &target_id).await,
        Command::Files { domain, job } => commands::jobs::files(ctx, &domain, job.as_deref()).await,
        Command::Config(args) => commands::config::run(&args, ctx.config_path()),
    }
}
