use clap::Parser;
use crab_pilot::app::{handle_fatal_error, init_logging, AppConfig, InterruptFlag};
use crab_pilot::cli::{execute_command, Cli, CommandContext};
use crab_pilot::config::ConfigLoader;
use crab_pilot::subprocess::SubprocessManager;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        handle_fatal_error(e, verbose);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = AppConfig::new(cli.verbose)?
        .with_run_dir(cli.run_dir)?
        .with_log_file(cli.log);
    init_logging(&app)?;

    let config = ConfigLoader::new()
        .with_file(cli.config)
        .search_dir(std::env::current_dir()?)
        .load()?;
    let interrupt = InterruptFlag::install()?;

    let ctx = CommandContext::new(app, config, SubprocessManager::production(), interrupt)
        .with_notifications(cli.email, cli.ntfy);
    execute_command(cli.command, &ctx).await
}
