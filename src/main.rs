use anyhow::Result;
use clap::Parser;

use mailclone::cli::Cli;
use mailclone::config::Settings;
use mailclone::replicate::Replicator;
use mailclone::replicate::imap_server::ImapConnector;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let settings = Settings::from_cli(&cli)?;
    let mut replicator = Replicator::new(settings.policy);
    if let Some(source) = settings.source {
        replicator = replicator.source(source);
    }
    if let Some(destination) = settings.destination {
        replicator = replicator.destination(destination);
    }

    // Fail on ambiguous roles before touching the network.
    replicator.direction()?;
    replicator.run(&ImapConnector)?;
    Ok(())
}
