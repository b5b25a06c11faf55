use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use servertracker::cli::Cli;
use servertracker::config::{Config, ConfigSource};
use servertracker::console::{run_console, spawn_stdin_reader};
use servertracker::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_tracing(cli.verbose);

    info!("Starting ServerTracker v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration...");

    let config = match Config::from_config(cli.config.as_ref())? {
        ConfigSource::Existing(config) => config,
        ConfigSource::Created(path) => {
            println!("No config file existed, so one was created for you at {}.", path.display());
            println!("Please edit it and restart this program.");
            return Ok(());
        }
    };

    let orchestrator = Orchestrator::new(&config)?;

    if cli.check {
        print!("{config}");
        println!("Configuration OK: {} services", orchestrator.registry().len());
        return Ok(());
    }

    if cli.once {
        for (service, result) in orchestrator.check_once().await {
            let verdict = if result.success { "ONLINE" } else { "OFFLINE" };
            println!(
                "{:<20} {:<28} {:<8} {:>6}ms  {}",
                service.name,
                service.address(),
                verdict,
                result.elapsed.as_millis(),
                result.message.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let console = tokio::spawn(run_console(
        spawn_stdin_reader(),
        orchestrator.tracker().clone(),
        shutdown_tx.clone(),
    ));

    let interrupt_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = interrupt_tx.send(true);
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    info!("Successfully initialised! Type `status` or `end`.");
    orchestrator.run(shutdown_rx).await?;
    console.abort();
    drop(shutdown_tx);

    Ok(())
}
