//! truthguard CLI entry point.

mod cli;
mod display;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use truthguard::client::ResultTxId;
use truthguard::{
    ClientConfig, FactCheckerBuilder, GatewayClient, PollEvent, PollStatus, RequestId,
    ResultLookup,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("truthguard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::InitConfig { ref path, force } => {
            let path = path.clone().unwrap_or_else(ClientConfig::default_path);
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            ClientConfig::default().to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        Command::Lookup { ref request_id } => {
            let config = cli.to_config()?;
            let request_id: RequestId = request_id.parse()?;
            let gateway = GatewayClient::new(&config)?;
            match gateway.lookup(&request_id).await? {
                Some(record) => print!("{}", display::render_record(&record)),
                None => println!("No result for {request_id} yet."),
            }
        }
        Command::Fetch { ref result_tx_id } => {
            let config = cli.to_config()?;
            let tx_id: ResultTxId = result_tx_id.parse()?;
            let gateway = GatewayClient::new(&config)?;
            let record = gateway
                .fetch_result(&tx_id)
                .await?
                .ok_or_else(|| eyre!("{tx_id} is unavailable or not a valid result"))?;
            print!("{}", display::render_record(&record));
        }
        Command::Poll { ref request_id } => {
            let config = cli.to_config()?;
            let request_id: RequestId = request_id.parse()?;
            poll(config, request_id).await?;
        }
    }

    Ok(())
}

async fn poll(config: ClientConfig, request_id: RequestId) -> color_eyre::Result<()> {
    let mut checker = FactCheckerBuilder::new(config).build()?;
    let mut events = checker.subscribe_events();
    checker.watch(request_id);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PollEvent::Succeeded { record, .. }) => {
                    print!("{}", display::render_record(&record));
                    break;
                }
                Ok(event) => {
                    if let Some(line) = display::render_event(&event) {
                        println!("{line}");
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Dropped {n} progress events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, cancelling session");
                checker.cancel();
                return Ok(());
            }
        }
    }

    let finished = match checker.current_mut() {
        Some(session) => session.finished().await,
        None => return Ok(()),
    };
    match finished.status() {
        PollStatus::Succeeded | PollStatus::Pending => Ok(()),
        PollStatus::TimedOut => bail!("timed out after {} attempts", finished.attempts()),
        PollStatus::Failed => bail!(
            "polling failed: {}",
            finished.last_error().unwrap_or("unknown error")
        ),
    }
}
