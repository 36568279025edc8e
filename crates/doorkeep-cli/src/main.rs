//! `doorkeep`: keypad door lock controller.

mod bench;
mod config;

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use doorkeep_controller::notify::redact_code;
use doorkeep_controller::{
    CommandDispatcher, ControllerEvent, DoorHardware, LockController, LogSink,
    NotificationWorker, Notifier, SpoolQueue,
};
use doorkeep_core::CodeKind;
use doorkeep_hardware::mock::{MockDoorSensor, MockKeypad};
use doorkeep_hardware::scan_codes;
use doorkeep_storage::{CodeBook, CodeStore, Database};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::bench::LoggingActuator;
use crate::config::AppConfig;

/// How long queued notifications get to drain on shutdown.
const NOTIFICATION_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "doorkeep", version, about = "Keypad door lock controller")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Run the controller on the simulated bench (default)
    Run,
    /// Print every stored code and exit
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let db = Database::new(config.database())
        .await
        .with_context(|| format!("failed to open code store at {}", config.codebook_path))?;

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config, &db).await,
        Command::List => list_codes(&db).await,
    };

    db.close().await;
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

async fn list_codes(db: &Database) -> anyhow::Result<()> {
    let codes = db
        .code_store()
        .list()
        .await
        .context("failed to read stored codes")?;

    if codes.is_empty() {
        println!("no codes stored");
    }
    for code in codes {
        let kinds: Vec<&str> = code.kinds.iter().map(CodeKind::as_str).collect();
        println!(
            "{:<8} {:<24} [{}] usage {}/{}",
            redact_code(&code.digits),
            code.name,
            kinds.join(","),
            code.usage,
            code.max_usage
        );
    }
    Ok(())
}

async fn run(config: &AppConfig, db: &Database) -> anyhow::Result<()> {
    let (notifier, notifications) = Notifier::new();
    let worker = tokio::spawn(NotificationWorker::new(notifications, LogSink).run());

    let (sensor, door) = MockDoorSensor::new();
    let controller = LockController::builder(
        CodeBook::new(db.code_store(), config.policy()),
        DoorHardware::new(LoggingActuator, sensor),
        notifier.clone(),
    )
    .config(config.controller())
    .build();

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(64);
    let control_loop = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run(events_rx).await })
    };

    let (mut keypad, keys) = MockKeypad::new();
    let (attempts_tx, mut attempts_rx) = mpsc::channel(16);
    let max_len = config.max_code_length;
    let idle = config.code_input_timeout;
    let scanner = tokio::spawn(async move {
        if let Err(e) = scan_codes(&mut keypad, max_len, idle, attempts_tx).await {
            warn!(error = %e, "keypad scanner stopped");
        }
    });
    let forward = {
        let events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(attempt) = attempts_rx.recv().await {
                if events.send(ControllerEvent::Attempt(attempt)).await.is_err() {
                    break;
                }
            }
        })
    };
    let stdin = {
        let events = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = bench::read_stdin(keys, door, events).await {
                error!(error = %e, "bench input failed");
            }
        })
    };
    drop(events_tx);

    let dispatcher = config.command_spool_dir.clone().map(|dir| {
        info!(dir = %dir.display(), "remote commands enabled");
        let dispatcher =
            CommandDispatcher::new(controller.clone(), SpoolQueue::new(dir), notifier.clone())
                .with_poll_interval(config.command_poll);
        let token = shutdown.clone();
        tokio::spawn(async move { dispatcher.run(token).await })
    });

    info!(state = %controller.state(), "doorkeep running, Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    shutdown.cancel();
    if let Some(dispatcher) = dispatcher {
        let _ = dispatcher.await;
    }
    for task in [stdin, forward, scanner, control_loop] {
        task.abort();
        let _ = task.await;
    }

    controller.shutdown();
    drop(controller);
    drop(notifier);
    if tokio::time::timeout(NOTIFICATION_DRAIN, worker).await.is_err() {
        warn!("notifications still pending at exit");
    }

    Ok(())
}
