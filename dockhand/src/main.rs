//! dockhand - Entry Point
//!
//! Deploys a containerized git repository to a remote Linux host over SSH and
//! publishes it behind nginx, or tears such a deployment down.

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use dockhand::cli::Cli;
use dockhand::errors::{DeployError, EXIT_INTERRUPTED};
use dockhand::exec::runner::ProcessRunner;
use dockhand::inputs::{DialoguerPrompter, InputCollector, Prompter};
use dockhand::logs::{init_logging, LogOptions};
use dockhand::pipeline::run::Pipeline;
use dockhand::report::render_summary;
use dockhand::settings::Settings;
use dockhand::stages::validate::ReqwestChecker;
use dockhand::utils::version_info;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

/// Run one invocation and return the process exit status. The log guard
/// lives inside, so the log file is flushed before the process exits.
async fn run(cli: Cli) -> i32 {
    let settings = match Settings::load(cli.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return e.exit_code();
        }
    };

    let log_options = LogOptions {
        log_level: settings.log_level.raised(cli.verbose),
        stdout: true,
        log_dir: cli.log_dir.clone().unwrap_or_else(|| settings.log_dir.clone()),
        json_format: cli.json,
    };
    let log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return e.exit_code();
        }
    };
    info!("dockhand {}", version_info());
    info!("Logging to {}", log_guard.path().display());

    let interactive = !cli.non_interactive && std::io::stdin().is_terminal();
    let prompter = DialoguerPrompter::new();
    let collector = InputCollector::new(interactive.then_some(&prompter as &dyn Prompter));
    let mut deployment = match collector.collect(cli.raw_inputs(), cli.cleanup) {
        Ok(run) => run,
        Err(e) => {
            error!("{}", e);
            return e.exit_code();
        }
    };

    let checker = match ReqwestChecker::new(settings.validation.http_timeout_secs) {
        Ok(checker) => checker,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return e.exit_code();
        }
    };
    let pipeline = Pipeline::new(Arc::new(ProcessRunner::new()), Arc::new(checker), settings);
    let fsm = pipeline.state_handle();

    let finished = tokio::select! {
        result = async {
            if cli.cleanup {
                pipeline.cleanup(&mut deployment).await
            } else {
                pipeline.deploy(&mut deployment).await
            }
        } => Some(result),
        _ = await_shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            let (stage, completed) = {
                let fsm = fsm.read().await;
                (fsm.current_stage(), fsm.passed().len())
            };
            let during = stage.map_or_else(|| "startup".to_string(), |s| s.to_string());
            warn!(
                "Interrupted during {} after {} completed stage(s); partial work is left in place",
                during, completed
            );
            let interrupted = Err(DeployError::Interrupted(during));
            println!("{}", render_summary(&deployment, cli.cleanup, &interrupted));
            info!("Run log: {}", log_guard.path().display());
            return EXIT_INTERRUPTED;
        }
    };

    println!("{}", render_summary(&deployment, cli.cleanup, &result));
    info!("Run log: {}", log_guard.path().display());
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, stopping...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, stopping...");
                    }
                }
            }
            _ => {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received, stopping...");
                } else {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, stopping...");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
