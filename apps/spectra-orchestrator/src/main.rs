// [apps/spectra-orchestrator/src/main.rs]
//! Minimal composition-root binary — no CLI argument-parsing
//! framework, just `spectra <config-path> <verb> [args...]`: reads
//! the config file, builds a `Bootstrap`, dispatches
//! to one `operations` function, and maps `CoreError::exit_code` onto
//! the process exit status. Verbs that enqueue work also start the
//! worker pool and run it until Ctrl-C.

use spectra_domain_models::{load_config, ArchiveOptions, DiscoveryOptions, ForwardFlags, ForwardMode};
use spectra_orchestrator::bootstrap::development_client;
use spectra_orchestrator::{operations, Bootstrap, CoreError};
use std::path::Path;
use tokio::sync::watch;
use tracing::{error, info};

fn main() {
    spectra_telemetry::init_tracing("spectra_orchestrator");

    let args: Vec<String> = std::env::args().collect();
    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(error) => {
            let code = error.exit_code();
            error!(%error, exit_code = code, "operation failed");
            code
        }
    };
    std::process::exit(exit_code);
}

fn run(args: Vec<String>) -> Result<(), CoreError> {
    let config_path = args.get(1).ok_or_else(|| CoreError::Configuration("usage: spectra <config-path> <verb> [args...]".to_string()))?;
    let verb = args.get(2).ok_or_else(|| CoreError::Configuration("missing verb: archive|discover|forward|accounts-list|work".to_string()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().map_err(|e| CoreError::Other(e.to_string()))?;

    runtime.block_on(async {
        let raw = tokio::fs::read_to_string(Path::new(config_path)).await?;
        let (mut config, warnings) = load_config(&raw)?;
        for warning in &warnings {
            tracing::warn!(section = %warning.section, key = %warning.key, "unrecognised config entry");
        }
        config.apply_env_overrides();

        let bootstrap = Bootstrap::init(config, development_client()).await?;

        match verb.as_str() {
            "archive" => {
                let entity_id = parse_arg(&args, 3)?;
                let id = operations::archive(&bootstrap, entity_id, ArchiveOptions::default(), None).await?;
                info!(job_id = id, "archive job queued");
                Ok(())
            }
            "discover" => {
                let seed = parse_arg(&args, 3)?;
                let id = operations::discover(&bootstrap, &[seed], DiscoveryOptions::default(), None).await?;
                info!(job_id = id, "discovery job queued");
                Ok(())
            }
            "forward" => {
                let source = parse_arg(&args, 3)?;
                let destination = parse_arg(&args, 4)?;
                let id = operations::forward(&bootstrap, &[source], destination, ForwardMode::Selective, ForwardFlags::default(), None).await?;
                info!(job_id = id, "forward job queued");
                Ok(())
            }
            "accounts-list" => {
                let accounts = operations::accounts::list(&bootstrap).await?;
                for account in accounts {
                    info!(account_id = account.id, session = %account.session_name, health = account.health.as_str(), "account");
                }
                Ok(())
            }
            "schedule-list" => {
                let pending = operations::schedule::list(&bootstrap).await?;
                info!(archive = pending.archive.len(), forward = pending.forward.len(), discovery = pending.discovery.len(), "pending jobs");
                Ok(())
            }
            "work" => run_worker_pool(&bootstrap).await,
            other => Err(CoreError::Configuration(format!("unknown verb: {other}"))),
        }
    })
}

/// Runs the scheduler until Ctrl-C, draining whatever the queues hold
/// (enqueued by a prior `archive`/`discover`/`forward` invocation or
/// `schedule.add`), alongside the Invitation Sub-Pipeline's own
/// periodic loop and its `invitation_state.json` mirror.
async fn run_worker_pool(bootstrap: &Bootstrap) -> Result<(), CoreError> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = bootstrap.worker_pool();
    let handles = pool.spawn(bootstrap.archival_binding(), bootstrap.forward_binding(), bootstrap.discovery_binding(), bootstrap.lease_policy(), shutdown_rx);

    let invitation_task = {
        let dispatcher = bootstrap.invitation_dispatcher();
        let repositories = bootstrap.repositories.clone();
        let state_path = std::path::PathBuf::from("invitation_state.json");
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(error) = dispatcher.run_once(25).await {
                    tracing::warn!(%error, "invitation dispatch cycle failed");
                }
                if let Err(error) = spectra_orchestrator::invitation_state::write_snapshot(&repositories, &state_path).await {
                    tracing::warn!(%error, "failed to mirror invitation_state.json");
                }
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(10)) => {}
                    _ = shutdown.changed() => {}
                }
            }
        })
    };

    tokio::signal::ctrl_c().await.map_err(|e| CoreError::Other(e.to_string()))?;
    info!("shutdown requested, draining workers");
    shutdown_tx.send(true).ok();

    for handle in handles {
        handle.await.map_err(|e| CoreError::Other(e.to_string()))?;
    }
    invitation_task.await.map_err(|e| CoreError::Other(e.to_string()))?;
    Ok(())
}

fn parse_arg(args: &[String], index: usize) -> Result<i64, CoreError> {
    args.get(index)
        .ok_or_else(|| CoreError::Configuration(format!("missing argument at position {index}")))?
        .parse()
        .map_err(|_| CoreError::Configuration(format!("argument at position {index} is not an integer")))
}
