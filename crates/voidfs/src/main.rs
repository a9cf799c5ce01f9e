mod config;
mod git_source;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;
use xldb::Index;
use xldb_web::BrowseServer;

use config::Config;
use git_source::GitRecordSource;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .compact()
        .init();
}

/// Browse a package-aware virtual filesystem index over HTTP.
///
/// Configuration is read from the environment (`VOIDFS_REPO`,
/// `VOIDFS_ADDR`, `VOIDFS_AUDIT_ALLOWLIST`); this only exists to give the
/// binary a `--help`/`--version` surface.
#[derive(Parser)]
#[command(name = "voidfs", about = "Browse an xldb index over HTTP", long_about = None)]
struct Cli {
    /// Override $VOIDFS_REPO for this run.
    #[arg(long)]
    repo: Option<String>,
}

async fn reload(index: &Arc<Index>, repo: String) {
    let index = Arc::clone(index);
    let result = tokio::task::spawn_blocking(move || {
        let mut source = GitRecordSource::new(repo);
        index.load(&mut source)
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "voidfs: reload failed"),
        Err(err) => tracing::error!(error = %err, "voidfs: reload task panicked"),
    }
}

async fn run_audit(index: &Arc<Index>, allowlist: Arc<std::collections::HashSet<String>>) {
    let index = Arc::clone(index);
    let report = tokio::task::spawn_blocking(move || index.vfsck(&allowlist)).await;
    match report {
        Ok(report) if report.is_clean() => tracing::info!("vfsck: no issues found"),
        Ok(report) => tracing::info!(count = report.issues.len(), "vfsck: issues found"),
        Err(err) => tracing::error!(error = %err, "voidfs: audit task panicked"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(repo) = cli.repo {
        config.repo = repo;
    }
    let allowlist = Arc::new(config.audit_allowlist);

    let index = Arc::new(Index::new());

    reload(&index, config.repo.clone()).await;
    tracing::info!("voidfs: initial load done");

    {
        let index = Arc::clone(&index);
        let repo = config.repo.clone();
        let allowlist = Arc::clone(&allowlist);
        tokio::spawn(async move {
            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(err) => {
                    tracing::error!(error = %err, "voidfs: failed to install SIGHUP handler");
                    return;
                }
            };
            let mut user1 = match signal(SignalKind::user_defined1()) {
                Ok(s) => s,
                Err(err) => {
                    tracing::error!(error = %err, "voidfs: failed to install SIGUSR1 handler");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = hangup.recv() => {
                        tracing::info!("voidfs: received SIGHUP, reloading database");
                        let index = Arc::clone(&index);
                        let repo = repo.clone();
                        tokio::spawn(async move {
                            reload(&index, repo).await;
                            tracing::info!("voidfs: reload done");
                        });
                    }
                    _ = user1.recv() => {
                        run_audit(&index, Arc::clone(&allowlist)).await;
                    }
                }
            }
        });
    }

    let server = BrowseServer::new(Arc::clone(&index), config.addr.clone());
    tracing::info!(addr = %config.addr, "voidfs: starting HTTP server");
    server.run().await
}
