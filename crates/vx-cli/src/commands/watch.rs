//! Keep server directories loaded and refreshed

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::output::print_success;

/// Build the directories, then refresh them until Ctrl-C or SIGTERM
pub async fn watch_command(ctx: &Context) -> Result<()> {
    let (registry, refresher) = ctx.directories().await?;
    print_success(&format!(
        "Loaded {} vendor(s), refreshing every {}s",
        registry.vendors().len(),
        refresher.interval().as_secs()
    ));

    let cancel = CancellationToken::new();
    let task = tokio::spawn(refresher.run(cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();
    task.await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
