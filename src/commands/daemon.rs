use std::sync::Arc;

use anyhow::Result;
use oparl_core::config::AppConfig;
use tokio::sync::broadcast;

use crate::bootstrap::App;
use crate::scheduler::Scheduler;

pub async fn run(mut config: AppConfig, interval: Option<u64>, full_sync_hour: Option<u32>) -> Result<()> {
    if let Some(minutes) = interval {
        config.sync.interval_minutes = minutes;
    }
    if let Some(hour) = full_sync_hour {
        config.sync.full_sync_hour = hour;
    }
    let sync_config = config.sync.clone();
    let metrics_enabled = config.metrics.enabled;
    let metrics_port = config.metrics.port;

    let app = App::init(config).await?;

    if metrics_enabled {
        let metrics = app.metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = oparl_metrics::serve(metrics, metrics_port).await {
                tracing::warn!(error = %e, "metrics server stopped");
            }
        });
    }

    let scheduler = Arc::new(Scheduler::new(app.orchestrator.clone(), app.storage.clone(), sync_config));
    let (tx, rx) = broadcast::channel(1);

    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c, shutting down");
    let _ = tx.send(());
    scheduler_task.await?;

    Ok(())
}
