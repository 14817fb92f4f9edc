use keba_wallbox_monitor::{
    prometheus_exporter, AccessoryInfo, FanAccessory, MonitorConfig, StateStore,
    WallboxCoordinator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting KEBA wallbox monitor");
    let config = MonitorConfig::from_env()?;
    config.log_summary();

    let store = StateStore::new();
    let accessory = FanAccessory::new(
        AccessoryInfo::keba_p30(&config.accessory_name),
        store.clone(),
    );

    // Starts the poller, the report listener and the deriver feeding the accessory
    let coordinator = WallboxCoordinator::start(&config, store, accessory).await?;
    info!(
        "Requesting reports from {} via {}",
        config.device_address,
        coordinator.local_address()
    );

    if config.metrics_enabled {
        let metrics_store = coordinator.store().clone();
        tokio::select! {
            result = prometheus_exporter::serve(config.metrics_address(), metrics_store) => result?,
            _ = tokio::signal::ctrl_c() => info!("Interrupted, exiting"),
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Interrupted, exiting");
    }

    Ok(())
}
