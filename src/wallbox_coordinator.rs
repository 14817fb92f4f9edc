use crate::accessory::CharacteristicSink;
use crate::config::MonitorConfig;
use crate::keba_report::ReportRecord;
use crate::metrics_deriver::MetricsDeriver;
use crate::state_store::StateStore;
use crate::wallbox_client::WallboxClient;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Reports waiting for the deriver; a handful is plenty at one request per tick
const REPORT_QUEUE_DEPTH: usize = 32;

/// Coordinates the monitoring tasks.
///
/// Spawns the request poller, the report listener and the single deriver task that
/// owns all writes to the state store, and wires them together with a channel.
pub struct WallboxCoordinator {
    store: StateStore,
    local_address: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl WallboxCoordinator {
    /// Binds the wallbox socket and starts all monitoring tasks
    pub async fn start<S: CharacteristicSink>(
        config: &MonitorConfig,
        store: StateStore,
        sink: S,
    ) -> anyhow::Result<Self> {
        info!("Initializing wallbox coordinator");

        let (record_tx, record_rx) = mpsc::channel::<ReportRecord>(REPORT_QUEUE_DEPTH);

        let deriver =
            MetricsDeriver::new(store.clone(), sink).with_verbose(config.verbose_reports);
        let deriver_task = deriver.spawn_receiver(record_rx);

        let client = WallboxClient::bind(
            config.bind_address,
            config.device_address,
            config.poll_interval,
        )
        .await?;
        let local_address = client.local_addr()?;
        let (poller_task, listener_task) = client.spawn(record_tx);

        info!("All wallbox monitoring tasks started");

        Ok(Self {
            store,
            local_address,
            tasks: vec![deriver_task, poller_task, listener_task],
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Address of the local wallbox socket
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// Stops all monitoring tasks
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::{AccessoryInfo, FanAccessory};
    use std::time::Duration;

    #[tokio::test]
    async fn test_coordinator_creation() {
        let config = MonitorConfig::from_lookup(|name| match name {
            "KEBA_ADDRESS" => Some("127.0.0.1:7090".to_string()),
            "KEBA_BIND" => Some("127.0.0.1:0".to_string()),
            _ => None,
        })
        .unwrap();
        let store = StateStore::new();
        let accessory = FanAccessory::new(AccessoryInfo::keba_p30("Test"), store.clone());

        let coordinator = WallboxCoordinator::start(&config, store, accessory)
            .await
            .unwrap();

        // Wait a moment for tasks to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_ne!(coordinator.local_address().port(), 0);
        assert_eq!(coordinator.store().device_state().output_percent, 0);
        coordinator.shutdown();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = MonitorConfig {
            bind_address: taken.local_addr().unwrap(),
            ..MonitorConfig::from_lookup(|name| {
                (name == "KEBA_ADDRESS").then(|| "127.0.0.1".to_string())
            })
            .unwrap()
        };
        let store = StateStore::new();
        let accessory = FanAccessory::new(AccessoryInfo::keba_p30("Test"), store.clone());

        let result = WallboxCoordinator::start(&config, store, accessory).await;

        assert!(result.is_err());
    }
}
