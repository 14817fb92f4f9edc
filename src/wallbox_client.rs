use crate::keba_report::{decode_datagram, ReportRecord, ReportRequest};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Report answers are a few hundred bytes; sized above an Ethernet MTU so a chatty
/// firmware is not cut off
const RECEIVE_BUFFER_SIZE: usize = 2048;

/// UDP client for the wallbox report port.
///
/// One socket is used for both directions because the wallbox answers to the port
/// the request came from. Requests are fire-and-forget; answers are picked up by the
/// listener task and are not correlated with the request that triggered them.
pub struct WallboxClient {
    socket: Arc<UdpSocket>,
    device_address: SocketAddr,
    poll_interval: Duration,
}

impl WallboxClient {
    pub async fn bind(
        bind_address: SocketAddr,
        device_address: SocketAddr,
        poll_interval: Duration,
    ) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_address)
            .await
            .with_context(|| format!("Binding wallbox report socket on {bind_address}"))?;
        info!(
            "Wallbox monitoring socket listening on {}",
            socket.local_addr()?
        );

        Ok(Self {
            socket: Arc::new(socket),
            device_address,
            poll_interval,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the request poller and the report listener. Decoded reports are sent
    /// to `records`.
    pub fn spawn(self, records: Sender<ReportRecord>) -> (JoinHandle<()>, JoinHandle<()>) {
        let poller = tokio::spawn(Self::poll(
            self.socket.clone(),
            self.device_address,
            self.poll_interval,
        ));
        let listener = tokio::spawn(Self::listen(self.socket, records));
        (poller, listener)
    }

    /// Alternates `report 2` and `report 3` requests, one per tick
    async fn poll(socket: Arc<UdpSocket>, device_address: SocketAddr, period: Duration) {
        info!(
            "Starting wallbox poller for {} every {:?}",
            device_address, period
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut request = ReportRequest::Status;

        loop {
            ticker.tick().await;

            match socket
                .send_to(request.command().as_bytes(), device_address)
                .await
            {
                Ok(_) => debug!("Sent '{}' to {}", request.command(), device_address),
                // The next tick is the retry
                Err(e) => warn!(
                    "Failed to send '{}' to {}: {}",
                    request.command(),
                    device_address,
                    e
                ),
            }

            request = request.next();
        }
    }

    async fn listen(socket: Arc<UdpSocket>, records: Sender<ReportRecord>) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

        loop {
            let (length, remote) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Wallbox socket receive error: {}", e);
                    continue;
                }
            };

            if length == buffer.len() {
                debug!(
                    "Datagram from {} filled the {} byte buffer and may be truncated",
                    remote, RECEIVE_BUFFER_SIZE
                );
            }

            let record = match decode_datagram(&buffer[..length]) {
                Ok(record) => record,
                Err(reason) => {
                    trace!("Dropping datagram from {}: {}", remote, reason);
                    continue;
                }
            };

            debug!("Report received from {}", remote);
            if records.send(record).await.is_err() {
                info!("Report consumer is gone, stopping wallbox listener");
                break;
            }
        }
    }
}
