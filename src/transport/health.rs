//! Relay-side liveness probing.
//!
//! # Responsibilities
//! - Post a health-check envelope immediately and then on a fixed interval
//! - Resolve the live port through the handle on every ping
//!
//! # Design Decisions
//! - One-way: never waits for or requires a reply
//! - Never triggers reconnection; only the port's own disconnect does
//! - Stopped by the relay when the port disconnects

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use crate::observability::metrics;
use crate::protocol::{Envelope, Method};
use crate::transport::handle::PortHandle;

/// Shortest ping interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct HealthMonitor {
    handle: PortHandle,
    origin: String,
    interval: Duration,
}

impl HealthMonitor {
    /// `origin` is the window origin captured at load time. Intervals below
    /// one millisecond are raised to it.
    pub fn new(handle: PortHandle, origin: impl Into<String>, interval: Duration) -> Self {
        Self {
            handle,
            origin: origin.into(),
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Ping until `stop` fires or its sender is dropped.
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        tracing::debug!(
            interval_ms = self.interval.as_millis() as u64,
            origin = %self.origin,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop => {
                    tracing::debug!("Health monitor stopped");
                    break;
                }
                _ = ticker.tick() => self.ping(),
            }
        }
    }

    fn ping(&self) {
        match self.handle.post(Envelope::control(Method::HealthCheck, &self.origin)) {
            Ok(port) => {
                tracing::trace!(port = %port, "Health check sent");
                metrics::record_health_check();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Health check skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::port::{pair, ConnectInfo};

    #[tokio::test(start_paused = true)]
    async fn test_pings_immediately_then_on_interval() {
        let handle = PortHandle::new();
        let (link, mut end) = pair(ConnectInfo {
            name: "bridge".into(),
            origin: "https://dapp.example".into(),
        });
        handle.replace(link.port);

        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = HealthMonitor::new(handle.clone(), "https://dapp.example", Duration::from_millis(100));
        let task = tokio::spawn(monitor.run(stop_rx));

        time::sleep(Duration::from_millis(250)).await;
        let mut pings = 0;
        while let Ok(envelope) = end.inbound.try_recv() {
            assert_eq!(envelope.method(), Some(&Method::HealthCheck));
            assert_eq!(
                envelope.request.unwrap().origin.as_deref(),
                Some("https://dapp.example")
            );
            pings += 1;
        }
        // t = 0, 100, 200
        assert_eq!(pings, 3);

        stop_tx.send(()).unwrap();
        task.await.unwrap();

        time::sleep(Duration::from_millis(500)).await;
        assert!(end.inbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_port_means_no_ping() {
        let handle = PortHandle::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(
            HealthMonitor::new(handle.clone(), "https://dapp.example", Duration::from_millis(50)).run(stop_rx),
        );
        time::sleep(Duration::from_millis(120)).await;
        drop(stop_tx);
        task.await.unwrap();
        assert!(!handle.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let handle = PortHandle::new();
        let (link, mut end) = pair(ConnectInfo {
            name: "bridge".into(),
            origin: "https://dapp.example".into(),
        });
        handle.replace(link.port);

        let monitor = HealthMonitor::new(handle, "https://dapp.example", Duration::ZERO);
        assert_eq!(monitor.interval, MIN_INTERVAL);

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(monitor.run(stop_rx));
        time::sleep(Duration::from_millis(5)).await;
        stop_tx.send(()).unwrap();
        task.await.unwrap();

        assert!(end.inbound.try_recv().is_ok());
    }
}
