//! Network reachability and the download policy that depends on it
//!
//! The platform reports connectivity changes through [`NetworkMonitor::report`];
//! interested parts of the app hold a [`watch::Receiver`] and always see the
//! latest connection.

use crate::types::OfflineConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// Current network path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    #[default]
    Unavailable,
    Cellular,
    Wifi,
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connection::Unavailable => write!(f, "unavailable"),
            Connection::Cellular => write!(f, "cellular"),
            Connection::Wifi => write!(f, "wifi"),
        }
    }
}

/// Publishes connectivity changes to subscribers
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<Connection>,
    running: AtomicBool,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Connection::Unavailable);
        Self {
            tx,
            running: AtomicBool::new(false),
        }
    }

    /// Begin accepting reports
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Network monitor started");
        }
    }

    /// Stop accepting reports; the last connection stays visible
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Network monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Report the current path; ignored while stopped
    ///
    /// Returns true if subscribers were notified of a change.
    pub fn report(&self, connection: Connection) -> bool {
        if !self.is_running() {
            debug!(connection = %connection, "Report ignored, monitor stopped");
            return false;
        }
        let previous = self.tx.send_replace(connection);
        if previous == connection {
            return false;
        }
        info!(from = %previous, to = %connection, "Network changed");
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<Connection> {
        self.tx.subscribe()
    }

    pub fn connection(&self) -> Connection {
        *self.tx.borrow()
    }

    pub fn is_wifi(&self) -> bool {
        self.connection() == Connection::Wifi
    }
}

/// Whether caching may use the current connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPolicy {
    pub wifi_only: bool,
}

impl From<&OfflineConfig> for DownloadPolicy {
    fn from(config: &OfflineConfig) -> Self {
        Self {
            wifi_only: config.wifi_only_download,
        }
    }
}

impl DownloadPolicy {
    pub fn permits(&self, connection: Connection) -> bool {
        match connection {
            Connection::Unavailable => false,
            Connection::Cellular => !self.wifi_only,
            Connection::Wifi => true,
        }
    }

    /// Running downloads must pause on this connection
    pub fn should_pause(&self, connection: Connection) -> bool {
        !self.permits(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_ignored_until_started() {
        let monitor = NetworkMonitor::new();
        assert!(!monitor.report(Connection::Wifi));
        assert_eq!(monitor.connection(), Connection::Unavailable);

        monitor.start();
        assert!(monitor.report(Connection::Wifi));
        assert!(!monitor.report(Connection::Wifi));
        assert!(monitor.is_wifi());

        monitor.stop();
        assert!(!monitor.report(Connection::Cellular));
        assert!(monitor.is_wifi());
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let monitor = NetworkMonitor::new();
        let mut rx = monitor.subscribe();
        monitor.start();
        monitor.report(Connection::Cellular);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connection::Cellular);
    }

    #[test]
    fn test_download_policy() {
        let wifi_only = DownloadPolicy { wifi_only: true };
        assert!(wifi_only.should_pause(Connection::Cellular));
        assert!(wifi_only.permits(Connection::Wifi));

        let any = DownloadPolicy::from(&OfflineConfig::default());
        assert!(any.permits(Connection::Cellular));
        assert!(any.should_pause(Connection::Unavailable));
    }
}
