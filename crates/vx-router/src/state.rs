//! Process-wide connectivity state
//!
//! There is exactly one [`ConnectivityPublisher`]; it is not `Clone` and is
//! owned by the session controller. Everything else holds a
//! [`ConnectivityReader`] and sees whole snapshots.

use tokio::sync::watch;
use vx_core::{Connectivity, ConnectivityState};

/// Write side of the connectivity state
#[derive(Debug)]
pub struct ConnectivityPublisher {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityPublisher {
    /// Publisher starting from an unknown, unselected state
    pub fn new() -> (Self, ConnectivityReader) {
        let (tx, rx) = watch::channel(ConnectivityState::new());
        (Self { tx }, ConnectivityReader { rx })
    }

    /// Apply `f` to the state and notify readers
    pub fn update(&self, f: impl FnOnce(&mut ConnectivityState)) {
        self.tx.send_modify(f);
    }

    /// Only change the tri-state value
    pub fn set_connectivity(&self, connectivity: Connectivity) {
        self.update(|state| state.set_connectivity(connectivity));
    }

    pub fn snapshot(&self) -> ConnectivityState {
        self.tx.borrow().clone()
    }

    /// Another reader
    pub fn reader(&self) -> ConnectivityReader {
        ConnectivityReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the connectivity state
#[derive(Debug, Clone)]
pub struct ConnectivityReader {
    rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityReader {
    /// Current state
    pub fn snapshot(&self) -> ConnectivityState {
        self.rx.borrow().clone()
    }

    /// Wait for the next update; `false` once the publisher is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let (_publisher, reader) = ConnectivityPublisher::new();
        let state = reader.snapshot();
        assert_eq!(state.connectivity, Connectivity::Unknown);
        assert_eq!(state.label, "Unknown");
        assert!(state.vendor.is_none());
    }

    #[tokio::test]
    async fn test_readers_see_updates() {
        let (publisher, mut reader) = ConnectivityPublisher::new();
        let other = publisher.reader();

        publisher.update(|state| {
            state.set_connectivity(Connectivity::Up);
            state.vendor = Some("acme".to_string());
        });

        assert!(reader.changed().await);
        assert_eq!(reader.snapshot().label, "Connected");
        assert_eq!(other.snapshot().vendor.as_deref(), Some("acme"));

        publisher.set_connectivity(Connectivity::Down);
        assert_eq!(other.snapshot().label, "Disconnected");
        assert_eq!(other.snapshot().vendor.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_changed_reports_closed_publisher() {
        let (publisher, mut reader) = ConnectivityPublisher::new();
        drop(publisher);
        assert!(!reader.changed().await);
    }
}
