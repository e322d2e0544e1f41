//! TCP port reachability.

use std::time::Duration;

use async_trait::async_trait;
use dockrule_core::{ExternalAddress, StartConditionCheck, WaitError};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Connect timeout for a single probe.
pub const TCP_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Met once every requested address has accepted a connection.
///
/// An address that accepted once is not probed again. Addresses that did
/// not are retried on every check.
pub struct TcpPortChecker {
    requested: Vec<ExternalAddress>,
    pending: Mutex<Vec<ExternalAddress>>,
    connect_timeout: Duration,
}

impl TcpPortChecker {
    pub fn new(addresses: Vec<ExternalAddress>) -> Self {
        Self {
            pending: Mutex::new(addresses.clone()),
            requested: addresses,
            connect_timeout: TCP_PING_TIMEOUT,
        }
    }

    /// Check `ports` on a single `host`.
    pub fn for_host(host: &str, ports: &[u16]) -> Self {
        Self::new(
            ports
                .iter()
                .map(|port| ExternalAddress::new(host, *port))
                .collect(),
        )
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn requested(&self) -> &[ExternalAddress] {
        &self.requested
    }

    /// Addresses that have not accepted a connection yet.
    pub async fn pending(&self) -> Vec<ExternalAddress> {
        self.pending.lock().await.clone()
    }

    async fn probe(&self, address: &ExternalAddress) -> bool {
        let connect = TcpStream::connect((address.host.as_str(), address.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!(address = %address, error = %e, "tcp port not open yet");
                false
            }
            Err(_) => {
                trace!(address = %address, "tcp connect timed out");
                false
            }
        }
    }
}

#[async_trait]
impl StartConditionCheck for TcpPortChecker {
    async fn check(&self) -> Result<bool, WaitError> {
        let mut pending = self.pending.lock().await;
        // An address leaves the set only after its own probe succeeded, so a
        // check dropped mid-probe keeps everything it has not confirmed.
        let candidates = pending.clone();
        for address in candidates {
            if self.probe(&address).await {
                debug!(address = %address, "tcp port open");
                pending.retain(|a| a != &address);
            }
        }
        Ok(pending.is_empty())
    }

    fn describe(&self) -> String {
        let host = self.requested.first().map_or("", |a| a.host.as_str());
        if self.requested.iter().all(|a| a.host == host) {
            let ports: Vec<u16> = self.requested.iter().map(|a| a.port).collect();
            format!("tcp port check '{host}:{ports:?}'")
        } else {
            let addresses: Vec<String> = self.requested.iter().map(ToString::to_string).collect();
            format!("tcp port check '[{}]'", addresses.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_open_port_is_met() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let checker = TcpPortChecker::for_host("127.0.0.1", &[port]);
        assert!(checker.check().await.unwrap());
        assert!(checker.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_opened_port_leaves_pending_set() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();
        let late_port = closed_port().await;

        let checker = TcpPortChecker::for_host("127.0.0.1", &[open_port, late_port]);
        assert!(!checker.check().await.unwrap());
        assert_eq!(
            checker.pending().await,
            vec![ExternalAddress::new("127.0.0.1", late_port)]
        );

        // The first port closing again does not matter any more.
        drop(open);
        let _late = TcpListener::bind(("127.0.0.1", late_port)).await.unwrap();
        assert!(checker.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_port_is_retried_every_check() {
        let port = closed_port().await;
        let checker = TcpPortChecker::for_host("127.0.0.1", &[port]);

        for _ in 0..3 {
            assert!(!checker.check().await.unwrap());
            assert_eq!(checker.pending().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_cancelled_check_keeps_unconfirmed_addresses() {
        let closed = closed_port().await;

        // Backlog of zero plus one queued connection: further connects hang.
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let stalled = listener.local_addr().unwrap().port();
        let _queued = TcpStream::connect(("127.0.0.1", stalled)).await.unwrap();

        let checker = TcpPortChecker::for_host("127.0.0.1", &[closed, stalled])
            .with_connect_timeout(Duration::from_secs(2));
        let cancelled = tokio::time::timeout(Duration::from_millis(100), checker.check())
            .await
            .is_err();
        assert!(cancelled);

        assert_eq!(
            checker.pending().await,
            vec![
                ExternalAddress::new("127.0.0.1", closed),
                ExternalAddress::new("127.0.0.1", stalled),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_ports_is_met() {
        let checker = TcpPortChecker::new(Vec::new());
        assert!(checker.check().await.unwrap());
    }

    #[test]
    fn test_describe() {
        let checker = TcpPortChecker::for_host("localhost", &[8080, 8081]);
        assert_eq!(checker.describe(), "tcp port check 'localhost:[8080, 8081]'");

        let mixed = TcpPortChecker::new(vec![
            ExternalAddress::new("a", 1),
            ExternalAddress::new("b", 2),
        ]);
        assert_eq!(mixed.describe(), "tcp port check '[a:1, b:2]'");
    }
}
