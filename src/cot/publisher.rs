//! # TAK Publisher
//!
//! Forwards accepted detections to a TAK server as CoT XML. The publish
//! loop subscribes to the subscriber registry like any WebSocket client; if
//! it falls behind and gets pruned it resubscribes with a fresh queue.
//! Endpoint failures drop the event after one reconnect attempt — the next
//! detection renews the picture, so there is nothing worth queueing.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use super::event::CotEvent;
use crate::realtime::SubscriberRegistry;
use crate::signal::BroadcastMessage;

/// Default TAK mesh multicast endpoint
pub const MULTICAST_ADDR: &str = "239.2.3.1:6969";

/// Where CoT events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakTarget {
    /// Persistent TCP connection to a TAK server input
    Tcp(String),
    /// Connectionless datagrams, unicast or multicast
    Udp(String),
}

enum TakConnection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl TakConnection {
    async fn open(target: &TakTarget) -> io::Result<Self> {
        match target {
            TakTarget::Tcp(addr) => Ok(Self::Tcp(TcpStream::connect(addr).await?)),
            TakTarget::Udp(addr) => {
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                socket.connect(addr).await?;
                Ok(Self::Udp(socket))
            }
        }
    }

    async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.write_all(payload).await,
            Self::Udp(socket) => socket.send(payload).await.map(|_| ()),
        }
    }
}

/// Supervisor handle for the publish loop.
///
/// Same start-if-absent discipline as the notification listener: at most
/// one loop per handle, guarded by an atomic flag.
#[derive(Debug, Default)]
pub struct CotPublisher {
    running: AtomicBool,
}

impl CotPublisher {
    /// Create an idle publisher handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the publish loop unless one is already active.
    ///
    /// Returns `true` if a new loop was started.
    pub fn spawn(self: &Arc<Self>, registry: Arc<SubscriberRegistry>, target: TakTarget) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let guard = Arc::clone(self);
        tokio::spawn(async move {
            run_publish_loop(&registry, &target).await;
            guard.running.store(false, Ordering::SeqCst);
        });

        true
    }

    /// Whether a publish loop is currently active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Subscribe, project, deliver; resubscribe whenever the feed closes
async fn run_publish_loop(registry: &SubscriberRegistry, target: &TakTarget) {
    loop {
        let (_id, mut feed) = registry.connect().await;
        tracing::info!(?target, "cot publisher subscribed");

        let mut connection: Option<TakConnection> = None;
        while let Some(payload) = feed.recv().await {
            let Ok(message) = serde_json::from_str::<BroadcastMessage>(&payload) else {
                continue;
            };
            // No position fix means nothing to plot
            let Some(event) = CotEvent::from_message(&message, Utc::now()) else {
                continue;
            };
            deliver(&mut connection, target, event.to_xml().as_bytes()).await;
        }

        tracing::warn!("cot publisher fell behind its queue; resubscribing");
    }
}

/// Write one event, reconnecting at most once; a second failure drops it
async fn deliver(connection: &mut Option<TakConnection>, target: &TakTarget, payload: &[u8]) {
    if connection.is_none() {
        match TakConnection::open(target).await {
            Ok(fresh) => *connection = Some(fresh),
            Err(e) => {
                tracing::warn!(error = %e, "TAK connect failed; event dropped");
                return;
            }
        }
    }

    if let Some(active) = connection.as_mut() {
        if let Err(e) = active.send(payload).await {
            tracing::warn!(error = %e, "TAK send failed; reconnecting");
            *connection = None;
            match TakConnection::open(target).await {
                Ok(mut fresh) => match fresh.send(payload).await {
                    Ok(()) => *connection = Some(fresh),
                    Err(e) => tracing::warn!(error = %e, "TAK resend failed; event dropped"),
                },
                Err(e) => tracing::warn!(error = %e, "TAK reconnect failed; event dropped"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(sn: &str, lat: Option<f64>) -> String {
        serde_json::to_string(&BroadcastMessage {
            sn: sn.to_string(),
            ts: Utc::now(),
            lat,
            lon: lat.map(|_| -114.07),
            height_m: Some(80.0),
            speed_h_mps: Some(12.5),
            direction_deg: Some(270),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_publisher_sends_events_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = TakTarget::Udp(receiver.local_addr().unwrap().to_string());

        let registry = Arc::new(SubscriberRegistry::new());
        let publisher = Arc::new(CotPublisher::new());
        assert!(publisher.spawn(Arc::clone(&registry), target));

        // Let the loop register itself before broadcasting
        while registry.is_empty().await {
            tokio::task::yield_now().await;
        }

        // A row without a position fix is skipped; the next one is plotted
        registry.broadcast(&sample_json("NOFIX", None)).await;
        registry
            .broadcast(&sample_json("SENSOR-1234", Some(51.05)))
            .await;

        let mut buf = vec![0u8; 4096];
        let (n, _) = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            receiver.recv_from(&mut buf),
        )
        .await
        .expect("publisher should emit a datagram")
        .unwrap();

        let xml = String::from_utf8_lossy(&buf[..n]);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("skytrack.UAS.1234"));
        assert!(!xml.contains("NOFIX"));
    }

    #[tokio::test]
    async fn test_spawn_guard_allows_single_instance() {
        let registry = Arc::new(SubscriberRegistry::new());
        let publisher = Arc::new(CotPublisher::new());
        let target = TakTarget::Udp("127.0.0.1:9".to_string());

        assert!(publisher.spawn(Arc::clone(&registry), target.clone()));
        assert!(publisher.is_running());

        // Second start while the first loop is alive is a no-op
        assert!(!publisher.spawn(registry, target));
    }

    #[test]
    fn test_publisher_starts_idle() {
        let publisher = CotPublisher::new();
        assert!(!publisher.is_running());
    }
}
