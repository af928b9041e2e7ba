//! # Change-Notification Listener
//!
//! Supervised LISTEN loop: connect to the store's notification channel,
//! subscribe, and forward every payload verbatim to the subscriber registry.
//! Any failure while connecting, subscribing, or consuming logs the cause,
//! sleeps a fixed interval, and rebuilds the connection from scratch. The
//! loop has no terminal state reachable from normal operation; it ends only
//! with the process.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgListener;

use super::registry::SubscriberRegistry;
use crate::store::NOTIFY_CHANNEL;

/// Fixed delay before reconnecting after any listen failure
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Source of store change notifications.
///
/// Production subscribes over Postgres LISTEN; tests substitute scripted
/// feeds to drive the supervisor through failure and recovery.
trait NotificationFeed {
    async fn recv(&mut self) -> Result<String, sqlx::Error>;
}

/// LISTEN subscription on the store's notification channel
struct PgNotificationFeed {
    listener: PgListener,
}

impl PgNotificationFeed {
    /// Open a fresh connection and subscribe
    async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect(database_url).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        tracing::info!(channel = NOTIFY_CHANNEL, "notification listener subscribed");
        Ok(Self { listener })
    }
}

impl NotificationFeed for PgNotificationFeed {
    async fn recv(&mut self) -> Result<String, sqlx::Error> {
        self.listener
            .recv()
            .await
            .map(|notification| notification.payload().to_string())
    }
}

/// Supervisor handle for the listen loop.
///
/// At most one loop runs per handle; the flag is set before spawning and
/// cleared only if the task ever returns, closing the check-then-spawn race.
#[derive(Debug, Default)]
pub struct NotificationListener {
    running: AtomicBool,
}

impl NotificationListener {
    /// Create an idle listener handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the listen loop unless one is already active.
    ///
    /// Returns `true` if a new loop was started; a second call while the
    /// first loop is alive is a no-op, not an error.
    pub fn spawn(
        self: &Arc<Self>,
        registry: Arc<SubscriberRegistry>,
        database_url: String,
    ) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let guard = Arc::clone(self);
        tokio::spawn(async move {
            run_listen_loop(&registry, || PgNotificationFeed::connect(&database_url)).await;
            guard.running.store(false, Ordering::SeqCst);
        });

        true
    }

    /// Whether a listen loop is currently active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Retry-forever supervisor around [`listen_once`]
async fn run_listen_loop<C, Fut, F>(registry: &SubscriberRegistry, connect: C)
where
    C: Fn() -> Fut,
    Fut: Future<Output = Result<F, sqlx::Error>>,
    F: NotificationFeed,
{
    loop {
        let error = listen_once(registry, &connect).await;
        tracing::warn!(error = %error, retry_secs = RETRY_DELAY.as_secs(), "notification listener failed; reconnecting");
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

/// One connect → subscribe → consume cycle; returns the error that ended it.
///
/// The prior connection is never reused across failures: every cycle opens a
/// fresh one.
async fn listen_once<C, Fut, F>(registry: &SubscriberRegistry, connect: &C) -> sqlx::Error
where
    C: Fn() -> Fut,
    Fut: Future<Output = Result<F, sqlx::Error>>,
    F: NotificationFeed,
{
    let mut feed = match connect().await {
        Ok(feed) => feed,
        Err(e) => return e,
    };

    loop {
        match feed.recv().await {
            Ok(payload) => {
                registry.broadcast(&payload).await;
            }
            Err(e) => return e,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Feed that yields a fixed payload list, then idles forever
    struct ScriptedFeed {
        payloads: std::vec::IntoIter<String>,
    }

    impl ScriptedFeed {
        fn new(payloads: Vec<&str>) -> Self {
            Self {
                payloads: payloads
                    .into_iter()
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .into_iter(),
            }
        }
    }

    impl NotificationFeed for ScriptedFeed {
        async fn recv(&mut self) -> Result<String, sqlx::Error> {
            match self.payloads.next() {
                Some(payload) => Ok(payload),
                // Exhausted: hold the subscription open like an idle channel
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_loop_recovers_after_connect_failure() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (_id, mut rx) = registry.connect().await;

        let attempts = Arc::new(AtomicUsize::new(0));
        let connect_attempts = Arc::clone(&attempts);
        let loop_registry = Arc::clone(&registry);

        let supervisor = tokio::spawn(async move {
            run_listen_loop(&loop_registry, move || {
                let attempt = connect_attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        // First connection attempt fails outright
                        Err(sqlx::Error::PoolClosed)
                    } else {
                        Ok(ScriptedFeed::new(vec!["resumed"]))
                    }
                }
            })
            .await;
        });

        // Paused time fast-forwards through the reconnect backoff; the
        // second cycle must subscribe and forward to the registry.
        let payload = tokio::time::timeout(RETRY_DELAY * 5, rx.recv())
            .await
            .expect("listen loop should reconnect and forward")
            .unwrap();

        assert_eq!(payload, "resumed");
        assert!(attempts.load(Ordering::SeqCst) >= 2);
        supervisor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_loop_reconnects_after_feed_error() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (_id, mut rx) = registry.connect().await;

        let attempts = Arc::new(AtomicUsize::new(0));
        let connect_attempts = Arc::clone(&attempts);
        let loop_registry = Arc::clone(&registry);

        let supervisor = tokio::spawn(async move {
            run_listen_loop(&loop_registry, move || {
                let attempt = connect_attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        // First subscription dies mid-stream after one payload
                        Ok(ScriptedFeedThenError::new("before-drop"))
                    } else {
                        Err(sqlx::Error::PoolClosed)
                    }
                }
            })
            .await;
        });

        assert_eq!(
            tokio::time::timeout(RETRY_DELAY * 5, rx.recv())
                .await
                .expect("payload before the feed error must arrive")
                .unwrap(),
            "before-drop"
        );

        // The loop must tear the dead feed down and attempt a new connection
        while attempts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(RETRY_DELAY).await;
        }
        supervisor.abort();
    }

    /// Feed that yields one payload, then fails
    struct ScriptedFeedThenError {
        payload: Option<String>,
    }

    impl ScriptedFeedThenError {
        fn new(payload: &str) -> Self {
            Self {
                payload: Some(payload.to_string()),
            }
        }
    }

    impl NotificationFeed for ScriptedFeedThenError {
        async fn recv(&mut self) -> Result<String, sqlx::Error> {
            match self.payload.take() {
                Some(payload) => Ok(payload),
                None => Err(sqlx::Error::PoolClosed),
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_guard_allows_single_instance() {
        let listener = Arc::new(NotificationListener::new());
        let registry = Arc::new(SubscriberRegistry::new());

        // An unreachable database keeps the loop cycling through its
        // backoff, so the guard stays held for the whole test.
        let url = "postgres://127.0.0.1:1/skytrack".to_string();
        assert!(listener.spawn(Arc::clone(&registry), url.clone()));
        assert!(listener.is_running());

        // Second start while the first loop is alive is a no-op
        assert!(!listener.spawn(registry, url));
    }

    #[test]
    fn test_listener_starts_idle() {
        let listener = NotificationListener::new();
        assert!(!listener.is_running());
    }
}
