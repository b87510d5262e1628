//! Shutdown coordination across endpoint servers.

use std::future::Future;

use tokio::sync::broadcast;

/// Fans a single shutdown trigger out to every endpoint server.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Future completing once shutdown has been triggered.
    ///
    /// Subscribes immediately, so a trigger after this call is never missed.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Closed means every sender is gone, which also ends serving.
            let _ = rx.recv().await;
        }
    }

    /// Trigger shutdown; returns how many servers were still listening.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Number of pending `signalled` futures.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_every_listener() {
        let shutdown = Shutdown::new();
        let first = tokio::spawn(shutdown.signalled());
        let second = tokio::spawn(shutdown.signalled());
        assert_eq!(shutdown.listeners(), 2);

        assert_eq!(shutdown.trigger(), 2);
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .unwrap();
    }

    #[test]
    fn trigger_without_listeners() {
        assert_eq!(Shutdown::new().trigger(), 0);
    }
}
