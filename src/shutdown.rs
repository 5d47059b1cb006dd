//! Cooperative shutdown for in-flight convergence waits.
//!
//! All blocking polls in the engine take a [`Shutdown`] receiver so that an
//! operator stopping the process interrupts them immediately instead of
//! waiting out their deadlines.

use tokio::sync::watch;

/// Sender half; owned by whoever drives process lifecycle.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown. All subscribed waits return `SyncError::Cancelled`.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver half; cloned into every polling component.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested. If the handle is dropped
    /// without requesting shutdown, this pends forever, which is what a
    /// `select!` against a sleep wants.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `dur` unless shutdown fires first. Returns `true` when the
    /// full sleep elapsed, `false` on shutdown.
    pub async fn sleep(&mut self, dur: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(dur) => true,
            _ = self.wait() => false,
        }
    }
}

/// Create a linked shutdown handle/receiver pair.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}
