use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::adapter::BluetoothAdapter;
use crate::core::bluetooth::events::AdapterEvent;

/// Runs timed discovery sessions on the adapter.
///
/// When a session's window elapses the adapter is told to stop and
/// `DiscoveryFinished` is pushed into the event channel. A cancelled session
/// stops the adapter without emitting anything.
pub struct DiscoveryScanner {
    adapter: Arc<dyn BluetoothAdapter>,
    events: mpsc::UnboundedSender<AdapterEvent>,
    cancel_token: CancellationToken,
    active: Arc<AtomicBool>,
    scan_task_handle: Option<JoinHandle<Result<()>>>,
}

impl DiscoveryScanner {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>, events: mpsc::UnboundedSender<AdapterEvent>) -> Self {
        Self {
            adapter,
            events,
            cancel_token: CancellationToken::new(),
            active: Arc::new(AtomicBool::new(false)),
            scan_task_handle: None,
        }
    }

    /// Starts a discovery session, replacing any session already running.
    pub async fn start(&mut self, duration: Duration) -> Result<()> {
        if self.scan_task_handle.is_some() {
            self.stop().await?;
        }

        self.adapter.start_discovery().await?;

        self.cancel_token = CancellationToken::new();
        self.active.store(true, Ordering::SeqCst);
        let cancel_token_for_task = self.cancel_token.clone();
        let active_for_task = self.active.clone();
        let adapter_for_task = self.adapter.clone();
        let events_for_task = self.events.clone();

        let handle = tokio::spawn(async move {
            Self::discovery_task(
                adapter_for_task,
                events_for_task,
                cancel_token_for_task,
                active_for_task,
                duration,
            )
            .await
        });
        self.scan_task_handle = Some(handle);

        info!("Discovery started for {} s.", duration.as_secs());
        Ok(())
    }

    async fn discovery_task(
        adapter: Arc<dyn BluetoothAdapter>,
        events: mpsc::UnboundedSender<AdapterEvent>,
        cancel_token: CancellationToken,
        active: Arc<AtomicBool>,
        duration: Duration,
    ) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                info!("Discovery window elapsed.");
                active.store(false, Ordering::SeqCst);
                let stopped = adapter.stop_discovery().await;
                if events.send(AdapterEvent::DiscoveryFinished).is_err() {
                    debug!("Event channel closed before discovery finished.");
                }
                stopped
            }
            _ = cancel_token.cancelled() => {
                info!("Discovery cancelled.");
                adapter.stop_discovery().await
            }
        }
    }

    /// Cancels the running session, if any, and waits for it to wind down.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            debug!("Waiting for discovery task to finish...");
            match handle.await {
                Ok(Ok(())) => info!("Discovery task finished."),
                Ok(Err(e)) => error!("Discovery task finished with an error: {}", e),
                Err(e) if e.is_cancelled() => info!("Discovery task was cancelled."),
                Err(e) => error!("Discovery task failed to join: {}", e),
            }
        } else {
            debug!("No active discovery task to stop.");
        }
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// True while a session's window is open.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::scripted::{AdapterCall, Script, ScriptedAdapter};

    #[tokio::test(start_paused = true)]
    async fn session_ends_after_its_window() {
        let adapter = Arc::new(ScriptedAdapter::new(Script::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scanner = DiscoveryScanner::new(adapter.clone(), tx);

        scanner.start(Duration::from_secs(10)).await.unwrap();
        assert!(scanner.is_running());

        assert_eq!(rx.recv().await, Some(AdapterEvent::DiscoveryFinished));
        assert!(!scanner.is_running());
        assert_eq!(
            adapter.calls(),
            vec![AdapterCall::StartDiscovery, AdapterCall::StopDiscovery]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_session_stops_quietly() {
        let adapter = Arc::new(ScriptedAdapter::new(Script::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scanner = DiscoveryScanner::new(adapter.clone(), tx);

        scanner.start(Duration::from_secs(10)).await.unwrap();
        scanner.stop().await.unwrap();

        assert!(!scanner.is_running());
        assert!(rx.try_recv().is_err());
        assert_eq!(
            adapter.calls(),
            vec![AdapterCall::StartDiscovery, AdapterCall::StopDiscovery]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_running_session() {
        let adapter = Arc::new(ScriptedAdapter::new(Script::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scanner = DiscoveryScanner::new(adapter.clone(), tx);

        scanner.start(Duration::from_secs(10)).await.unwrap();
        scanner.start(Duration::from_secs(10)).await.unwrap();

        assert!(scanner.is_running());
        assert_eq!(
            adapter.calls(),
            vec![
                AdapterCall::StartDiscovery,
                AdapterCall::StopDiscovery,
                AdapterCall::StartDiscovery
            ]
        );
    }
}
