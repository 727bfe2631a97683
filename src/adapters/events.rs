use crate::domain::ports::{EngineEvent, EventSink, Notifier};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Hands events to a [`NotificationWorker`] through a bounded channel.
/// A full or closed channel drops the event with a warning.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: EngineEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "Notification queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(?event, "Notification worker stopped, event dropped");
            }
        }
    }
}

pub struct NotificationWorker {
    receiver: mpsc::Receiver<EngineEvent>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(receiver: mpsc::Receiver<EngineEvent>, notifier: Arc<dyn Notifier>) -> Self {
        Self { receiver, notifier }
    }

    /// Drain events until every sender is gone. Returns how many were
    /// delivered successfully; failures are logged and skipped.
    pub async fn run(mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.receiver.recv().await {
            match self.notifier.notify(&event).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(error = %e, ?event, "Notification delivery failed"),
            }
        }
        tracing::debug!(delivered, "Notification worker finished");
        delivered
    }

    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}

/// Writes every event to the log as JSON. Stands in for the email and
/// failure-logging subsystems.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, event: &EngineEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        match event {
            EngineEvent::AllocationFailed { .. } => {
                tracing::warn!(event = %payload, "Allocation failure")
            }
            _ => tracing::info!(event = %payload, "Notification"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MailroomId;
    use crate::utils::error::EngineError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, _event: &EngineEvent) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Ok(())
            } else {
                Err(EngineError::storage("smtp unavailable"))
            }
        }
    }

    fn failure_event() -> EngineEvent {
        EngineEvent::AllocationFailed {
            mailroom: MailroomId::new("mr-a"),
            reason: "exhausted".to_string(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_worker_survives_notifier_failures() {
        let (sink, receiver) = ChannelEventSink::channel(8);
        let notifier = Arc::new(FlakyNotifier {
            calls: AtomicUsize::new(0),
        });
        let worker = NotificationWorker::new(receiver, notifier.clone()).spawn();

        for _ in 0..4 {
            sink.publish(failure_event());
        }
        drop(sink);

        assert_eq!(worker.await.unwrap(), 2);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (sink, receiver) = ChannelEventSink::channel(1);
        sink.publish(failure_event());
        sink.publish(failure_event());
        drop(sink);

        let delivered = NotificationWorker::new(receiver, Arc::new(LoggingNotifier))
            .run()
            .await;
        assert_eq!(delivered, 1);
    }
}
