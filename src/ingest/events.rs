//! Progress and completion events of one ingestion run

use super::IngestFailure;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One event of an ingestion run. Counts are records committed so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IngestEvent {
    Progress { processed: u64 },
    Complete { total: u64 },
    Error { failure: IngestFailure },
}

impl IngestEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestEvent::Progress { .. })
    }
}

/// Producer half of the event channel for a single run.
///
/// `complete` and `fail` consume the reporter, so at most one terminal
/// event can be sent. Sends wait for channel capacity instead of dropping
/// events; a closed receiver makes every send a no-op.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<IngestEvent>>,
    last: u64,
}

impl ProgressReporter {
    /// Create a reporter and the receiver its events go to
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<IngestEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                last: 0,
            },
            rx,
        )
    }

    /// A reporter nobody listens to
    pub fn detached() -> Self {
        Self { tx: None, last: 0 }
    }

    /// Report committed records; never goes backwards
    pub async fn progress(&mut self, processed: u64) {
        if processed < self.last {
            return;
        }
        self.last = processed;
        self.send(IngestEvent::Progress { processed }).await;
    }

    pub async fn complete(mut self, total: u64) {
        self.send(IngestEvent::Complete { total }).await;
    }

    pub async fn fail(mut self, failure: IngestFailure) {
        self.send(IngestEvent::Error { failure }).await;
    }

    async fn send(&mut self, event: IngestEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() {
            // Receiver gone; stop trying.
            self.tx = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FailureKind;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (mut reporter, mut rx) = ProgressReporter::channel(8);
        reporter.progress(2).await;
        reporter.progress(5).await;
        reporter.progress(3).await;
        reporter.complete(5).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                IngestEvent::Progress { processed: 2 },
                IngestEvent::Progress { processed: 5 },
                IngestEvent::Complete { total: 5 },
            ]
        );
        assert!(events[2].is_terminal());
        assert!(!events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_slow_consumer_suspends_producer() {
        let (mut reporter, mut rx) = ProgressReporter::channel(1);

        let producer = tokio::spawn(async move {
            for n in 1..=10 {
                reporter.progress(n).await;
            }
            reporter.complete(10).await;
        });

        let mut received = Vec::new();
        while let Some(event) = rx.recv().await {
            received.push(event);
            tokio::task::yield_now().await;
        }
        producer.await.unwrap();

        assert_eq!(received.len(), 11);
        assert_eq!(received.last(), Some(&IngestEvent::Complete { total: 10 }));
    }

    #[tokio::test]
    async fn test_dropped_receiver_and_detached_are_silent() {
        let (mut reporter, rx) = ProgressReporter::channel(1);
        drop(rx);
        reporter.progress(1).await;
        reporter
            .fail(IngestFailure::new(FailureKind::Io, "gone", 1))
            .await;

        let mut detached = ProgressReporter::detached();
        detached.progress(1).await;
        detached.complete(1).await;
    }
}
