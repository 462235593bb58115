use std::sync::Arc;

use assess_core::model::AssessmentOutcome;
use async_trait::async_trait;
use storage::repository::{RoadmapRepository, StorageError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("outcome receiver dropped")]
    Closed,
}

/// Receives exactly one outcome per completed session.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `SinkError` if the outcome could not be delivered. The session
    /// keeps the outcome so delivery can be retried.
    async fn publish(&self, outcome: &AssessmentOutcome) -> Result<(), SinkError>;
}

/// Persists outcomes through a `RoadmapRepository`.
#[derive(Clone)]
pub struct RepositorySink {
    outcomes: Arc<dyn RoadmapRepository>,
}

impl RepositorySink {
    #[must_use]
    pub fn new(outcomes: Arc<dyn RoadmapRepository>) -> Self {
        Self { outcomes }
    }
}

#[async_trait]
impl ResultSink for RepositorySink {
    async fn publish(&self, outcome: &AssessmentOutcome) -> Result<(), SinkError> {
        let id = self.outcomes.append_outcome(outcome).await?;
        info!(
            outcome_id = id,
            session = %outcome.session_id,
            module = %outcome.module_id,
            "assessment outcome stored"
        );
        Ok(())
    }
}

/// Forwards outcomes to an in-process consumer.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AssessmentOutcome>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AssessmentOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn publish(&self, outcome: &AssessmentOutcome) -> Result<(), SinkError> {
        self.tx
            .send(outcome.clone())
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{AssessmentSummary, ModuleId, SessionId};
    use assess_core::roadmap::RoadmapSynthesizer;
    use assess_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn outcome() -> AssessmentOutcome {
        AssessmentOutcome {
            session_id: SessionId::random(),
            module_id: ModuleId::new(1),
            started_at: fixed_now(),
            completed_at: fixed_now(),
            results: Vec::new(),
            roadmap: RoadmapSynthesizer::default().synthesize(&[]),
            summary: AssessmentSummary::from_results(&[]),
        }
    }

    #[tokio::test]
    async fn repository_sink_appends_outcome() {
        let repo = InMemoryRepository::new();
        let sink = RepositorySink::new(Arc::new(repo.clone()));
        sink.publish(&outcome()).await.unwrap();

        let rows = repo.list_outcomes(ModuleId::new(1), 5).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        let sent = outcome();
        sink.publish(&sent).await.unwrap();
        assert_eq!(rx.recv().await, Some(sent));

        drop(rx);
        assert!(matches!(
            sink.publish(&outcome()).await,
            Err(SinkError::Closed)
        ));
    }
}
