//! Persistence bridge: records finished figures through a storage
//! collaborator.
//!
//! A save is one logical operation over two tables: a `figures` row and a
//! `generations` row referencing it. If the second insert fails the figure
//! row is deleted again (best effort) so a failed save leaves nothing
//! behind.

mod memory;
mod records;

pub use memory::{InMemoryFigureStore, InMemoryReferenceLibrary};
pub use records::{FigureRecord, GenerationRecord, FIGURES_TABLE, GENERATIONS_TABLE};

use crate::core::{BackendKind, DiagramRequest, FinalArtifact};
use crate::errors::PersistenceError;
use crate::utils::elapsed_ms;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Storage collaborator with relational insert semantics.
///
/// Implementations must be safe to call from concurrent runs.
#[async_trait]
pub trait FigureStore: Send + Sync {
    /// Inserts a figure row and returns its identifier, or `None` when the
    /// store accepted the insert without returning a row.
    async fn insert_figure(&self, record: &FigureRecord) -> Result<Option<String>, PersistenceError>;

    /// Inserts a generation-history row.
    async fn insert_generation(&self, record: &GenerationRecord) -> Result<(), PersistenceError>;

    /// Deletes a figure row.
    async fn delete_figure(&self, figure_id: &str) -> Result<(), PersistenceError>;
}

/// Packages a [`FinalArtifact`] into storage records and writes them.
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn FigureStore>,
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge").finish_non_exhaustive()
    }
}

impl PersistenceBridge {
    /// Creates a bridge over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn FigureStore>) -> Self {
        Self { store }
    }

    /// Records a finished run and returns the figure identifier.
    ///
    /// The user and project are taken from `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if either insert fails or the figure
    /// insert returns no identifier.
    pub async fn save(
        &self,
        request: &DiagramRequest,
        artifact: &FinalArtifact,
        backend: BackendKind,
    ) -> Result<String, PersistenceError> {
        let start = Instant::now();
        let figure = FigureRecord::from_run(request, artifact, backend);

        let figure_id = self
            .store
            .insert_figure(&figure)
            .await?
            .ok_or_else(|| PersistenceError::NoRowReturned {
                table: FIGURES_TABLE.to_string(),
            })?;

        let generation = GenerationRecord::from_run(&figure_id, request, artifact);
        if let Err(e) = self.store.insert_generation(&generation).await {
            if let Err(rollback) = self.store.delete_figure(&figure_id).await {
                tracing::warn!(
                    figure_id = %figure_id,
                    error = %rollback,
                    "Failed to roll back figure after generation insert failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            figure_id = %figure_id,
            backend = %backend,
            duration_ms = elapsed_ms(start),
            "Figure saved"
        );
        Ok(figure_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_artifact, FailingFigureStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request() -> DiagramRequest {
        DiagramRequest::new("show training loss curve", "plot", "mathematics", "user-1").with_project("proj-1")
    }

    #[tokio::test]
    async fn test_save_writes_both_rows() {
        let store = Arc::new(InMemoryFigureStore::new());
        let bridge = PersistenceBridge::new(store.clone());

        let figure_id = bridge
            .save(&request(), &sample_artifact(), BackendKind::Native)
            .await
            .unwrap();

        let figure = store.figure(&figure_id).unwrap();
        assert_eq!(figure.user_id, "user-1");
        assert_eq!(figure.project_id.as_deref(), Some("proj-1"));
        assert_eq!(figure.status, "completed");
        assert_eq!(figure.parameters["pipeline"], json!("native"));

        let generations = store.generations_for(&figure_id);
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].iteration, 1);
    }

    #[tokio::test]
    async fn test_figure_insert_failure() {
        let bridge = PersistenceBridge::new(Arc::new(FailingFigureStore::on_figure("connection refused")));

        let err = bridge
            .save(&request(), &sample_artifact(), BackendKind::Native)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Database save failed: insert into 'figures' failed: connection refused"
        );
    }

    #[tokio::test]
    async fn test_generation_failure_rolls_back_figure() {
        let store = Arc::new(FailingFigureStore::on_generation("constraint violation"));
        let bridge = PersistenceBridge::new(store.clone());

        let err = bridge
            .save(&request(), &sample_artifact(), BackendKind::Native)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("generations"));
        assert_eq!(store.inner().figure_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_row_id() {
        let bridge = PersistenceBridge::new(Arc::new(FailingFigureStore::without_row()));

        let err = bridge
            .save(&request(), &sample_artifact(), BackendKind::External)
            .await
            .unwrap_err();

        assert!(matches!(err, PersistenceError::NoRowReturned { .. }));
    }
}
