//! In-memory collaborators for local runs and tests.

use super::{FigureRecord, FigureStore, GenerationRecord};
use crate::config::OrchestratorConfig;
use crate::errors::PersistenceError;
use crate::stages::{ReferenceLookup, ReferenceRecord};
use crate::utils::{new_record_id, now_utc};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Stored figure row.
struct StoredFigure {
    record: FigureRecord,
    created_at: DateTime<Utc>,
}

/// A [`FigureStore`] backed by concurrent maps.
#[derive(Default)]
pub struct InMemoryFigureStore {
    figures: DashMap<String, StoredFigure>,
    generations: DashMap<String, Vec<GenerationRecord>>,
}

impl std::fmt::Debug for InMemoryFigureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFigureStore")
            .field("figures", &self.figures.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryFigureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored figure row.
    #[must_use]
    pub fn figure(&self, figure_id: &str) -> Option<FigureRecord> {
        self.figures.get(figure_id).map(|entry| entry.record.clone())
    }

    /// Returns when a figure row was inserted.
    #[must_use]
    pub fn created_at(&self, figure_id: &str) -> Option<DateTime<Utc>> {
        self.figures.get(figure_id).map(|entry| entry.created_at)
    }

    /// Returns the generation rows of a figure.
    #[must_use]
    pub fn generations_for(&self, figure_id: &str) -> Vec<GenerationRecord> {
        self.generations
            .get(figure_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Number of stored figures.
    #[must_use]
    pub fn figure_count(&self) -> usize {
        self.figures.len()
    }
}

#[async_trait]
impl FigureStore for InMemoryFigureStore {
    async fn insert_figure(&self, record: &FigureRecord) -> Result<Option<String>, PersistenceError> {
        let figure_id = new_record_id();
        self.figures.insert(
            figure_id.clone(),
            StoredFigure {
                record: record.clone(),
                created_at: now_utc(),
            },
        );
        Ok(Some(figure_id))
    }

    async fn insert_generation(&self, record: &GenerationRecord) -> Result<(), PersistenceError> {
        if !self.figures.contains_key(&record.figure_id) {
            return Err(PersistenceError::insert(
                super::GENERATIONS_TABLE,
                format!("figure '{}' does not exist", record.figure_id),
            ));
        }
        self.generations
            .entry(record.figure_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn delete_figure(&self, figure_id: &str) -> Result<(), PersistenceError> {
        self.generations.remove(figure_id);
        self.figures.remove(figure_id);
        Ok(())
    }
}

/// Default number of `(type, domain)` matches returned.
pub const DEFAULT_REFERENCE_LIMIT: usize = 10;

/// Default number of domain-only matches returned when no type matches.
pub const DEFAULT_REFERENCE_FALLBACK_LIMIT: usize = 5;

/// A [`ReferenceLookup`] over a fixed set of reference diagrams.
///
/// Returns up to `limit` records matching both type and domain; when none
/// match, falls back to up to `fallback_limit` records of the same domain.
#[derive(Debug, Clone)]
pub struct InMemoryReferenceLibrary {
    records: Vec<ReferenceRecord>,
    limit: usize,
    fallback_limit: usize,
}

impl InMemoryReferenceLibrary {
    /// Creates a library with the default limits.
    #[must_use]
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self {
            records,
            limit: DEFAULT_REFERENCE_LIMIT,
            fallback_limit: DEFAULT_REFERENCE_FALLBACK_LIMIT,
        }
    }

    /// Creates a library with the limits configured in `config`.
    #[must_use]
    pub fn from_config(records: Vec<ReferenceRecord>, config: &OrchestratorConfig) -> Self {
        Self::new(records).with_limits(config.reference_limit, config.reference_fallback_limit)
    }

    /// Sets both limits.
    #[must_use]
    pub const fn with_limits(mut self, limit: usize, fallback_limit: usize) -> Self {
        self.limit = limit;
        self.fallback_limit = fallback_limit;
        self
    }

    /// Number of records in the library.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the library holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReferenceLookup for InMemoryReferenceLibrary {
    async fn find_references(&self, diagram_type: &str, domain: &str) -> Vec<ReferenceRecord> {
        let exact: Vec<ReferenceRecord> = self
            .records
            .iter()
            .filter(|r| r.diagram_type == diagram_type && r.domain == domain)
            .take(self.limit)
            .cloned()
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        self.records
            .iter()
            .filter(|r| r.domain == domain)
            .take(self.fallback_limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn figure() -> FigureRecord {
        FigureRecord {
            user_id: "u1".to_string(),
            project_id: None,
            diagram_type: "plot".to_string(),
            prompt: "loss curve".to_string(),
            domain: "mathematics".to_string(),
            file_url: None,
            diagram_data: json!({}),
            parameters: json!({}),
            iteration_count: 1,
            status: "completed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generation_requires_figure() {
        let store = InMemoryFigureStore::new();
        let generation = GenerationRecord {
            figure_id: "missing".to_string(),
            iteration: 1,
            prompt: String::new(),
            parameters: json!({}),
            agent_feedback: String::new(),
            diagram_data: json!({}),
        };

        assert!(store.insert_generation(&generation).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_and_delete() {
        let store = InMemoryFigureStore::new();
        let id = store.insert_figure(&figure()).await.unwrap().unwrap();

        assert!(store.figure(&id).is_some());
        assert!(store.created_at(&id).is_some());

        store.delete_figure(&id).await.unwrap();
        assert_eq!(store.figure_count(), 0);
        assert!(store.generations_for(&id).is_empty());
    }

    fn library() -> InMemoryReferenceLibrary {
        let mut records: Vec<_> = (0..12)
            .map(|i| ReferenceRecord::new(format!("plot-{i}"), "plot", "mathematics"))
            .collect();
        records.extend((0..7).map(|i| ReferenceRecord::new(format!("flow-{i}"), "flowchart", "mind")));
        InMemoryReferenceLibrary::new(records)
    }

    #[tokio::test]
    async fn test_exact_matches_are_limited() {
        let found = library().find_references("plot", "mathematics").await;
        assert_eq!(found.len(), DEFAULT_REFERENCE_LIMIT);
        assert!(found.iter().all(|r| r.diagram_type == "plot"));
    }

    #[tokio::test]
    async fn test_domain_fallback() {
        let found = library().find_references("architecture", "mind").await;
        assert_eq!(found.len(), DEFAULT_REFERENCE_FALLBACK_LIMIT);
        assert!(found.iter().all(|r| r.domain == "mind"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        assert!(library().find_references("plot", "motion").await.is_empty());
    }

    #[tokio::test]
    async fn test_limits_from_config() {
        let config = OrchestratorConfig {
            reference_limit: 2,
            reference_fallback_limit: 1,
            ..OrchestratorConfig::default()
        };
        let records: Vec<_> = (0..4)
            .map(|i| ReferenceRecord::new(format!("plot-{i}"), "plot", "mathematics"))
            .collect();
        let library = InMemoryReferenceLibrary::from_config(records, &config);

        assert_eq!(library.find_references("plot", "mathematics").await.len(), 2);
        assert_eq!(library.find_references("chart", "mathematics").await.len(), 1);
    }
}
