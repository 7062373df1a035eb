//! Scripted collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::{BackendKind, DiagramRequest, RunPhase};
use crate::errors::{CollaboratorError, PersistenceError, Result};
use crate::events::EventEmitter;
use crate::persistence::{FigureRecord, FigureStore, GenerationRecord, InMemoryFigureStore, FIGURES_TABLE, GENERATIONS_TABLE};
use crate::pipeline::{DiagramBackend, ExternalPipeline, GenerationInput, GenerationOutput};
use crate::render::ExecutionContext;
use crate::stages::{ReferenceLookup, ReferenceRecord, RenderExecutor, TextGenerator};

/// A text generator that replays a fixed script and records prompts.
///
/// Replies are served in order; once the script is exhausted the last
/// reply repeats.
#[derive(Debug, Default)]
pub struct ScriptedTextGenerator {
    replies: Vec<std::result::Result<String, String>>,
    cursor: Mutex<usize>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextGenerator {
    /// Creates a generator replying with `replies`.
    #[must_use]
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Creates a generator whose every call fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_results(vec![Err(message.into())])
    }

    /// Creates a generator from explicit successes and failures.
    #[must_use]
    pub fn from_results(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies,
            ..Self::default()
        }
    }

    /// Prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, CollaboratorError> {
        self.prompts.lock().push(prompt.to_string());

        let index = {
            let mut cursor = self.cursor.lock();
            let index = *cursor;
            *cursor += 1;
            index.min(self.replies.len().saturating_sub(1))
        };

        match self.replies.get(index) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(message)) => Err(CollaboratorError::Request(message.clone())),
            None => Ok(String::new()),
        }
    }
}

/// A reference lookup returning the same records for every query.
#[derive(Debug, Default)]
pub struct StaticReferences {
    records: Vec<ReferenceRecord>,
}

impl StaticReferences {
    /// Creates a lookup over `records`.
    #[must_use]
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ReferenceLookup for StaticReferences {
    async fn find_references(&self, _diagram_type: &str, _domain: &str) -> Vec<ReferenceRecord> {
        self.records.clone()
    }
}

/// A renderer with a fixed outcome that records what it was asked to run.
#[derive(Debug)]
pub struct StubRenderer {
    outcome: std::result::Result<Option<Vec<u8>>, String>,
    codes: Mutex<Vec<String>>,
    contexts: Mutex<Vec<ExecutionContext>>,
}

impl StubRenderer {
    fn with_outcome(outcome: std::result::Result<Option<Vec<u8>>, String>) -> Self {
        Self {
            outcome,
            codes: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Renders `bytes` for every call.
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self::with_outcome(Ok(Some(bytes)))
    }

    /// Runs the code but produces no image.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_outcome(Ok(None))
    }

    /// Fails every call with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Err(message.into()))
    }

    /// Code received so far.
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().clone()
    }

    /// Execution contexts received so far.
    #[must_use]
    pub fn contexts(&self) -> Vec<ExecutionContext> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl RenderExecutor for StubRenderer {
    async fn render(
        &self,
        code: &str,
        context: &ExecutionContext,
    ) -> std::result::Result<Option<Vec<u8>>, CollaboratorError> {
        self.codes.lock().push(code.to_string());
        self.contexts.lock().push(context.clone());
        self.outcome.clone().map_err(CollaboratorError::Render)
    }
}

/// Where a [`FailingFigureStore`] fails.
#[derive(Debug, Clone)]
enum FailurePoint {
    Figure(String),
    Generation(String),
    NoRow,
}

/// An in-memory store that fails at a chosen point.
#[derive(Debug)]
pub struct FailingFigureStore {
    inner: InMemoryFigureStore,
    failure: FailurePoint,
}

impl FailingFigureStore {
    /// Rejects every figure insert.
    #[must_use]
    pub fn on_figure(message: impl Into<String>) -> Self {
        Self::new(FailurePoint::Figure(message.into()))
    }

    /// Accepts figures but rejects every generation insert.
    #[must_use]
    pub fn on_generation(message: impl Into<String>) -> Self {
        Self::new(FailurePoint::Generation(message.into()))
    }

    /// Accepts figure inserts without returning an identifier.
    #[must_use]
    pub fn without_row() -> Self {
        Self::new(FailurePoint::NoRow)
    }

    fn new(failure: FailurePoint) -> Self {
        Self {
            inner: InMemoryFigureStore::new(),
            failure,
        }
    }

    /// The backing store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryFigureStore {
        &self.inner
    }
}

#[async_trait]
impl FigureStore for FailingFigureStore {
    async fn insert_figure(&self, record: &FigureRecord) -> std::result::Result<Option<String>, PersistenceError> {
        match &self.failure {
            FailurePoint::Figure(message) => Err(PersistenceError::insert(FIGURES_TABLE, message.clone())),
            FailurePoint::NoRow => Ok(None),
            FailurePoint::Generation(_) => self.inner.insert_figure(record).await,
        }
    }

    async fn insert_generation(&self, record: &GenerationRecord) -> std::result::Result<(), PersistenceError> {
        match &self.failure {
            FailurePoint::Generation(message) => {
                Err(PersistenceError::insert(GENERATIONS_TABLE, message.clone()))
            }
            _ => self.inner.insert_generation(record).await,
        }
    }

    async fn delete_figure(&self, figure_id: &str) -> std::result::Result<(), PersistenceError> {
        self.inner.delete_figure(figure_id).await
    }
}

/// An external pipeline with a fixed outcome that records its inputs.
#[derive(Debug)]
pub struct ScriptedExternalPipeline {
    outcome: std::result::Result<GenerationOutput, String>,
    inputs: Arc<Mutex<Vec<GenerationInput>>>,
}

impl ScriptedExternalPipeline {
    /// Returns `output` for every call.
    #[must_use]
    pub fn new(output: GenerationOutput) -> Self {
        Self {
            outcome: Ok(output),
            inputs: Arc::default(),
        }
    }

    /// Fails every call with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            inputs: Arc::default(),
        }
    }

    /// Shared handle to the recorded inputs, usable after the pipeline has
    /// been moved into a backend.
    #[must_use]
    pub fn inputs_handle(&self) -> Arc<Mutex<Vec<GenerationInput>>> {
        Arc::clone(&self.inputs)
    }
}

#[async_trait]
impl ExternalPipeline for ScriptedExternalPipeline {
    async fn generate(&self, input: &GenerationInput) -> std::result::Result<GenerationOutput, CollaboratorError> {
        self.inputs.lock().push(input.clone());
        self.outcome.clone().map_err(CollaboratorError::ExternalPipeline)
    }
}

/// A backend that emits `status(init)` and then either returns without a
/// terminal event or panics.
#[derive(Debug)]
pub struct StubBackend {
    kind: BackendKind,
    panic_message: Option<String>,
}

impl StubBackend {
    /// Creates a stub reporting `kind`.
    #[must_use]
    pub const fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            panic_message: None,
        }
    }

    /// Creates a native stub that panics with `message` after its first
    /// event.
    #[must_use]
    pub fn panicking(message: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Native,
            panic_message: Some(message.into()),
        }
    }
}

#[async_trait]
impl DiagramBackend for StubBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn run(&self, _request: &DiagramRequest, emitter: &mut EventEmitter) -> Result<()> {
        emitter.status(RunPhase::Init, "Starting diagram generation...", None).await?;
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }
        Ok(())
    }
}
