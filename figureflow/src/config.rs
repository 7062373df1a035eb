//! Orchestrator configuration and collaborator credentials.

use crate::critique::DEFAULT_MAX_ITERATIONS;
use crate::errors::{FigureflowError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Refinement-loop cap; also the iteration at which critique is forced
    /// to accept.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Capacity of the bounded event channel between a run and its consumer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Model name passed to the text-generation collaborator.
    #[serde(default = "default_text_model")]
    pub text_model: String,
    /// Maximum `(type, domain)` reference matches.
    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,
    /// Maximum domain-only reference matches.
    #[serde(default = "default_reference_fallback_limit")]
    pub reference_fallback_limit: usize,
    /// Upper bound on the `selected_count` reported by retrieval.
    #[serde(default = "default_selected_reference_count")]
    pub selected_reference_count: usize,
    /// External pipeline settings.
    #[serde(default)]
    pub external: ExternalPipelineConfig,
}

const fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

const fn default_event_buffer() -> usize {
    32
}

fn default_text_model() -> String {
    "gemini-pro".to_string()
}

const fn default_reference_limit() -> usize {
    10
}

const fn default_reference_fallback_limit() -> usize {
    5
}

const fn default_selected_reference_count() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            event_buffer: default_event_buffer(),
            text_model: default_text_model(),
            reference_limit: default_reference_limit(),
            reference_fallback_limit: default_reference_fallback_limit(),
            selected_reference_count: default_selected_reference_count(),
            external: ExternalPipelineConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FigureflowError::Config`] if `max_iterations` or
    /// `event_buffer` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(FigureflowError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(FigureflowError::Config(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings handed to the external pipeline library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPipelineConfig {
    /// Vision-language model provider.
    #[serde(default = "default_vlm_provider")]
    pub vlm_provider: String,
    /// Vision-language model used for planning and critique.
    #[serde(default = "default_vlm_model")]
    pub vlm_model: String,
    /// Image generation provider.
    #[serde(default = "default_image_provider")]
    pub image_provider: String,
    /// Image generation model.
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Refinement iterations the library runs internally.
    #[serde(default = "default_max_iterations")]
    pub refinement_iterations: u32,
}

fn default_vlm_provider() -> String {
    "gemini".to_string()
}

fn default_vlm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_image_provider() -> String {
    "google_imagen".to_string()
}

fn default_image_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

impl Default for ExternalPipelineConfig {
    fn default() -> Self {
        Self {
            vlm_provider: default_vlm_provider(),
            vlm_model: default_vlm_model(),
            image_provider: default_image_provider(),
            image_model: default_image_model(),
            refinement_iterations: default_max_iterations(),
        }
    }
}

/// Collaborator credentials discovered at startup.
///
/// Empty values count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Key for the text-generation collaborator.
    pub text_api_key: Option<String>,
    /// Storage collaborator URL.
    pub storage_url: Option<String>,
    /// Storage collaborator key.
    pub storage_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("text_api_key", &self.text_api_key.as_ref().map(|_| "<redacted>"))
            .field("storage_url", &self.storage_url)
            .field("storage_key", &self.storage_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Reads credentials from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through `lookup`, first non-empty name wins.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        Self {
            text_api_key: first(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            storage_url: first(&["SUPABASE_URL", "VITE_SUPABASE_URL"]),
            storage_key: first(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]),
        }
    }

    /// Returns true if a text-generation key is present.
    #[must_use]
    pub const fn text_generation_configured(&self) -> bool {
        self.text_api_key.is_some()
    }

    /// Returns true if both storage URL and key are present.
    #[must_use]
    pub const fn storage_configured(&self) -> bool {
        self.storage_url.is_some() && self.storage_key.is_some()
    }
}
