//! Backend availability and per-request backend selection.

use super::DiagramBackend;
use crate::config::Credentials;
use crate::errors::{FigureflowError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message of the error returned when no backend can serve a request.
pub const NO_BACKEND_MESSAGE: &str = "No orchestrator available. Check API keys configuration.";

/// Which backends can run, detected once at startup.
///
/// Serializes as the health report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAvailability {
    /// A text-generation key is configured.
    pub text_generation_configured: bool,
    /// Storage URL and key are configured.
    pub storage_configured: bool,
    /// The native backend can be constructed.
    pub native_ready: bool,
    /// The external pipeline library is linked in.
    pub external_available: bool,
    /// The external backend can be constructed.
    pub external_ready: bool,
}

impl BackendAvailability {
    /// Derives availability from credentials and whether an external
    /// pipeline implementation is present.
    ///
    /// Both backends need text generation and storage.
    #[must_use]
    pub const fn detect(credentials: &Credentials, external_available: bool) -> Self {
        let text_generation_configured = credentials.text_generation_configured();
        let storage_configured = credentials.storage_configured();
        let native_ready = text_generation_configured && storage_configured;
        Self {
            text_generation_configured,
            storage_configured,
            native_ready,
            external_available,
            external_ready: native_ready && external_available,
        }
    }

    /// Returns true if at least one backend can run.
    #[must_use]
    pub const fn any_ready(&self) -> bool {
        self.native_ready || self.external_ready
    }
}

/// Picks the backend for one request.
///
/// The external backend is used when the caller prefers it and it is
/// configured; otherwise the native backend. If only one backend is
/// configured it serves every request.
///
/// # Errors
///
/// Returns [`FigureflowError::BackendUnavailable`] when neither backend is
/// configured.
pub fn select_backend(
    prefer_external: bool,
    native: Option<&Arc<dyn DiagramBackend>>,
    external: Option<&Arc<dyn DiagramBackend>>,
) -> Result<Arc<dyn DiagramBackend>> {
    let (first, second) = if prefer_external {
        (external, native)
    } else {
        (native, external)
    };

    first
        .or(second)
        .cloned()
        .ok_or_else(|| FigureflowError::BackendUnavailable(NO_BACKEND_MESSAGE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BackendKind;
    use crate::testing::StubBackend;

    fn creds(text: bool, storage: bool) -> Credentials {
        Credentials {
            text_api_key: text.then(|| "k".to_string()),
            storage_url: storage.then(|| "https://db".to_string()),
            storage_key: storage.then(|| "anon".to_string()),
        }
    }

    #[test]
    fn test_detect() {
        let availability = BackendAvailability::detect(&creds(true, true), false);
        assert!(availability.native_ready);
        assert!(!availability.external_ready);

        let availability = BackendAvailability::detect(&creds(true, false), true);
        assert!(availability.external_available);
        assert!(!availability.external_ready);
        assert!(!availability.any_ready());
    }

    #[test]
    fn test_health_report_shape() {
        let json = serde_json::to_value(BackendAvailability::detect(&creds(true, true), true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text_generation_configured": true,
                "storage_configured": true,
                "native_ready": true,
                "external_available": true,
                "external_ready": true,
            })
        );
    }

    #[test]
    fn test_select_prefers_external() {
        let native: Arc<dyn DiagramBackend> = Arc::new(StubBackend::new(BackendKind::Native));
        let external: Arc<dyn DiagramBackend> = Arc::new(StubBackend::new(BackendKind::External));

        let chosen = select_backend(true, Some(&native), Some(&external)).unwrap();
        assert_eq!(chosen.kind(), BackendKind::External);

        let chosen = select_backend(false, Some(&native), Some(&external)).unwrap();
        assert_eq!(chosen.kind(), BackendKind::Native);

        let chosen = select_backend(true, Some(&native), None).unwrap();
        assert_eq!(chosen.kind(), BackendKind::Native);
    }

    #[test]
    fn test_select_none() {
        let err = select_backend(true, None, None).unwrap_err();
        assert_eq!(err.to_string(), NO_BACKEND_MESSAGE);
    }
}
