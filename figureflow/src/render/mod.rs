//! Rendering helpers for the native backend.
//!
//! Generated plotting code is cleaned, screened by the [`SandboxPolicy`] and
//! only then handed to a [`RenderExecutor`](crate::stages::RenderExecutor)
//! together with the [`ExecutionContext`] describing what the code may use.

mod sandbox;

pub use sandbox::{Capability, ExecutionContext, SandboxPolicy};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};

/// Payload schema version.
pub const PAYLOAD_VERSION: &str = "1.0";

/// Strips surrounding markdown code fences from model output.
#[must_use]
pub fn clean_code(code: &str) -> String {
    let mut code = code.trim();
    if let Some(rest) = code.strip_prefix("```python") {
        code = rest;
    }
    if let Some(rest) = code.strip_prefix("```") {
        code = rest;
    }
    if let Some(rest) = code.strip_suffix("```") {
        code = rest;
    }
    code.trim().to_string()
}

/// Encodes PNG bytes as a `data:` URL.
#[must_use]
pub fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Builds the structured diagram payload clients render natively.
#[must_use]
pub fn diagram_payload(specification: &str, diagram_type: &str) -> Value {
    json!({
        "type": "diagram",
        "diagram_type": diagram_type,
        "version": PAYLOAD_VERSION,
        "spec": specification,
        "components": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_code_strips_fences() {
        let raw = "```python\nimport matplotlib.pyplot as plt\nplt.plot([1])\n```";
        assert_eq!(clean_code(raw), "import matplotlib.pyplot as plt\nplt.plot([1])");
    }

    #[test]
    fn test_clean_code_plain_fence_and_whitespace() {
        assert_eq!(clean_code("  ```\nx = 1\n```  "), "x = 1");
        assert_eq!(clean_code("x = 1"), "x = 1");
    }

    #[test]
    fn test_png_data_url() {
        assert_eq!(png_data_url(&[0x89, 0x50]), "data:image/png;base64,iVA=");
    }

    #[test]
    fn test_diagram_payload() {
        let payload = diagram_payload("spec", "plot");
        assert_eq!(payload["version"], json!("1.0"));
        assert_eq!(payload["components"], json!([]));
        assert_eq!(payload["diagram_type"], json!("plot"));
    }
}
