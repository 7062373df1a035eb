//! Fixtures for common runs and artifacts.

use super::ScriptedTextGenerator;
use crate::core::FinalArtifact;
use serde_json::{json, Map};

/// Plotting code that passes the default sandbox policy.
pub const PLOT_CODE: &str = "import matplotlib.pyplot as plt\nplt.plot([1, 2, 3])";

/// A text generator scripted for a full native run: the retrieval
/// analysis, the plan, then styled specification, plotting code and the
/// given critique for each iteration.
#[must_use]
pub fn native_script(critiques: &[&str]) -> ScriptedTextGenerator {
    let mut replies = vec![
        "r1 is the closest reference.".to_string(),
        "A line plot of training loss against epoch.".to_string(),
    ];
    for (i, critique) in critiques.iter().enumerate() {
        replies.push(format!("Styled specification v{}", i + 1));
        replies.push(PLOT_CODE.to_string());
        replies.push((*critique).to_string());
    }
    ScriptedTextGenerator::new(replies)
}

/// A finished single-iteration artifact.
#[must_use]
pub fn sample_artifact() -> FinalArtifact {
    FinalArtifact {
        image_data: Some("data:image/png;base64,AQID".to_string()),
        payload: json!({"type": "diagram", "diagram_type": "plot", "version": "1.0", "spec": "styled", "components": []}),
        code: Some(PLOT_CODE.to_string()),
        specification: "styled".to_string(),
        quality_score: 9,
        evaluation: "Score: 9/10, Accept.".to_string(),
        iterations: 1,
        image_path: None,
        metadata: Map::new(),
    }
}
