//! Critique parsing: turns free-text evaluation into a refine/accept decision.
//!
//! This is the only quality gate in a run. Rules are applied in order and
//! the first match wins:
//!
//! 1. `iteration >= max_iterations` forces acceptance with score 7.
//! 2. The text contains "accept" and "refine" does not appear before the
//!    first "accept": accept with score 9.
//! 3. The text mentions a score and a `<n>/10` or `score: <n>` pattern is
//!    found: that score, refining below 8.
//! 4. Otherwise refine with score 6.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use std::sync::OnceLock;

/// Iteration cap shared by the refinement loop and the parser.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Score given when the iteration cap forces acceptance.
pub const FORCED_ACCEPT_SCORE: u8 = 7;

/// Score given when the critic explicitly accepts.
pub const ACCEPT_SCORE: u8 = 9;

/// Score given when nothing could be parsed.
pub const FALLBACK_SCORE: u8 = 6;

/// Parsed scores below this value trigger another iteration.
pub const ACCEPT_THRESHOLD: u8 = 8;

/// The outcome of evaluating one critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritiqueDecision {
    /// Whether another refinement iteration should run.
    pub should_refine: bool,
    /// Quality score in `1..=10`.
    pub quality_score: u8,
}

impl CritiqueDecision {
    /// An accepting decision.
    #[must_use]
    pub const fn accept(quality_score: u8) -> Self {
        Self {
            should_refine: false,
            quality_score,
        }
    }

    /// A refining decision.
    #[must_use]
    pub const fn refine(quality_score: u8) -> Self {
        Self {
            should_refine: true,
            quality_score,
        }
    }
}

fn score_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([0-9]+)/10|score[:\s]+([0-9]+)").ok())
        .as_ref()
}

/// Parses a critique using the default iteration cap.
#[must_use]
pub fn parse_evaluation(evaluation: &str, iteration: u32) -> CritiqueDecision {
    CritiqueParser::default().parse(evaluation, iteration)
}

/// Deterministic critique parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CritiqueParser {
    max_iterations: u32,
}

impl Default for CritiqueParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl CritiqueParser {
    /// Creates a parser that forces acceptance at `max_iterations`.
    #[must_use]
    pub const fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// The iteration cap.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Evaluates `evaluation` produced at `iteration`.
    #[must_use]
    pub fn parse(&self, evaluation: &str, iteration: u32) -> CritiqueDecision {
        if iteration >= self.max_iterations {
            return CritiqueDecision::accept(FORCED_ACCEPT_SCORE);
        }

        let lower = evaluation.to_lowercase();

        if let Some(accept_at) = lower.find("accept") {
            if !lower[..accept_at].contains("refine") {
                return CritiqueDecision::accept(ACCEPT_SCORE);
            }
        }

        // Also covers "quality score".
        if lower.contains("score") {
            if let Some(score) = extract_score(&lower) {
                return CritiqueDecision {
                    should_refine: score < ACCEPT_THRESHOLD,
                    quality_score: score,
                };
            }
        }

        CritiqueDecision::refine(FALLBACK_SCORE)
    }
}

/// First `<n>/10` or `score: <n>` in already-lowercased text, clamped into
/// `1..=10`.
fn extract_score(lower: &str) -> Option<u8> {
    let captures = score_pattern()?.captures(lower)?;
    let digits = captures.get(1).or_else(|| captures.get(2))?.as_str();
    let value = match digits.parse::<u64>() {
        Ok(value) => value,
        // Only a digit run too long for u64 gets here; it is above the range.
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => return None,
    };
    u8::try_from(value.clamp(1, 10)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_cap_forces_acceptance() {
        for iteration in [3, 4, 10, 100] {
            for text in ["", "Refine everything. Score: 2/10", "accept", "garbage"] {
                assert_eq!(
                    parse_evaluation(text, iteration),
                    CritiqueDecision::accept(FORCED_ACCEPT_SCORE)
                );
            }
        }
    }

    #[test]
    fn test_score_nine_accept() {
        let decision = parse_evaluation("Score: 9/10, Accept.", 1);
        assert_eq!(decision, CritiqueDecision::accept(9));
    }

    #[test]
    fn test_accept_without_prior_refine() {
        let decision = parse_evaluation("Overall this is good. Decision: ACCEPT", 1);
        assert_eq!(decision, CritiqueDecision::accept(ACCEPT_SCORE));
    }

    #[test]
    fn test_refine_before_accept_is_not_acceptance() {
        let decision = parse_evaluation("Refine the legend before we can accept. Score: 5/10", 1);
        assert_eq!(decision, CritiqueDecision::refine(5));
    }

    #[test]
    fn test_refine_after_accept_still_accepts() {
        let decision = parse_evaluation("Accept. Could refine colors later.", 2);
        assert_eq!(decision, CritiqueDecision::accept(ACCEPT_SCORE));
    }

    #[test]
    fn test_score_extraction() {
        assert_eq!(parse_evaluation("Overall Quality Score: 8", 1), CritiqueDecision::accept(8));
        assert_eq!(parse_evaluation("quality score 7 - refine", 1), CritiqueDecision::refine(7));
        assert_eq!(parse_evaluation("Refine. I rate it 6/10 on score", 2), CritiqueDecision::refine(6));
    }

    #[test]
    fn test_score_with_whitespace() {
        assert_eq!(parse_evaluation("SCORE:   10 refine nothing", 1).quality_score, 10);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(parse_evaluation("refine, score: 0", 1), CritiqueDecision::refine(1));
        assert_eq!(parse_evaluation("refine, score: 42", 1), CritiqueDecision::accept(10));
    }

    #[test]
    fn test_non_ascii_digits_are_not_scores() {
        assert_eq!(parse_evaluation("Score: \u{0665}/10", 1), CritiqueDecision::refine(FALLBACK_SCORE));
        assert_eq!(
            parse_evaluation("Score: \u{0665}/10, layout 7/10", 1),
            CritiqueDecision::refine(7)
        );
    }

    #[test]
    fn test_oversized_score_clamps_high() {
        let decision = parse_evaluation("score: 99999999999999999999999", 1);
        assert_eq!(decision, CritiqueDecision::accept(10));
    }

    #[test]
    fn test_score_mentioned_without_number_falls_back() {
        let decision = parse_evaluation("Refine: the score is hard to judge", 1);
        assert_eq!(decision, CritiqueDecision::refine(FALLBACK_SCORE));
    }

    #[test]
    fn test_ratio_without_score_word_is_ignored() {
        let decision = parse_evaluation("Refine the axis; 9/10 readers would be confused", 1);
        assert_eq!(decision, CritiqueDecision::refine(FALLBACK_SCORE));
    }

    #[test]
    fn test_fallback() {
        assert_eq!(
            parse_evaluation("Needs more labels.", 1),
            CritiqueDecision::refine(FALLBACK_SCORE)
        );
    }

    #[test]
    fn test_custom_cap() {
        let parser = CritiqueParser::new(5);
        assert_eq!(parser.parse("Needs work", 3), CritiqueDecision::refine(FALLBACK_SCORE));
        assert_eq!(parser.parse("Needs work", 5), CritiqueDecision::accept(FORCED_ACCEPT_SCORE));
    }
}
