//! Generation tuning knobs.

use serde::{Deserialize, Serialize};

/// Temperatures and token budgets for the different derivation call sites.
///
/// Judgment calls run at low randomness with a larger output budget than the
/// other derivations; that is a tuning choice, not a correctness requirement,
/// so all of it is plain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationTuning {
    /// Summaries, briefings, dispute points, fact extraction.
    pub derivation_temperature: f32,
    /// Insight accumulation and sanitization.
    pub analysis_temperature: f32,
    /// The verdict call.
    pub judgment_temperature: f32,
    pub derivation_max_tokens: u32,
    /// Sanitization and verdict output budget.
    pub judgment_max_tokens: u32,
}

impl Default for GenerationTuning {
    fn default() -> Self {
        Self {
            derivation_temperature: 0.7,
            analysis_temperature: 0.3,
            judgment_temperature: 0.4,
            derivation_max_tokens: 2000,
            judgment_max_tokens: 6000,
        }
    }
}
