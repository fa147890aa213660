//! Engine configuration: worker width, thresholds, and the iterative-search
//! policy, all explicit values rather than globals.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// When a section analysis may run iterative search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Never search.
    #[default]
    Off,
    /// Search only sections whose floored importance is high.
    HighOnly,
    /// Defer to the analysis backend's own request.
    All,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(SearchMode::Off),
            "high_only" => Ok(SearchMode::HighOnly),
            "all" => Ok(SearchMode::All),
            other => Err(format!(
                "unknown search mode {other:?} (expected off, high_only, or all)"
            )),
        }
    }
}

/// Tuning values for one comparison run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent section analyses.
    pub max_workers: usize,
    /// Minimum cosine similarity for a semantic section mapping.
    pub similarity_threshold: f32,
    /// Numeric tolerance, in percent.
    pub tolerance_pct: f64,
    /// Iterative-search rounds per section, at most.
    pub max_search_iterations: u32,
    pub search_mode: SearchMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            similarity_threshold: 0.7,
            tolerance_pct: 0.01,
            max_search_iterations: 2,
            search_mode: SearchMode::Off,
        }
    }
}
