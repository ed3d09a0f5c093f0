//! Engine configuration

/// Default number of parsed formulas kept before the cache is flushed
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Settings for a [`FormulaEngine`](crate::FormulaEngine)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineSettings {
    /// Parsed formulas kept before a full flush
    pub cache_capacity: usize,
    /// Reuse parsed trees for repeated formula text
    pub cache_enabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}
