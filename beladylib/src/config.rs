use serde::Deserialize;

/// A full simulation configuration: one cache plus the trace window bounds
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    pub cache: CacheConfig,
    /// Instructions replayed to warm the cache before measurement starts.
    /// They still count towards instruction indices
    #[serde(default)]
    pub warmup_instructions: u64,
    pub simulation_instructions: u64,
}

/// A configuration for a single cache
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub size: u64,
    pub line_size: u64,
    pub kind: CacheKindConfig,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyConfig,
}

/// The kind of cache - direct, full, 2way, 4way, or 8way
#[derive(Debug, Deserialize)]
pub enum CacheKindConfig {
    #[serde(alias = "direct")]
    Direct,
    #[serde(alias = "full")]
    Full,
    #[serde(alias = "2way")]
    TwoWay,
    #[serde(alias = "4way")]
    FourWay,
    #[serde(alias = "8way")]
    EightWay,
}

/// The replacement policy. Only the optimal policy ships; baselines it is
/// measured against live with their own simulators
#[derive(Debug, Copy, Clone, Deserialize, Default)]
pub enum ReplacementPolicyConfig {
    #[serde(alias = "opt", alias = "belady")]
    #[default]
    Optimal,
}
