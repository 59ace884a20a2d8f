use serde::{Deserialize, Serialize};

/// Bounds for the radio anti-repeat window.
pub const MIN_REPEAT_INTERVAL_FLOOR: usize = 1;
pub const MIN_REPEAT_INTERVAL_CEIL: usize = 1024;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PlayerConfig {
    /// Default number of distinct plays required before a song may recur
    /// in radio mode. Clamped to [1, 1024].
    pub min_repeat_interval: usize,
    /// Optional cap on the explicit queue; `enqueue` past it is rejected.
    pub max_queue_length: Option<usize>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            min_repeat_interval: 32,
            max_queue_length: None,
        }
    }
}

/// Clamp a requested anti-repeat window into the supported range.
pub fn clamp_repeat_interval(value: usize) -> usize {
    value.clamp(MIN_REPEAT_INTERVAL_FLOOR, MIN_REPEAT_INTERVAL_CEIL)
}
