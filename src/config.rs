use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable thresholds shared by the stores and the hit-testing kernel.
/// All values have working defaults; a TOML file can override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hard cap on the undo stack; the oldest entry is evicted on overflow.
    pub max_undo_history: usize,
    /// Lines shorter than this (in pixels) are discarded at finish_drawing.
    pub min_line_length_px: f64,
    /// Default pick radius for hit-testing, in screen-independent pixels.
    pub hit_tolerance_px: f64,
    /// Default Douglas-Peucker tolerance for contour simplification.
    pub simplify_tolerance_px: f64,
    /// Half-width of the temporal smoothing window, in sampled frames.
    pub smoothing_window: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_undo_history: 50,
            min_line_length_px: 2.0,
            hit_tolerance_px: 6.0,
            simplify_tolerance_px: 1.5,
            smoothing_window: 2,
        }
    }
}

impl Settings {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Settings> {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file: {:?}", path.as_ref()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file: {:?}", path.as_ref()))?;
        Ok(settings)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.max_undo_history, 50);
        assert!(s.min_line_length_px > 0.0);
    }

    #[test]
    fn test_partial_toml_override() {
        let s: Settings = toml::from_str("max_undo_history = 10").unwrap();
        assert_eq!(s.max_undo_history, 10);
        // untouched fields keep their defaults
        assert_eq!(s.hit_tolerance_px, Settings::default().hit_tolerance_px);
    }
}
