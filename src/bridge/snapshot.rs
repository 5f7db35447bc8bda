//! The bridge's cached view of the control server.

use std::collections::HashMap;

use serde::Serialize;

/// Convert a linear multiplier to a whole percent, rounding half away from
/// zero (0.125 → 13). Non-finite or negative input maps to 0.
pub fn multiplier_to_percent(mul: f64) -> u32 {
    if !mul.is_finite() || mul <= 0.0 {
        return 0;
    }
    (mul * 100.0).round() as u32
}

pub fn percent_to_multiplier(percent: u8) -> f64 {
    f64::from(percent) / 100.0
}

/// Last observed scene and per-source percents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    scene: Option<String>,
    volumes: HashMap<String, u32>,
}

impl Snapshot {
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn volume(&self, source: &str) -> Option<u32> {
        self.volumes.get(source).copied()
    }

    /// Record `scene`; returns `true` when it differs from what was held.
    pub fn observe_scene(&mut self, scene: &str) -> bool {
        if self.scene.as_deref() == Some(scene) {
            return false;
        }
        self.scene = Some(scene.to_string());
        true
    }

    /// Record `percent` for `source`; returns `true` on change.
    pub fn observe_volume(&mut self, source: &str, percent: u32) -> bool {
        match self.volumes.get_mut(source) {
            Some(held) if *held == percent => false,
            Some(held) => {
                *held = percent;
                true
            }
            None => {
                self.volumes.insert(source.to_string(), percent);
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.scene = None;
        self.volumes.clear();
    }

    /// Copy out for a new attachment, volumes ordered like `sources`.
    pub fn to_initial_state(&self, sources: &[String]) -> InitialState {
        InitialState {
            scene: self.scene.clone(),
            volumes: sources
                .iter()
                .filter_map(|s| self.volume(s).map(|v| (s.clone(), v)))
                .collect(),
        }
    }
}

/// What a newly attached client is told. Empty when disconnected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitialState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    pub volumes: Vec<(String, u32)>,
}

impl InitialState {
    pub fn is_empty(&self) -> bool {
        self.scene.is_none() && self.volumes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_example() {
        assert_eq!(multiplier_to_percent(0.755), 76);
    }

    #[test]
    fn test_rounding_half_cases_go_up() {
        // Both exactly representable; banker's rounding would give 12 and 62.
        assert_eq!(multiplier_to_percent(0.125), 13);
        assert_eq!(multiplier_to_percent(0.625), 63);
    }

    #[test]
    fn test_rounding_bounds_and_garbage() {
        assert_eq!(multiplier_to_percent(0.0), 0);
        assert_eq!(multiplier_to_percent(1.0), 100);
        assert_eq!(multiplier_to_percent(2.5), 250);
        assert_eq!(multiplier_to_percent(-0.3), 0);
        assert_eq!(multiplier_to_percent(f64::NAN), 0);
    }

    #[test]
    fn test_percent_to_multiplier() {
        assert_eq!(percent_to_multiplier(0), 0.0);
        assert_eq!(percent_to_multiplier(50), 0.5);
        assert_eq!(percent_to_multiplier(100), 1.0);
    }

    #[test]
    fn test_scene_sequence_changes_once() {
        let mut snap = Snapshot::default();
        let changes: Vec<bool> = ["A", "A", "B"].iter().map(|s| snap.observe_scene(s)).collect();
        assert_eq!(changes, vec![true, false, true]);
        assert_eq!(snap.scene(), Some("B"));
    }

    #[test]
    fn test_volume_first_observation_is_a_change() {
        let mut snap = Snapshot::default();
        assert!(snap.observe_volume("Mic", 0));
        assert!(!snap.observe_volume("Mic", 0));
        assert!(snap.observe_volume("Mic", 5));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut snap = Snapshot::default();
        snap.observe_scene("Live");
        snap.observe_volume("Mic", 80);
        snap.clear();
        assert_eq!(snap, Snapshot::default());
        assert!(snap.observe_scene("Live"));
    }

    #[test]
    fn test_initial_state_follows_source_order() {
        let mut snap = Snapshot::default();
        snap.observe_volume("B", 2);
        snap.observe_volume("A", 1);
        let sources = vec!["A".to_string(), "Missing".to_string(), "B".to_string()];
        let state = snap.to_initial_state(&sources);
        assert_eq!(state.volumes, vec![("A".to_string(), 1), ("B".to_string(), 2)]);
        assert!(state.scene.is_none());
    }
}
