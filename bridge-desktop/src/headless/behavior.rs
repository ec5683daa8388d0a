use std::collections::{HashMap, HashSet};

pub(crate) const DEFAULT_DURATION: f64 = 120.0;

/// Scripted platform behavior, keyed by source URL.
#[derive(Debug, Clone)]
pub(crate) struct Behavior {
    pub durations: HashMap<String, f64>,
    pub default_duration: f64,
    pub failing: HashSet<String>,
    pub stalled: HashSet<String>,
    pub page_counts: HashMap<String, u32>,
    pub reject_play: bool,
    pub picture_in_picture: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            durations: HashMap::new(),
            default_duration: DEFAULT_DURATION,
            failing: HashSet::new(),
            stalled: HashSet::new(),
            page_counts: HashMap::new(),
            reject_play: false,
            picture_in_picture: true,
        }
    }
}

/// What loading a given source produces.
pub(crate) enum LoadOutcome {
    Metadata(f64),
    Failed,
    Stalled,
}

impl Behavior {
    pub(crate) fn outcome_for(&self, source: &str) -> LoadOutcome {
        if self.failing.contains(source) {
            LoadOutcome::Failed
        } else if self.stalled.contains(source) {
            LoadOutcome::Stalled
        } else {
            LoadOutcome::Metadata(
                self.durations
                    .get(source)
                    .copied()
                    .unwrap_or(self.default_duration),
            )
        }
    }
}
