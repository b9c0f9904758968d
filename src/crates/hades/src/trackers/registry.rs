//! Tracker registry: one tracker per resource kind

use crate::error::{HadesError, Result};
use crate::models::ResourceKind;
use crate::trackers::Tracker;
use std::collections::HashMap;
use std::sync::Arc;

/// Static kind -> tracker table
#[derive(Clone, Default)]
pub struct TrackerRegistry {
    trackers: HashMap<ResourceKind, Arc<dyn Tracker>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tracker under the kind it reports
    pub fn register(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.trackers.insert(tracker.kind(), tracker);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Arc<dyn Tracker>> {
        self.trackers.get(&kind).cloned()
    }

    /// Fail unless every resource kind has a tracker
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = ResourceKind::ALL
            .iter()
            .filter(|kind| !self.trackers.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(HadesError::Config(format!(
                "No tracker registered for: {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for TrackerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.trackers.keys().collect();
        kinds.sort();
        f.debug_struct("TrackerRegistry").field("kinds", &kinds).finish()
    }
}
