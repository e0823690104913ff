//! Engine configuration.

use crate::naming::normalize_id;
use std::collections::BTreeSet;

/// Environment variable holding a comma-separated caster list.
pub const CASTERS_ENV: &str = "PROGRESSION_CASTERS";

/// Classes whose whole spell list is open to them. Their cantrip and spell
/// picks can be derived from the known-count tables when no quota row says
/// otherwise. Warlock is left out: its picks come from invocations and
/// explicit rows.
pub const DEFAULT_CLASS_WIDE_CASTERS: &[&str] = &[
    "artificer",
    "bard",
    "cleric",
    "druid",
    "paladin",
    "ranger",
    "sorcerer",
    "wizard",
];

/// Configuration for the pick-step deriver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Normalized class ids.
    class_wide_casters: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a config with the default caster set.
    pub fn new() -> Self {
        Self {
            class_wide_casters: DEFAULT_CLASS_WIDE_CASTERS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Create a config, taking the caster set from `PROGRESSION_CASTERS`
    /// when it is set.
    pub fn from_env() -> Self {
        match std::env::var(CASTERS_ENV) {
            Ok(list) => {
                let config = Self::new().with_class_wide_casters(list.split(','));
                tracing::debug!(casters = ?config.class_wide_casters, "caster set from environment");
                config
            }
            Err(_) => Self::new(),
        }
    }

    /// Replace the caster set. Blank entries are ignored.
    pub fn with_class_wide_casters<I, S>(mut self, casters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.class_wide_casters = casters
            .into_iter()
            .map(|c| normalize_id(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    /// Add one class to the caster set.
    pub fn with_class_wide_caster(mut self, class_id: &str) -> Self {
        let id = normalize_id(class_id);
        if !id.is_empty() {
            self.class_wide_casters.insert(id);
        }
        self
    }

    pub fn is_class_wide_caster(&self, class_id: &str) -> bool {
        self.class_wide_casters.contains(&normalize_id(class_id))
    }

    pub fn class_wide_casters(&self) -> impl Iterator<Item = &str> {
        self.class_wide_casters.iter().map(String::as_str)
    }
}
