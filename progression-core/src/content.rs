//! Content bundles: everything the engine reads, loaded in one piece.
//!
//! A bundle carries the class progressions, the subclass catalog and the
//! choice index. Loading normalizes ids and field spellings once, so the
//! resolver and the pick-step deriver only ever see canonical records.

use crate::choices::ChoiceIndex;
use crate::naming::normalize_id;
use crate::progression::{ClassProgression, SubclassCatalog, SubclassDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading a content bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

fn current_version() -> u32 {
    BUNDLE_VERSION
}

/// Loaded leveling tables and pick quotas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawContentBundle")]
pub struct ContentBundle {
    version: u32,
    classes: BTreeMap<String, ClassProgression>,
    subclasses: SubclassCatalog,
    choices: ChoiceIndex,
}

/// Bundle as written by the exporter, before ids are normalized.
#[derive(Debug, Deserialize)]
struct RawContentBundle {
    #[serde(default = "current_version")]
    version: u32,
    #[serde(default, alias = "classProgressions", alias = "class_progressions")]
    classes: BTreeMap<String, ClassProgression>,
    #[serde(default, alias = "subclassCatalog", alias = "subclass_catalog")]
    subclasses: SubclassCatalog,
    #[serde(default, alias = "choiceIndex", alias = "choice_index")]
    choices: ChoiceIndex,
}

impl From<RawContentBundle> for ContentBundle {
    fn from(raw: RawContentBundle) -> Self {
        let mut bundle = ContentBundle {
            version: raw.version,
            classes: BTreeMap::new(),
            subclasses: BTreeMap::new(),
            choices: raw.choices,
        };
        for (key, progression) in raw.classes {
            bundle.insert_class(&key, progression);
        }
        for (class_key, defs) in raw.subclasses {
            for (sub_key, def) in defs {
                bundle.insert_subclass(&class_key, &sub_key, def);
            }
        }
        bundle
    }
}

impl Default for ContentBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self {
            version: BUNDLE_VERSION,
            classes: BTreeMap::new(),
            subclasses: BTreeMap::new(),
            choices: ChoiceIndex::default(),
        }
    }

    /// Add a class progression, keyed by its class id.
    pub fn with_class(mut self, progression: ClassProgression) -> Self {
        let key = progression.class_id.clone();
        self.insert_class(&key, progression);
        self
    }

    /// Add a subclass under `class_id`, keyed by the subclass id.
    pub fn with_subclass(mut self, class_id: &str, subclass: SubclassDefinition) -> Self {
        let key = subclass.id.clone();
        self.insert_subclass(class_id, &key, subclass);
        self
    }

    pub fn with_choices(mut self, choices: ChoiceIndex) -> Self {
        self.choices = choices;
        self
    }

    fn insert_class(&mut self, key: &str, mut progression: ClassProgression) {
        let key = normalize_id(key);
        progression.class_id = match normalize_id(&progression.class_id) {
            id if id.is_empty() => key.clone(),
            id => id,
        };
        if progression.display_name.trim().is_empty() {
            progression.display_name = progression.class_id.clone();
        }
        self.classes.insert(key, progression);
    }

    fn insert_subclass(&mut self, class_key: &str, sub_key: &str, mut def: SubclassDefinition) {
        let sub_key = normalize_id(sub_key);
        def.id = match normalize_id(&def.id) {
            id if id.is_empty() => sub_key.clone(),
            id => id,
        };
        if def.name.trim().is_empty() {
            def.name = def.id.clone();
        }
        self.subclasses
            .entry(normalize_id(class_key))
            .or_default()
            .insert(sub_key, def);
    }

    /// Parse a bundle from JSON text.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.check_version()?;
        Ok(bundle)
    }

    /// Load a bundle from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Write the bundle as pretty JSON.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    fn check_version(&self) -> Result<(), LoadError> {
        if self.version != BUNDLE_VERSION {
            return Err(LoadError::VersionMismatch {
                expected: BUNDLE_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Progression table for a class id.
    pub fn progression(&self, class_id: &str) -> Option<&ClassProgression> {
        self.classes.get(&normalize_id(class_id))
    }

    /// Subclass definition for a class/subclass pair.
    pub fn subclass(&self, class_id: &str, subclass_id: &str) -> Option<&SubclassDefinition> {
        self.subclasses
            .get(&normalize_id(class_id))?
            .get(&normalize_id(subclass_id))
    }

    /// All subclasses of a class.
    pub fn subclasses_of(&self, class_id: &str) -> impl Iterator<Item = &SubclassDefinition> {
        self.subclasses
            .get(&normalize_id(class_id))
            .into_iter()
            .flat_map(|defs| defs.values())
    }

    pub fn subclass_catalog(&self) -> &SubclassCatalog {
        &self.subclasses
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassProgression> {
        self.classes.values()
    }

    pub fn choices(&self) -> &ChoiceIndex {
        &self.choices
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.subclasses.is_empty() && self.choices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::OwnerType;

    const BUNDLE: &str = r#"{
        "classProgressions": {
            "Wizard": {
                "classId": "Wizard",
                "levels": {"1": [{"type": "feature", "id": "wizard.spellcasting", "name": "Spellcasting"}]}
            }
        },
        "subclassCatalog": {
            "WIZARD": {
                "Evocation": {"id": "", "name": "", "levels": {"2nd": ["Sculpt Spells"]}}
            }
        },
        "choices": [
            {"OwnerType": "Class", "OwnerId": "Wizard", "Level": 1, "PickType": "Cantrips", "Count": 3}
        ]
    }"#;

    #[test]
    fn test_from_json_normalizes_ids() {
        let bundle = ContentBundle::from_json(BUNDLE).unwrap();

        let wizard = bundle.progression("wizard").unwrap();
        assert_eq!(wizard.class_id, "wizard");
        // Display name falls back to the id.
        assert_eq!(wizard.display_name, "wizard");
        assert!(bundle.progression("WIZARD ").is_some());

        let evocation = bundle.subclass("Wizard", "EVOCATION").unwrap();
        assert_eq!(evocation.id, "evocation");
        assert_eq!(bundle.subclasses_of("wizard").count(), 1);

        assert_eq!(bundle.choices().rows_for(OwnerType::Class, "wizard", 1).count(), 1);
        assert_eq!(bundle.version(), BUNDLE_VERSION);
    }

    #[test]
    fn test_subclass_header_row_does_not_reject_bundle() {
        let json = r#"{
            "classes": {"fighter": {"classId": "fighter", "levels": {}}},
            "subclasses": {
                "fighter": {
                    "champion": {"levels": {"Level": "Features", "3rd": ["Improved Critical"]}}
                }
            }
        }"#;
        let bundle = ContentBundle::from_json(json).unwrap();

        let champion = bundle.subclass("fighter", "champion").unwrap();
        assert_eq!(champion.levels.len(), 1);
        assert_eq!(champion.levels["3rd"], vec!["Improved Critical".to_string()]);
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let result = ContentBundle::from_json(r#"{"version": 7}"#);
        assert!(matches!(
            result,
            Err(LoadError::VersionMismatch {
                expected: 1,
                found: 7
            })
        ));
    }

    #[test]
    fn test_bad_json_is_a_load_error() {
        assert!(matches!(ContentBundle::from_json("{"), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = ContentBundle::from_json("{}").unwrap();
        assert!(bundle.is_empty());
        assert!(bundle.progression("anything").is_none());
    }

    #[test]
    fn test_builder_matches_parsed() {
        let built = ContentBundle::new()
            .with_class(ClassProgression::new("Rogue", "Rogue"))
            .with_subclass("rogue", SubclassDefinition::new("Thief", "Thief"));
        assert!(built.progression("rogue").is_some());
        assert!(built.subclass("ROGUE", "thief").is_some());
    }
}
