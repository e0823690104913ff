//! Leveling tables: class progressions, grants, subclasses and spellcasting.
//!
//! These are the canonical record shapes the resolver reads. They are
//! produced once at the load boundary (see [`crate::content`]) and never
//! mutated afterwards.

use crate::naming::parse_level_key;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

// ============================================================================
// Grants
// ============================================================================

/// A single rule-table entry awarded at a class level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grant {
    /// A permanent, named ability.
    Feature(FeatureGrant),
    /// A decision requiring `count` selections.
    Choice(ChoiceGrant),
    /// A spell pick, resolved exactly like [`Grant::Choice`].
    #[serde(alias = "spellChoice")]
    SpellChoice(ChoiceGrant),
    /// The subclass decision; any selection satisfies it.
    #[serde(alias = "subclassPick")]
    SubclassPick(ChoiceGrant),
    /// Ability score improvement or feat.
    #[serde(alias = "asiOrFeatGate")]
    AsiOrFeatGate {
        #[serde(default)]
        level: u8,
    },
    /// Tag this engine does not understand yet. Skipped during resolution.
    #[serde(other)]
    Unknown,
}

impl Grant {
    pub fn feature(id: impl Into<String>, name: impl Into<String>) -> Self {
        Grant::Feature(FeatureGrant {
            id: id.into(),
            name: name.into(),
            text: None,
        })
    }

    pub fn choice(id: impl Into<String>, prompt: impl Into<String>, count: u32) -> Self {
        Grant::Choice(ChoiceGrant::new(id, prompt, count))
    }

    pub fn feat_gate(level: u8) -> Self {
        Grant::AsiOrFeatGate { level }
    }

    /// Choice payload for the choice-shaped variants.
    pub fn as_choice(&self) -> Option<&ChoiceGrant> {
        match self {
            Grant::Choice(c) | Grant::SpellChoice(c) | Grant::SubclassPick(c) => Some(c),
            _ => None,
        }
    }
}

/// Payload of [`Grant::Feature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGrant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload shared by the choice-shaped grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceGrant {
    /// Selection key. Grants without one get a synthesized id when resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_count")]
    pub count: u32,
    /// May be empty; the picker fills it in.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ChoiceRules>,
}

fn default_count() -> u32 {
    1
}

impl ChoiceGrant {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, count: u32) -> Self {
        Self {
            id: Some(id.into()),
            prompt: prompt.into(),
            count,
            options: Vec::new(),
            rules: None,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_rules(mut self, rules: ChoiceRules) -> Self {
        self.rules = Some(rules);
        self
    }
}

/// Extra constraints on a choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRules {
    /// Pick category, e.g. `"passive"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Which list the options come from, e.g. a class id or `"any"`.
    #[serde(
        default,
        alias = "listRestriction",
        alias = "list_restriction",
        skip_serializing_if = "Option::is_none"
    )]
    pub list: Option<String>,
}

impl ChoiceRules {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            list: None,
        }
    }
}

// ============================================================================
// Class progression
// ============================================================================

/// Per-class leveling table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassProgression {
    #[serde(default, alias = "classId")]
    pub class_id: String,
    #[serde(default, alias = "displayName")]
    pub display_name: String,
    #[serde(
        default,
        serialize_with = "level_keyed::serialize",
        deserialize_with = "level_keyed::deserialize_grants"
    )]
    pub levels: BTreeMap<u8, Vec<Grant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subclass: Option<SubclassInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spellcasting: Option<Spellcasting>,
}

impl ClassProgression {
    pub fn new(class_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            display_name: display_name.into(),
            levels: BTreeMap::new(),
            subclass: None,
            spellcasting: None,
        }
    }

    /// Append a grant at `level`.
    pub fn with_grant(mut self, level: u8, grant: Grant) -> Self {
        self.levels.entry(level).or_default().push(grant);
        self
    }

    pub fn with_subclass_info(mut self, pick_level: u8, options: Vec<String>) -> Self {
        self.subclass = Some(SubclassInfo {
            pick_level,
            options,
        });
        self
    }

    pub fn with_spellcasting(mut self, spellcasting: Spellcasting) -> Self {
        self.spellcasting = Some(spellcasting);
        self
    }

    /// Grants awarded at exactly `level`.
    pub fn grants_at(&self, level: u8) -> &[Grant] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// When and from what the subclass is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassInfo {
    #[serde(alias = "pickLevel")]
    pub pick_level: u8,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A subclass overlay: ordinal level key to feature names.
///
/// Level keys stay raw here; they are parsed when the subclass is grafted so
/// that header rows in source sheets fall away silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubclassDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "level_keyed::deserialize_names")]
    pub levels: BTreeMap<String, Vec<String>>,
}

impl SubclassDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            levels: BTreeMap::new(),
        }
    }

    pub fn with_level(mut self, key: impl Into<String>, names: &[&str]) -> Self {
        self.levels
            .entry(key.into())
            .or_default()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }
}

/// class id -> subclass id -> definition.
pub type SubclassCatalog = BTreeMap<String, BTreeMap<String, SubclassDefinition>>;

// ============================================================================
// Spellcasting
// ============================================================================

/// How a class casts spells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CasterKind {
    Prepared,
    Known,
    Pact,
    Half,
    Third,
    #[default]
    None,
}

impl From<String> for CasterKind {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "prepared" => CasterKind::Prepared,
            "known" => CasterKind::Known,
            "pact" => CasterKind::Pact,
            "half" => CasterKind::Half,
            "third" => CasterKind::Third,
            _ => CasterKind::None,
        }
    }
}

/// Spellcasting tables for a class. Every table is keyed by class level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spellcasting {
    #[serde(default)]
    pub kind: CasterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<String>,
    /// Long-rest slots; index 0..=5 holds slot levels 1..=6.
    #[serde(default, alias = "slotsByLevel", with = "level_keyed")]
    pub slots_by_level: BTreeMap<u8, Vec<u32>>,
    #[serde(default, alias = "cantripsKnownByLevel", with = "level_keyed")]
    pub cantrips_known_by_level: BTreeMap<u8, u32>,
    #[serde(default, alias = "spellsKnownByLevel", with = "level_keyed")]
    pub spells_known_by_level: BTreeMap<u8, u32>,
    #[serde(default, alias = "pactSlotsByLevel", with = "level_keyed")]
    pub pact_slots_by_level: BTreeMap<u8, u32>,
    #[serde(default, alias = "pactSlotLevelByLevel", with = "level_keyed")]
    pub pact_slot_level_by_level: BTreeMap<u8, u8>,
}

impl Spellcasting {
    pub fn new(kind: CasterKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.ability = Some(ability.into());
        self
    }

    pub fn with_slots(mut self, level: u8, row: &[u32]) -> Self {
        self.slots_by_level.insert(level, row.to_vec());
        self
    }

    pub fn with_cantrips_known(mut self, level: u8, count: u32) -> Self {
        self.cantrips_known_by_level.insert(level, count);
        self
    }

    pub fn with_spells_known(mut self, level: u8, count: u32) -> Self {
        self.spells_known_by_level.insert(level, count);
        self
    }

    pub fn with_pact_slots(mut self, level: u8, slots: u32, slot_level: u8) -> Self {
        self.pact_slots_by_level.insert(level, slots);
        self.pact_slot_level_by_level.insert(level, slot_level);
        self
    }

    /// Pact slots at a class level as `(count, slot_level)`, when both tables agree.
    pub fn pact_at(&self, level: u8) -> Option<(u32, u8)> {
        let slots = *self.pact_slots_by_level.get(&level)?;
        let slot_level = *self.pact_slot_level_by_level.get(&level)?;
        Some((slots, slot_level))
    }
}

// ============================================================================
// Level-keyed maps
// ============================================================================

/// Serde adapter for maps keyed by class level.
///
/// JSON object keys are strings; keys (or values) that don't parse are
/// dropped rather than failing the whole table.
pub(crate) mod level_keyed {
    use super::*;

    pub fn serialize<S, T>(map: &BTreeMap<u8, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        map.serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<u8, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let mut map = BTreeMap::new();
        for (level, value) in rows(deserializer)? {
            match serde_json::from_value(value) {
                Ok(v) => {
                    map.insert(level, v);
                }
                Err(e) => tracing::debug!(level, error = %e, "ignoring malformed level row"),
            }
        }
        Ok(map)
    }

    /// Grant rows are parsed one grant at a time so a bad entry only costs
    /// itself, not its neighbours.
    pub fn deserialize_grants<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<u8, Vec<Grant>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = BTreeMap::new();
        for (level, value) in rows(deserializer)? {
            let serde_json::Value::Array(items) = value else {
                tracing::debug!(level, "ignoring level row that is not a list");
                continue;
            };
            let grants = items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Grant>(item) {
                    Ok(grant) => Some(grant),
                    Err(e) => {
                        tracing::debug!(level, error = %e, "ignoring malformed grant");
                        None
                    }
                })
                .collect();
            map.insert(level, grants);
        }
        Ok(map)
    }

    /// Subclass overlays keep their raw keys, but only rows that look like a
    /// level and hold a list of names survive.
    pub fn deserialize_names<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for (key, value) in raw {
            if parse_level_key(&key).is_none() {
                tracing::debug!(key = %key, "ignoring unparsable subclass level key");
                continue;
            }
            match serde_json::from_value::<Vec<String>>(value) {
                Ok(names) => {
                    map.insert(key, names);
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "ignoring malformed subclass row")
                }
            }
        }
        Ok(map)
    }

    fn rows<'de, D>(deserializer: D) -> Result<Vec<(u8, serde_json::Value)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(key, value)| match parse_level_key(&key) {
                Some(level) => Some((level, value)),
                None => {
                    tracing::debug!(key = %key, "ignoring unparsable level key");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_tags_deserialize() {
        let json = r#"[
            {"type": "feature", "id": "wizard.arcane_recovery", "name": "Arcane Recovery"},
            {"type": "choice", "id": "wizard.cantrips.1", "prompt": "Pick cantrips", "count": 3},
            {"type": "spell_choice", "prompt": "Pick a spell"},
            {"type": "subclass_pick", "id": "wizard.subclass", "prompt": "School"},
            {"type": "asi_or_feat_gate", "level": 4},
            {"type": "ritual_book", "id": "whatever"}
        ]"#;
        let grants: Vec<Grant> = serde_json::from_str(json).unwrap();

        assert!(matches!(grants[0], Grant::Feature(_)));
        assert_eq!(grants[1].as_choice().unwrap().count, 3);
        // Missing count defaults to one pick.
        assert_eq!(grants[2].as_choice().unwrap().count, 1);
        assert!(grants[2].as_choice().unwrap().id.is_none());
        assert!(matches!(grants[3], Grant::SubclassPick(_)));
        assert_eq!(grants[4], Grant::AsiOrFeatGate { level: 4 });
        assert_eq!(grants[5], Grant::Unknown);
    }

    #[test]
    fn test_progression_accepts_camel_case_and_drops_bad_keys() {
        let json = r#"{
            "classId": "wizard",
            "displayName": "Wizard",
            "levels": {
                "Level": [],
                "1": [{"type": "feature", "id": "wizard.spellcasting", "name": "Spellcasting"}],
                "2nd": [{"type": "feature", "id": "wizard.scholar", "name": "Scholar"}]
            },
            "spellcasting": {
                "kind": "Prepared",
                "ability": "INT",
                "slotsByLevel": {"1": [2], "2": [3], "header": "x"},
                "spellsKnownByLevel": {"1": 6, "2": "eight"}
            }
        }"#;
        let prog: ClassProgression = serde_json::from_str(json).unwrap();

        assert_eq!(prog.class_id, "wizard");
        assert_eq!(prog.levels.len(), 2);
        assert_eq!(prog.grants_at(2).len(), 1);
        assert!(prog.grants_at(3).is_empty());

        let sc = prog.spellcasting.unwrap();
        assert_eq!(sc.kind, CasterKind::Prepared);
        assert_eq!(sc.slots_by_level.get(&2), Some(&vec![3]));
        assert_eq!(sc.slots_by_level.len(), 2);
        assert_eq!(sc.spells_known_by_level.len(), 1);
    }

    #[test]
    fn test_malformed_grant_only_drops_itself() {
        let json = r#"{
            "classId": "fighter",
            "levels": {
                "1": [
                    {"type": "feature", "id": "fighter.second_wind", "name": "Second Wind"},
                    {"type": "feature", "id": "fighter.bad"},
                    {"type": "choice", "id": "fighter.style", "prompt": "Fighting Style"}
                ],
                "2": {"type": "feature", "id": "fighter.action_surge", "name": "Action Surge"}
            }
        }"#;
        let prog: ClassProgression = serde_json::from_str(json).unwrap();

        let grants = prog.grants_at(1);
        assert_eq!(grants.len(), 2);
        assert!(matches!(&grants[0], Grant::Feature(f) if f.id == "fighter.second_wind"));
        assert_eq!(grants[1].as_choice().unwrap().id.as_deref(), Some("fighter.style"));
        // A row that isn't a list is dropped whole.
        assert!(prog.grants_at(2).is_empty());
    }

    #[test]
    fn test_subclass_header_rows_are_dropped() {
        let json = r#"{
            "id": "champion",
            "name": "Champion",
            "levels": {
                "Level": "Features",
                "3rd": ["Improved Critical"],
                "7th": "Remarkable Athlete",
                "Notes": ["see page 72"]
            }
        }"#;
        let sub: SubclassDefinition = serde_json::from_str(json).unwrap();

        assert_eq!(sub.levels.len(), 1);
        assert_eq!(sub.levels["3rd"], vec!["Improved Critical".to_string()]);
    }

    #[test]
    fn test_unknown_caster_kind_is_none() {
        let sc: Spellcasting = serde_json::from_str(r#"{"kind": "innate"}"#).unwrap();
        assert_eq!(sc.kind, CasterKind::None);
    }

    #[test]
    fn test_pact_at_needs_both_tables() {
        let mut sc = Spellcasting::new(CasterKind::Pact).with_pact_slots(3, 2, 2);
        assert_eq!(sc.pact_at(3), Some((2, 2)));
        sc.pact_slot_level_by_level.remove(&3);
        assert_eq!(sc.pact_at(3), None);
    }
}
