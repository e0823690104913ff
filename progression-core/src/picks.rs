//! Pick-step derivation.
//!
//! Turns the quota rows for a class level (and its subclass) into the ordered
//! list of pick steps the build wizard walks through: "choose 2 cantrips",
//! "choose 1 fighting style", and so on.

use crate::choices::{ChoiceIndex, OwnerType, QuotaRow};
use crate::config::EngineConfig;
use crate::content::ContentBundle;
use crate::naming::{clamp_level, normalize_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical pick categories, declared in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickKind {
    Cantrips,
    Spells,
    Metamagic,
    Smites,
    Invocations,
    Maneuvers,
    FightingStyles,
    Infusions,
    Disciplines,
    Runes,
    Totems,
    FavoredEnemies,
    FavoredTerrains,
    Expertise,
    Skills,
    Passives,
    Feats,
}

impl PickKind {
    pub const ALL: [PickKind; 17] = [
        PickKind::Cantrips,
        PickKind::Spells,
        PickKind::Metamagic,
        PickKind::Smites,
        PickKind::Invocations,
        PickKind::Maneuvers,
        PickKind::FightingStyles,
        PickKind::Infusions,
        PickKind::Disciplines,
        PickKind::Runes,
        PickKind::Totems,
        PickKind::FavoredEnemies,
        PickKind::FavoredTerrains,
        PickKind::Expertise,
        PickKind::Skills,
        PickKind::Passives,
        PickKind::Feats,
    ];

    /// Map a sheet pick type to a kind.
    ///
    /// Case, spacing, punctuation, plurals and British spellings are all
    /// accepted: `"Fighting Style"`, `"fighting_styles"` and `"FIGHTING-STYLE"`
    /// are the same kind.
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase()
            .replace("favour", "favor")
            .replace("manoeuvre", "maneuver");

        let kind = match key.as_str() {
            "cantrip" | "cantrips" | "cantripsknown" => PickKind::Cantrips,
            "spell" | "spells" | "spellsknown" | "knownspells" => PickKind::Spells,
            "metamagic" | "metamagics" | "metamagicoption" | "metamagicoptions" => {
                PickKind::Metamagic
            }
            "smite" | "smites" => PickKind::Smites,
            "invocation" | "invocations" | "eldritchinvocation" | "eldritchinvocations" => {
                PickKind::Invocations
            }
            "maneuver" | "maneuvers" | "battlemaneuver" | "battlemaneuvers" => PickKind::Maneuvers,
            "fightingstyle" | "fightingstyles" => PickKind::FightingStyles,
            "infusion" | "infusions" | "artificerinfusion" | "artificerinfusions" => {
                PickKind::Infusions
            }
            "discipline" | "disciplines" | "psionicdiscipline" | "psionicdisciplines" => {
                PickKind::Disciplines
            }
            "rune" | "runes" => PickKind::Runes,
            "totem" | "totems" | "totemspirit" | "totemspirits" => PickKind::Totems,
            "favoredenemy" | "favoredenemies" => PickKind::FavoredEnemies,
            "favoredterrain" | "favoredterrains" => PickKind::FavoredTerrains,
            "expertise" | "expertises" => PickKind::Expertise,
            "skill" | "skills" | "skillproficiency" | "skillproficiencies" => PickKind::Skills,
            "passive" | "passives" => PickKind::Passives,
            "feat" | "feats" => PickKind::Feats,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            PickKind::Cantrips => "Cantrips",
            PickKind::Spells => "Spells",
            PickKind::Metamagic => "Metamagic",
            PickKind::Smites => "Smites",
            PickKind::Invocations => "Invocations",
            PickKind::Maneuvers => "Maneuvers",
            PickKind::FightingStyles => "Fighting Styles",
            PickKind::Infusions => "Infusions",
            PickKind::Disciplines => "Disciplines",
            PickKind::Runes => "Runes",
            PickKind::Totems => "Totems",
            PickKind::FavoredEnemies => "Favored Enemies",
            PickKind::FavoredTerrains => "Favored Terrains",
            PickKind::Expertise => "Expertise",
            PickKind::Skills => "Skills",
            PickKind::Passives => "Passives",
            PickKind::Feats => "Feats",
        }
    }
}

impl fmt::Display for PickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One pick step for a class level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: PickKind,
    pub label: String,
    pub need: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<OwnerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// `None` means the pick is unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_restriction: Option<String>,
}

/// Whether a list restriction lifts all restrictions.
pub fn is_unrestricted(list: &str) -> bool {
    list.trim().eq_ignore_ascii_case("any")
}

/// List restriction while rows of one kind are being merged.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListMerge {
    Unset,
    Specific { list: String, owner_type: OwnerType },
    Any,
}

impl ListMerge {
    fn absorb(&mut self, owner_type: OwnerType, list: Option<&str>) {
        let Some(list) = list else { return };
        if is_unrestricted(list) {
            *self = ListMerge::Any;
            return;
        }
        match *self {
            ListMerge::Any => {}
            ListMerge::Unset => {
                *self = ListMerge::Specific {
                    list: list.to_string(),
                    owner_type,
                }
            }
            // A subclass row's list beats one from the class row.
            ListMerge::Specific {
                owner_type: OwnerType::Class,
                ..
            } if owner_type == OwnerType::Subclass => {
                *self = ListMerge::Specific {
                    list: list.to_string(),
                    owner_type,
                }
            }
            ListMerge::Specific { .. } => {}
        }
    }

    fn into_restriction(self) -> Option<String> {
        match self {
            ListMerge::Specific { list, .. } => Some(list),
            ListMerge::Unset | ListMerge::Any => None,
        }
    }
}

#[derive(Debug)]
struct StepBuilder {
    need: u32,
    owner_type: OwnerType,
    owner_id: String,
    list: ListMerge,
}

impl StepBuilder {
    fn new(owner_type: OwnerType, owner_id: &str) -> Self {
        Self {
            need: 0,
            owner_type,
            owner_id: owner_id.to_string(),
            list: ListMerge::Unset,
        }
    }

    fn absorb(&mut self, row: &QuotaRow) {
        self.need = self.need.saturating_add(row.count);
        if row.owner_type == OwnerType::Subclass {
            self.owner_type = OwnerType::Subclass;
            self.owner_id = row.owner_id.clone();
        }
        self.list.absorb(row.owner_type, row.list_restriction.as_deref());
    }

    fn build(self, kind: PickKind) -> Step {
        Step {
            kind,
            label: kind.label().to_string(),
            need: self.need,
            owner_type: Some(self.owner_type),
            owner_id: Some(self.owner_id),
            list_restriction: self.list.into_restriction(),
        }
    }
}

/// Derives pick steps from a choice index and the loaded class tables.
#[derive(Debug, Clone, Copy)]
pub struct PickStepDeriver<'a> {
    index: &'a ChoiceIndex,
    content: &'a ContentBundle,
    config: &'a EngineConfig,
}

impl<'a> PickStepDeriver<'a> {
    pub fn new(index: &'a ChoiceIndex, content: &'a ContentBundle, config: &'a EngineConfig) -> Self {
        Self {
            index,
            content,
            config,
        }
    }

    /// Deriver over the bundle's own choice index.
    pub fn for_bundle(content: &'a ContentBundle, config: &'a EngineConfig) -> Self {
        Self::new(content.choices(), content, config)
    }

    /// Pick steps for reaching `class_level` in a class.
    ///
    /// Rows of the same kind are summed into one step. Class-wide casters
    /// without an explicit cantrip or spell row get one from the growth of
    /// their known-count tables. Steps that need nothing are left out, and
    /// the result is in [`PickKind`] order.
    pub fn resolve_build_steps(
        &self,
        class_id: &str,
        subclass_id: Option<&str>,
        class_level: u8,
    ) -> Vec<Step> {
        let class_id = normalize_id(class_id);
        let level = clamp_level(class_level);

        let class_rows = self.index.rows_for(OwnerType::Class, &class_id, level);
        let subclass_rows = subclass_id
            .into_iter()
            .flat_map(|sub| self.index.rows_for(OwnerType::Subclass, sub, level));

        let mut merged: BTreeMap<PickKind, StepBuilder> = BTreeMap::new();
        for row in class_rows.chain(subclass_rows) {
            let Some(kind) = PickKind::parse(&row.pick_type) else {
                tracing::trace!(
                    pick_type = %row.pick_type,
                    owner_type = %row.owner_type,
                    owner = %row.owner_id,
                    "unrecognized pick type"
                );
                continue;
            };
            merged
                .entry(kind)
                .or_insert_with(|| StepBuilder::new(row.owner_type, &row.owner_id))
                .absorb(row);
        }

        if self.config.is_class_wide_caster(&class_id) {
            for kind in [PickKind::Cantrips, PickKind::Spells] {
                if merged.contains_key(&kind) {
                    continue;
                }
                let need = self.known_growth(&class_id, kind, level);
                if need > 0 {
                    let mut step = StepBuilder::new(OwnerType::Class, &class_id);
                    step.need = need;
                    merged.insert(kind, step);
                }
            }
        }

        merged
            .into_iter()
            .map(|(kind, step)| step.build(kind))
            .filter(|step| step.need > 0)
            .collect()
    }

    /// Known-count growth from `level - 1` to `level`. Missing entries are zero.
    fn known_growth(&self, class_id: &str, kind: PickKind, level: u8) -> u32 {
        if level == 0 {
            return 0;
        }
        let Some(spellcasting) = self
            .content
            .progression(class_id)
            .and_then(|p| p.spellcasting.as_ref())
        else {
            return 0;
        };
        let table = match kind {
            PickKind::Cantrips => &spellcasting.cantrips_known_by_level,
            PickKind::Spells => &spellcasting.spells_known_by_level,
            _ => return 0,
        };
        let now = table.get(&level).copied().unwrap_or(0);
        let before = table.get(&(level - 1)).copied().unwrap_or(0);
        now.saturating_sub(before)
    }
}
