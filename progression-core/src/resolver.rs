//! Progression resolver.
//!
//! Replays every class in a build level by level and produces:
//! 1. the features the character has,
//! 2. the choices still waiting on the player,
//! 3. the long-rest and short-rest spell slot pools.
//!
//! Resolution is a pure function of the input and the loaded content. Nothing
//! is cached between calls and the tables are only ever borrowed.

use crate::content::ContentBundle;
use crate::graft::with_subclass;
use crate::naming::{clamp_level, MAX_SLOT_LEVEL};
use crate::progression::{CasterKind, ChoiceGrant, ChoiceRules, ClassProgression, Grant, Spellcasting};
use crate::selection::{
    is_choice_satisfied, remaining_count, ChoiceRule, Selection, Selections,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

// ============================================================================
// Input
// ============================================================================

/// One class in a multiclass build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    #[serde(alias = "classId")]
    pub class_id: String,
    #[serde(default)]
    pub level: u8,
    #[serde(default, alias = "subclassId", skip_serializing_if = "Option::is_none")]
    pub subclass_id: Option<String>,
}

/// Everything the resolver needs from the current build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveInput {
    /// One entry per class present, not one per character level.
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
    #[serde(default)]
    pub selections: Selections,
}

impl ResolveInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class_id: impl Into<String>, level: u8) -> Self {
        self.classes.push(ClassEntry {
            class_id: class_id.into(),
            level,
            subclass_id: None,
        });
        self
    }

    pub fn with_subclassed(
        mut self,
        class_id: impl Into<String>,
        level: u8,
        subclass_id: impl Into<String>,
    ) -> Self {
        self.classes.push(ClassEntry {
            class_id: class_id.into(),
            level,
            subclass_id: Some(subclass_id.into()),
        });
        self
    }

    pub fn with_selection(mut self, choice_id: impl Into<String>, selection: Selection) -> Self {
        self.selections.insert(choice_id.into(), selection);
        self
    }
}

// ============================================================================
// Output
// ============================================================================

/// A granted feature, attributed to the class that granted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFeature {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub class_id: String,
    pub level: u8,
}

/// Which kind of grant a pending choice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Choice,
    SpellChoice,
    SubclassPick,
    FeatGate,
}

/// A choice the player still has to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    /// Key under which the answer goes into `selections`.
    pub choice_id: String,
    pub kind: PendingKind,
    pub prompt: String,
    pub count: u32,
    pub remaining: u32,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ChoiceRules>,
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subclass_id: Option<String>,
    pub level: u8,
}

/// Spell slot counts by slot level (1..=6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlotPools {
    /// Regained on a long rest.
    pub long_rest: BTreeMap<u8, u32>,
    /// Pact slots, regained on a short rest.
    pub short_rest: BTreeMap<u8, u32>,
}

impl Default for SpellSlotPools {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl SpellSlotPools {
    /// Every slot level present with a count of zero.
    pub fn zeroed() -> Self {
        let zero: BTreeMap<u8, u32> = (1..=MAX_SLOT_LEVEL).map(|l| (l, 0)).collect();
        Self {
            long_rest: zero.clone(),
            short_rest: zero,
        }
    }

    fn add_long_rest(&mut self, slot_level: u8, count: u32) {
        if (1..=MAX_SLOT_LEVEL).contains(&slot_level) {
            let total = self.long_rest.entry(slot_level).or_insert(0);
            *total = total.saturating_add(count);
        }
    }

    fn add_short_rest(&mut self, slot_level: u8, count: u32) {
        if (1..=MAX_SLOT_LEVEL).contains(&slot_level) {
            let total = self.short_rest.entry(slot_level).or_insert(0);
            *total = total.saturating_add(count);
        }
    }

    pub fn long_rest_total(&self) -> u32 {
        self.long_rest.values().sum()
    }

    pub fn short_rest_total(&self) -> u32 {
        self.short_rest.values().sum()
    }
}

/// Pact slots at the current class level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PactSlots {
    pub slots: u32,
    pub slot_level: u8,
}

/// A class's spellcasting at its current level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellcastingSummary {
    pub kind: CasterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cantrips_known: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spells_known: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pact: Option<PactSlots>,
}

/// Summarize spellcasting tables at one class level.
pub fn summarize_spellcasting(spellcasting: &Spellcasting, level: u8) -> SpellcastingSummary {
    SpellcastingSummary {
        kind: spellcasting.kind,
        ability: spellcasting.ability.clone(),
        cantrips_known: spellcasting.cantrips_known_by_level.get(&level).copied(),
        spells_known: spellcasting.spells_known_by_level.get(&level).copied(),
        slots: spellcasting.slots_by_level.get(&level).cloned(),
        pact: spellcasting
            .pact_at(level)
            .map(|(slots, slot_level)| PactSlots { slots, slot_level }),
    }
}

/// Problems with one class entry. Recovered locally, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassIssue {
    #[error("No progression table for class '{class_id}'")]
    MissingProgression { class_id: String },

    #[error("No subclass table '{subclass_id}' for class '{class_id}'")]
    MissingSubclass { class_id: String, subclass_id: String },
}

/// Per-class breakdown of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerClassSummary {
    pub class_id: String,
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subclass_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Grants applied from levels 1..=level, unknown tags excluded.
    pub applied_count: usize,
    pub pending_choices: Vec<PendingChoice>,
    pub spell_slots: SpellSlotPools,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spellcasting: Option<SpellcastingSummary>,
    /// Set when the class could not be resolved at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Problems that did not stop the class from resolving.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PerClassSummary {
    fn failed(entry: &ClassEntry, issue: ClassIssue) -> Self {
        Self {
            class_id: entry.class_id.clone(),
            level: clamp_level(entry.level),
            subclass_id: entry.subclass_id.clone(),
            display_name: None,
            applied_count: 0,
            pending_choices: Vec::new(),
            spell_slots: SpellSlotPools::zeroed(),
            spellcasting: None,
            error: Some(issue.to_string()),
            warnings: Vec::new(),
        }
    }
}

/// Result of resolving a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOutput {
    /// Sum of class levels, including classes that failed to resolve.
    pub total_level: u32,
    pub features: Vec<ResolvedFeature>,
    pub pending_choices: Vec<PendingChoice>,
    pub spell_slots: SpellSlotPools,
    pub per_class: Vec<PerClassSummary>,
}

impl ResolveOutput {
    pub fn feature(&self, id: &str) -> Option<&ResolvedFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn pending(&self, choice_id: &str) -> Option<&PendingChoice> {
        self.pending_choices.iter().find(|p| p.choice_id == choice_id)
    }

    /// True when no choices are outstanding and every class resolved.
    pub fn is_complete(&self) -> bool {
        self.pending_choices.is_empty() && self.per_class.iter().all(|c| c.error.is_none())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Feature map keyed by id that remembers first-insertion order.
#[derive(Default)]
struct FeatureSet {
    features: Vec<ResolvedFeature>,
    index: HashMap<String, usize>,
}

impl FeatureSet {
    /// Insert or overwrite in place; an overwrite keeps the original position.
    fn upsert(&mut self, feature: ResolvedFeature) {
        match self.index.get(&feature.id) {
            Some(&i) => self.features[i] = feature,
            None => {
                self.index.insert(feature.id.clone(), self.features.len());
                self.features.push(feature);
            }
        }
    }
}

/// Resolve a build against loaded content.
///
/// Never fails: a class without a table is reported on its
/// [`PerClassSummary::error`] and the rest of the build still resolves.
pub fn resolve_progression(input: &ResolveInput, data: &ContentBundle) -> ResolveOutput {
    let mut features = FeatureSet::default();
    let mut pending_choices = Vec::new();
    let mut spell_slots = SpellSlotPools::zeroed();
    let mut per_class = Vec::with_capacity(input.classes.len());

    for entry in &input.classes {
        let summary = resolve_class(
            entry,
            &input.selections,
            data,
            &mut features,
            &mut spell_slots,
        );
        pending_choices.extend(summary.pending_choices.iter().cloned());
        per_class.push(summary);
    }

    let total_level = input
        .classes
        .iter()
        .map(|c| u32::from(clamp_level(c.level)))
        .sum();

    ResolveOutput {
        total_level,
        features: features.features,
        pending_choices,
        spell_slots,
        per_class,
    }
}

fn resolve_class(
    entry: &ClassEntry,
    selections: &Selections,
    data: &ContentBundle,
    features: &mut FeatureSet,
    spell_slots: &mut SpellSlotPools,
) -> PerClassSummary {
    let Some(base) = data.progression(&entry.class_id) else {
        let issue = ClassIssue::MissingProgression {
            class_id: entry.class_id.clone(),
        };
        tracing::warn!(class = %entry.class_id, "{issue}");
        return PerClassSummary::failed(entry, issue);
    };

    let mut warnings = Vec::new();
    let subclass_def = match entry.subclass_id.as_deref() {
        Some(subclass_id) => {
            let def = data.subclass(&base.class_id, subclass_id);
            if def.is_none() {
                let issue = ClassIssue::MissingSubclass {
                    class_id: base.class_id.clone(),
                    subclass_id: subclass_id.to_string(),
                };
                tracing::warn!(class = %base.class_id, subclass = subclass_id, "{issue}");
                warnings.push(issue.to_string());
            }
            def
        }
        None => None,
    };

    let prog = with_subclass(base, subclass_def);
    let level = clamp_level(entry.level);

    let ctx = ClassContext {
        prog: &prog,
        subclass_id: entry.subclass_id.as_deref(),
        selections,
    };
    let mut applied_count = 0;
    let mut pending = Vec::new();
    for grant_level in 1..=level {
        for (position, grant) in prog.grants_at(grant_level).iter().enumerate() {
            if matches!(grant, Grant::Unknown) {
                continue;
            }
            applied_count += 1;
            ctx.apply_grant(grant_level, position, grant, features, &mut pending);
        }
    }

    let mut class_slots = SpellSlotPools::zeroed();
    let spellcasting = prog.spellcasting.as_ref().map(|sc| {
        accumulate_slots(sc, level, spell_slots, &mut class_slots);
        summarize_spellcasting(sc, level)
    });

    tracing::debug!(
        class = %prog.class_id,
        level,
        applied = applied_count,
        pending = pending.len(),
        "resolved class"
    );

    PerClassSummary {
        class_id: prog.class_id.clone(),
        level,
        subclass_id: entry.subclass_id.clone(),
        display_name: Some(prog.display_name.clone()),
        applied_count,
        pending_choices: pending,
        spell_slots: class_slots,
        spellcasting,
        error: None,
        warnings,
    }
}

/// The grafted table and inputs shared by every grant of one class entry.
struct ClassContext<'a> {
    prog: &'a ClassProgression,
    subclass_id: Option<&'a str>,
    selections: &'a Selections,
}

impl ClassContext<'_> {
    fn apply_grant(
        &self,
        level: u8,
        position: usize,
        grant: &Grant,
        features: &mut FeatureSet,
        pending: &mut Vec<PendingChoice>,
    ) {
        let class_id = &self.prog.class_id;
        match grant {
            Grant::Feature(feature) => features.upsert(ResolvedFeature {
                id: feature.id.clone(),
                name: feature.name.clone(),
                text: feature.text.clone(),
                class_id: class_id.clone(),
                level,
            }),
            Grant::Choice(choice) | Grant::SpellChoice(choice) | Grant::SubclassPick(choice) => {
                let kind = match grant {
                    Grant::SpellChoice(_) => PendingKind::SpellChoice,
                    Grant::SubclassPick(_) => PendingKind::SubclassPick,
                    _ => PendingKind::Choice,
                };
                self.check_choice(level, position, choice, kind, pending)
            }
            Grant::AsiOrFeatGate { .. } => {
                let choice_id = feat_gate_id(class_id, level);
                let made = self
                    .selections
                    .get(&choice_id)
                    .is_some_and(Selection::is_made);
                if !made {
                    push_pending(
                        pending,
                        PendingChoice {
                            choice_id,
                            kind: PendingKind::FeatGate,
                            prompt: "Ability Score Improvement or Feat".to_string(),
                            count: 1,
                            remaining: 1,
                            options: Vec::new(),
                            rules: None,
                            class_id: class_id.clone(),
                            subclass_id: self.subclass_id.map(str::to_string),
                            level,
                        },
                    );
                }
            }
            Grant::Unknown => {}
        }
    }

    fn check_choice(
        &self,
        level: u8,
        position: usize,
        choice: &ChoiceGrant,
        kind: PendingKind,
        pending: &mut Vec<PendingChoice>,
    ) {
        let choice_id = choice
            .id
            .clone()
            .unwrap_or_else(|| synthesized_choice_id(&self.prog.class_id, level, position));
        let selection = self.selections.get(&choice_id);
        let rule = match kind {
            PendingKind::SubclassPick => ChoiceRule::AnyPick,
            _ => ChoiceRule::Counted,
        };

        if is_choice_satisfied(choice, rule, selection) {
            return;
        }

        push_pending(
            pending,
            PendingChoice {
                choice_id,
                kind,
                prompt: choice.prompt.clone(),
                count: choice.count,
                remaining: remaining_count(choice, selection),
                options: choice.options.clone(),
                rules: choice.rules.clone(),
                class_id: self.prog.class_id.clone(),
                subclass_id: self.subclass_id.map(str::to_string),
                level,
            },
        );
    }
}

/// One pending entry per choice id within a class; the first one wins.
fn push_pending(pending: &mut Vec<PendingChoice>, choice: PendingChoice) {
    if pending.iter().any(|p| p.choice_id == choice.choice_id) {
        tracing::trace!(choice = %choice.choice_id, "duplicate pending choice");
        return;
    }
    pending.push(choice);
}

fn accumulate_slots(
    spellcasting: &Spellcasting,
    level: u8,
    global: &mut SpellSlotPools,
    class_slots: &mut SpellSlotPools,
) {
    if let Some(row) = spellcasting.slots_by_level.get(&level) {
        for (i, &count) in row.iter().take(MAX_SLOT_LEVEL as usize).enumerate() {
            let slot_level = i as u8 + 1;
            global.add_long_rest(slot_level, count);
            class_slots.add_long_rest(slot_level, count);
        }
    }

    if let Some((count, slot_level)) = spellcasting.pact_at(level) {
        if (1..=MAX_SLOT_LEVEL).contains(&slot_level) {
            global.add_short_rest(slot_level, count);
            class_slots.add_short_rest(slot_level, count);
        }
    }
}

/// Selection key for the ASI/feat gate of a class at a level.
pub fn feat_gate_id(class_id: &str, level: u8) -> String {
    format!("{class_id}.feat_gate.{level}")
}

/// Selection key for a choice grant that has no id of its own.
pub fn synthesized_choice_id(class_id: &str, level: u8, position: usize) -> String {
    format!("{class_id}.choice.{level}.{position}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::{ChoiceGrant, SubclassDefinition};
    use crate::selection::ASI_MARKER;
    use crate::testing::{sample_bundle, sample_fighter, sample_warlock, sample_wizard};

    fn caster(class_id: &str, spellcasting: Spellcasting) -> ClassProgression {
        ClassProgression::new(class_id, class_id).with_spellcasting(spellcasting)
    }

    #[test]
    fn test_single_class_cumulative_features() {
        let bundle = sample_bundle();
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 2), &bundle);

        assert_eq!(out.total_level, 2);
        let ids: Vec<&str> = out.features.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["wizard.spellcasting", "wizard.arcane_recovery", "wizard.scholar"]);
        assert!(out.feature("wizard.spell_mastery").is_none());
    }

    #[test]
    fn test_level_zero_applies_nothing() {
        let bundle = sample_bundle();
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 0), &bundle);
        assert!(out.features.is_empty());
        assert_eq!(out.per_class[0].applied_count, 0);
        assert_eq!(out.spell_slots, SpellSlotPools::zeroed());
    }

    #[test]
    fn test_level_is_clamped_to_twelve() {
        let bundle = sample_bundle();
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 40), &bundle);
        assert_eq!(out.total_level, 12);
        assert_eq!(out.per_class[0].level, 12);
        assert!(out.feature("wizard.spell_mastery").is_some());
    }

    #[test]
    fn test_missing_class_is_recovered() {
        let bundle = sample_bundle();
        let out = resolve_progression(&ResolveInput::new().with_class("unknown", 5), &bundle);

        assert_eq!(out.total_level, 5);
        assert!(out.features.is_empty());
        assert!(out.pending_choices.is_empty());
        let error = out.per_class[0].error.as_deref().unwrap();
        assert!(error.contains("unknown"));
        assert!(!out.is_complete());
    }

    #[test]
    fn test_missing_class_does_not_stop_others() {
        let bundle = sample_bundle();
        let input = ResolveInput::new().with_class("unknown", 3).with_class("wizard", 1);
        let out = resolve_progression(&input, &bundle);

        assert_eq!(out.total_level, 4);
        assert_eq!(out.per_class.len(), 2);
        assert!(out.per_class[0].error.is_some());
        assert!(out.per_class[1].error.is_none());
        assert!(out.feature("wizard.spellcasting").is_some());
    }

    #[test]
    fn test_pending_choice_annotations() {
        let bundle = sample_bundle();
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 1), &bundle);

        let cantrips = out.pending("wizard.cantrips.1").unwrap();
        assert_eq!(cantrips.kind, PendingKind::Choice);
        assert_eq!(cantrips.class_id, "wizard");
        assert_eq!(cantrips.level, 1);
        assert_eq!(cantrips.count, 3);
        assert_eq!(cantrips.remaining, 3);
        assert_eq!(out.per_class[0].pending_choices.len(), out.pending_choices.len());
    }

    #[test]
    fn test_choice_boundary_through_resolver() {
        let bundle = sample_bundle();
        let base = ResolveInput::new().with_class("wizard", 1);

        let partial = base
            .clone()
            .with_selection("wizard.cantrips.1", Selection::many(["light", "mage_hand"]));
        let out = resolve_progression(&partial, &bundle);
        assert_eq!(out.pending("wizard.cantrips.1").unwrap().remaining, 1);

        let full = base.with_selection(
            "wizard.cantrips.1",
            Selection::many(["light", "mage_hand", "fire_bolt", "minor_illusion"]),
        );
        let out = resolve_progression(&full, &bundle);
        assert!(out.pending("wizard.cantrips.1").is_none());
    }

    #[test]
    fn test_subclass_pick_needs_any_selection() {
        let bundle = sample_bundle();
        let input = ResolveInput::new().with_class("wizard", 2);
        let out = resolve_progression(&input, &bundle);
        let pick = out.pending("wizard.subclass").unwrap();
        assert_eq!(pick.kind, PendingKind::SubclassPick);

        let out = resolve_progression(
            &input.with_selection("wizard.subclass", Selection::one("evocation")),
            &bundle,
        );
        assert!(out.pending("wizard.subclass").is_none());
    }

    #[test]
    fn test_feat_gate() {
        let bundle = sample_bundle();
        let input = ResolveInput::new().with_class("wizard", 4);
        let out = resolve_progression(&input, &bundle);

        let gate = out.pending("wizard.feat_gate.4").unwrap();
        assert_eq!(gate.kind, PendingKind::FeatGate);
        assert_eq!(gate.count, 1);
        assert_eq!(gate.remaining, 1);
        assert!(gate.options.is_empty());

        let out = resolve_progression(
            &input.with_selection("wizard.feat_gate.4", Selection::one(ASI_MARKER)),
            &bundle,
        );
        assert!(out.pending("wizard.feat_gate.4").is_none());
    }

    #[test]
    fn test_choice_without_id_gets_synthesized_id() {
        let prog = ClassProgression::new("bard", "Bard")
            .with_grant(1, Grant::feature("bard.inspiration", "Bardic Inspiration"))
            .with_grant(
                1,
                Grant::SpellChoice(ChoiceGrant {
                    id: None,
                    prompt: "Pick a spell".to_string(),
                    count: 1,
                    options: vec![],
                    rules: None,
                }),
            );
        let bundle = ContentBundle::new().with_class(prog);
        let out = resolve_progression(&ResolveInput::new().with_class("bard", 1), &bundle);

        let pending = out.pending("bard.choice.1.1").unwrap();
        assert_eq!(pending.kind, PendingKind::SpellChoice);
    }

    #[test]
    fn test_unknown_grants_are_skipped() {
        let prog = ClassProgression::new("monk", "Monk")
            .with_grant(1, Grant::Unknown)
            .with_grant(1, Grant::feature("monk.martial_arts", "Martial Arts"));
        let bundle = ContentBundle::new().with_class(prog);
        let out = resolve_progression(&ResolveInput::new().with_class("monk", 1), &bundle);
        assert_eq!(out.per_class[0].applied_count, 1);
        assert_eq!(out.features.len(), 1);
    }

    #[test]
    fn test_subclass_features_and_missing_subclass() {
        let bundle = sample_bundle();
        let out = resolve_progression(
            &ResolveInput::new().with_subclassed("wizard", 3, "evocation"),
            &bundle,
        );
        assert!(out.feature("wizard.evocation.sculpt_spells").is_some());
        assert!(out.per_class[0].warnings.is_empty());

        let out = resolve_progression(
            &ResolveInput::new().with_subclassed("wizard", 3, "necromancy"),
            &bundle,
        );
        assert!(out.feature("wizard.evocation.sculpt_spells").is_none());
        assert!(out.per_class[0].error.is_none());
        assert_eq!(out.per_class[0].warnings.len(), 1);
    }

    #[test]
    fn test_duplicate_feature_ids_overwrite() {
        let a = ClassProgression::new("a", "A").with_grant(1, Grant::feature("shared.feat", "From A"));
        let b = ClassProgression::new("b", "B").with_grant(1, Grant::feature("shared.feat", "From B"));
        let bundle = ContentBundle::new().with_class(a).with_class(b);
        let out = resolve_progression(&ResolveInput::new().with_class("a", 1).with_class("b", 1), &bundle);

        assert_eq!(out.features.len(), 1);
        assert_eq!(out.features[0].name, "From B");
        assert_eq!(out.features[0].class_id, "b");
    }

    #[test]
    fn test_pact_slots_stay_out_of_long_rest() {
        let bundle = ContentBundle::new().with_class(sample_warlock());
        let out = resolve_progression(&ResolveInput::new().with_class("warlock", 3), &bundle);

        assert_eq!(out.spell_slots.long_rest_total(), 0);
        assert_eq!(out.spell_slots.short_rest[&2], 2);
        let summary = out.per_class[0].spellcasting.as_ref().unwrap();
        assert_eq!(summary.pact, Some(PactSlots { slots: 2, slot_level: 2 }));
        assert_eq!(summary.slots, None);
    }

    #[test]
    fn test_spellcasting_summary() {
        let bundle = ContentBundle::new().with_class(sample_wizard());
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 5), &bundle);

        let summary = out.per_class[0].spellcasting.as_ref().unwrap();
        assert_eq!(summary.kind, CasterKind::Prepared);
        assert_eq!(summary.ability.as_deref(), Some("INT"));
        assert_eq!(summary.cantrips_known, Some(4));
        assert_eq!(summary.spells_known, Some(5));
        assert_eq!(summary.slots, Some(vec![4, 3, 2]));
        assert_eq!(summary.pact, None);
        assert_eq!(out.spell_slots.long_rest[&3], 2);
    }

    #[test]
    fn test_empty_input() {
        let out = resolve_progression(&ResolveInput::new(), &ContentBundle::new());
        assert_eq!(out.total_level, 0);
        assert!(out.features.is_empty());
        assert!(out.pending_choices.is_empty());
        assert_eq!(out.spell_slots.long_rest.len(), 6);
        assert_eq!(out.spell_slots.long_rest_total(), 0);
        assert_eq!(out.spell_slots.short_rest_total(), 0);
        assert!(out.is_complete());
    }

    #[test]
    fn test_subclass_feat_selection_uses_gate_id() {
        let bundle = ContentBundle::new()
            .with_class(ClassProgression::new("fighter", "Fighter"))
            .with_subclass(
                "fighter",
                SubclassDefinition::new("champion", "Champion").with_level("6th", &["Feat Selection"]),
            );
        let out = resolve_progression(
            &ResolveInput::new().with_subclassed("fighter", 6, "champion"),
            &bundle,
        );
        assert!(out.pending("fighter.feat_gate.6").is_some());
    }

    #[test]
    fn test_gate_shared_by_base_and_subclass_is_pending_once() {
        let bundle = ContentBundle::new()
            .with_class(sample_fighter().with_grant(6, Grant::feat_gate(6)))
            .with_subclass(
                "fighter",
                SubclassDefinition::new("champion", "Champion").with_level("6th", &["Feat Selection"]),
            );
        let out = resolve_progression(
            &ResolveInput::new().with_subclassed("fighter", 6, "champion"),
            &bundle,
        );

        let gates: Vec<_> = out
            .pending_choices
            .iter()
            .filter(|p| p.choice_id == "fighter.feat_gate.6")
            .collect();
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].subclass_id.as_deref(), Some("champion"));
        assert_eq!(out.per_class[0].pending_choices.len(), out.pending_choices.len());
    }

    #[test]
    fn test_slot_counts_saturate() {
        let bundle = ContentBundle::new()
            .with_class(caster("a", Spellcasting::new(CasterKind::Prepared).with_slots(1, &[u32::MAX])))
            .with_class(caster("b", Spellcasting::new(CasterKind::Known).with_slots(1, &[1])));
        let out = resolve_progression(&ResolveInput::new().with_class("a", 1).with_class("b", 1), &bundle);

        assert_eq!(out.spell_slots.long_rest[&1], u32::MAX);
        assert_eq!(out.per_class[1].spell_slots.long_rest[&1], 1);
    }

    #[test]
    fn test_pact_slot_level_out_of_range_is_ignored() {
        for slot_level in [0, 7] {
            let bundle = ContentBundle::new().with_class(caster(
                "warlock",
                Spellcasting::new(CasterKind::Pact).with_pact_slots(1, 2, slot_level),
            ));
            let out = resolve_progression(&ResolveInput::new().with_class("warlock", 1), &bundle);

            assert_eq!(out.spell_slots.short_rest_total(), 0);
            assert_eq!(out.spell_slots.short_rest.len(), 6);
            assert_eq!(out.per_class[0].spell_slots.short_rest_total(), 0);
        }
    }

    #[test]
    fn test_long_slot_row_is_truncated() {
        let bundle = ContentBundle::new().with_class(caster(
            "wizard",
            Spellcasting::new(CasterKind::Prepared).with_slots(1, &[1, 2, 3, 4, 5, 6, 7, 8]),
        ));
        let out = resolve_progression(&ResolveInput::new().with_class("wizard", 1), &bundle);

        let levels: Vec<u8> = out.spell_slots.long_rest.keys().copied().collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(out.spell_slots.long_rest[&6], 6);
        assert_eq!(out.spell_slots.long_rest_total(), 21);
    }

    #[test]
    fn test_malformed_grant_keeps_its_neighbours() {
        let json = r#"{
            "classes": {
                "fighter": {
                    "classId": "fighter",
                    "levels": {
                        "1": [
                            {"type": "feature", "id": "fighter.second_wind", "name": "Second Wind"},
                            {"type": "feature", "id": "fighter.bad"},
                            {"type": "choice", "id": "fighter.style", "prompt": "Fighting Style"}
                        ]
                    }
                }
            }
        }"#;
        let bundle = ContentBundle::from_json(json).unwrap();
        let out = resolve_progression(&ResolveInput::new().with_class("fighter", 1), &bundle);

        assert_eq!(out.features.len(), 1);
        assert!(out.feature("fighter.second_wind").is_some());
        assert!(out.pending("fighter.style").is_some());
        assert_eq!(out.per_class[0].applied_count, 2);
    }
}
