//! Testing utilities for the progression engine.
//!
//! This module provides ready-made content for tests:
//! - sample class tables (`sample_wizard`, `sample_warlock`, `sample_fighter`)
//! - a sample bundle wiring them up with subclasses and quota rows
//! - assertion helpers for resolution output

use crate::choices::{ChoiceIndex, OwnerType, QuotaRow};
use crate::content::ContentBundle;
use crate::progression::{
    CasterKind, ChoiceGrant, ChoiceRules, ClassProgression, Grant, Spellcasting,
    SubclassDefinition,
};
use crate::resolver::ResolveOutput;

/// A full caster: cantrips at 1, subclass at 2, feat gates at 4 and 8.
pub fn sample_wizard() -> ClassProgression {
    let cantrips = ChoiceGrant::new("wizard.cantrips.1", "Choose wizard cantrips", 3).with_rules(
        ChoiceRules {
            kind: Some("cantrips".to_string()),
            list: Some("wizard".to_string()),
        },
    );

    ClassProgression::new("wizard", "Wizard")
        .with_grant(1, Grant::feature("wizard.spellcasting", "Spellcasting"))
        .with_grant(1, Grant::feature("wizard.arcane_recovery", "Arcane Recovery"))
        .with_grant(1, Grant::Choice(cantrips))
        .with_grant(
            2,
            Grant::SubclassPick(
                ChoiceGrant::new("wizard.subclass", "Choose an arcane tradition", 1)
                    .with_options(vec!["evocation".to_string(), "abjuration".to_string()]),
            ),
        )
        .with_grant(2, Grant::feature("wizard.scholar", "Scholar"))
        .with_grant(4, Grant::feat_gate(4))
        .with_grant(8, Grant::feat_gate(8))
        .with_grant(12, Grant::feature("wizard.spell_mastery", "Spell Mastery"))
        .with_subclass_info(2, vec!["evocation".to_string(), "abjuration".to_string()])
        .with_spellcasting(
            Spellcasting::new(CasterKind::Prepared)
                .with_ability("INT")
                .with_cantrips_known(1, 3)
                .with_cantrips_known(2, 3)
                .with_cantrips_known(3, 3)
                .with_cantrips_known(4, 4)
                .with_cantrips_known(5, 4)
                .with_spells_known(1, 2)
                .with_spells_known(2, 3)
                .with_spells_known(3, 4)
                .with_spells_known(4, 4)
                .with_spells_known(5, 5)
                .with_slots(1, &[2])
                .with_slots(2, &[3])
                .with_slots(3, &[4, 2])
                .with_slots(4, &[4, 3])
                .with_slots(5, &[4, 3, 2]),
        )
}

/// The evocation tradition, including a passive pick at 10th.
pub fn sample_evocation() -> SubclassDefinition {
    SubclassDefinition::new("evocation", "School of Evocation")
        .with_level("2nd", &["Evocation Savant"])
        .with_level("3rd", &["Sculpt Spells"])
        .with_level("6th", &["Potent Cantrip"])
        .with_level("10th", &["Passive Selection(3)"])
}

/// A pact caster whose slots refresh on a short rest.
pub fn sample_warlock() -> ClassProgression {
    ClassProgression::new("warlock", "Warlock")
        .with_grant(1, Grant::feature("warlock.pact_magic", "Pact Magic"))
        .with_grant(
            1,
            Grant::SubclassPick(ChoiceGrant::new("warlock.patron", "Choose a patron", 1)),
        )
        .with_grant(2, Grant::feature("warlock.eldritch_invocations", "Eldritch Invocations"))
        .with_grant(4, Grant::feat_gate(4))
        .with_spellcasting(
            Spellcasting::new(CasterKind::Pact)
                .with_ability("CHA")
                .with_cantrips_known(1, 2)
                .with_spells_known(1, 2)
                .with_spells_known(2, 3)
                .with_spells_known(3, 4)
                .with_pact_slots(1, 1, 1)
                .with_pact_slots(2, 2, 1)
                .with_pact_slots(3, 2, 2)
                .with_pact_slots(4, 2, 2)
                .with_pact_slots(5, 2, 3),
        )
}

/// A martial class with no spellcasting.
pub fn sample_fighter() -> ClassProgression {
    ClassProgression::new("fighter", "Fighter")
        .with_grant(
            1,
            Grant::Choice(
                ChoiceGrant::new("fighter.fighting_style", "Choose a fighting style", 1)
                    .with_options(vec![
                        "archery".to_string(),
                        "defense".to_string(),
                        "dueling".to_string(),
                    ])
                    .with_rules(ChoiceRules::kind("fighting style")),
            ),
        )
        .with_grant(1, Grant::feature("fighter.second_wind", "Second Wind"))
        .with_grant(2, Grant::feature("fighter.action_surge", "Action Surge"))
        .with_grant(
            3,
            Grant::SubclassPick(ChoiceGrant::new("fighter.subclass", "Choose an archetype", 1)),
        )
        .with_grant(4, Grant::feat_gate(4))
        .with_grant(5, Grant::feature("fighter.extra_attack", "Extra Attack"))
        .with_subclass_info(3, vec!["champion".to_string()])
}

pub fn sample_champion() -> SubclassDefinition {
    SubclassDefinition::new("champion", "Champion")
        .with_level("3rd", &["Improved Critical"])
        .with_level("7th", &["Remarkable Athlete", "Feat Selection"])
}

/// Quota rows for the sample classes.
pub fn sample_choice_index() -> ChoiceIndex {
    ChoiceIndex::new(vec![
        QuotaRow::new(OwnerType::Class, "wizard", 1, "Cantrips", 3).restricted_to("wizard"),
        QuotaRow::new(OwnerType::Class, "warlock", 1, "Cantrips", 2).restricted_to("warlock"),
        QuotaRow::new(OwnerType::Class, "warlock", 2, "Eldritch Invocations", 2),
        QuotaRow::new(OwnerType::Class, "fighter", 1, "Fighting Style", 1),
        QuotaRow::new(OwnerType::Class, "fighter", 4, "Feats", 1),
    ])
}

/// Wizard, warlock and fighter with their subclasses and quota rows.
pub fn sample_bundle() -> ContentBundle {
    ContentBundle::new()
        .with_class(sample_wizard())
        .with_class(sample_warlock())
        .with_class(sample_fighter())
        .with_subclass("wizard", sample_evocation())
        .with_subclass("fighter", sample_champion())
        .with_choices(sample_choice_index())
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the resolution granted a feature.
#[track_caller]
pub fn assert_has_feature(output: &ResolveOutput, id: &str) {
    assert!(
        output.feature(id).is_some(),
        "Expected feature '{id}' to be granted"
    );
}

/// Assert that the resolution did NOT grant a feature.
#[track_caller]
pub fn assert_no_feature(output: &ResolveOutput, id: &str) {
    assert!(
        output.feature(id).is_none(),
        "Expected feature '{id}' to NOT be granted"
    );
}

/// Assert a choice is pending with the expected remaining count.
#[track_caller]
pub fn assert_pending(output: &ResolveOutput, choice_id: &str, remaining: u32) {
    let pending = output
        .pending(choice_id)
        .unwrap_or_else(|| panic!("Expected choice '{choice_id}' to be pending"));
    assert_eq!(
        pending.remaining, remaining,
        "Expected {remaining} remaining on '{choice_id}', got {}",
        pending.remaining
    );
}

/// Assert a choice is not pending.
#[track_caller]
pub fn assert_not_pending(output: &ResolveOutput, choice_id: &str) {
    assert!(
        output.pending(choice_id).is_none(),
        "Expected choice '{choice_id}' to NOT be pending"
    );
}
