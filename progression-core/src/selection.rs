//! Recorded user selections and how they satisfy choices.

use crate::progression::ChoiceGrant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker stored in a feat gate when the player takes the ability score
/// improvement instead of a feat.
pub const ASI_MARKER: &str = "ability-score-improvement";

/// choice id -> recorded value.
pub type Selections = BTreeMap<String, Selection>;

/// A recorded answer to a choice: one value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    One(String),
    Many(Vec<String>),
}

impl Selection {
    pub fn one(value: impl Into<String>) -> Self {
        Selection::One(value.into())
    }

    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Many(values.into_iter().map(Into::into).collect())
    }

    /// Whether anything was actually picked. Blank strings and empty lists
    /// count as no pick.
    pub fn is_made(&self) -> bool {
        match self {
            Selection::One(value) => !value.trim().is_empty(),
            Selection::Many(values) => !values.is_empty(),
        }
    }
}

/// Which satisfaction rule applies to a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceRule {
    /// Needs `count` picks.
    Counted,
    /// Any pick at all satisfies it.
    AnyPick,
}

/// Whether `selection` satisfies a choice.
///
/// Counted choices take a list of at least `count` entries. A single value
/// only satisfies a choice of one. Over-selection is never a problem.
pub fn is_choice_satisfied(choice: &ChoiceGrant, rule: ChoiceRule, selection: Option<&Selection>) -> bool {
    let Some(selection) = selection else {
        return false;
    };

    match (rule, selection) {
        (ChoiceRule::AnyPick, s) => s.is_made(),
        (ChoiceRule::Counted, Selection::Many(values)) => values.len() >= choice.count as usize,
        (ChoiceRule::Counted, s @ Selection::One(_)) => s.is_made() && choice.count <= 1,
    }
}

/// How many picks are still owed on a choice.
///
/// A single recorded value counts as fully answered, whatever the count.
pub fn remaining_count(choice: &ChoiceGrant, selection: Option<&Selection>) -> u32 {
    match selection {
        Some(Selection::Many(values)) => {
            let picked = u32::try_from(values.len()).unwrap_or(u32::MAX);
            choice.count.saturating_sub(picked)
        }
        Some(s @ Selection::One(_)) if s.is_made() => 0,
        _ => choice.count,
    }
}
