//! Subclass grafting.
//!
//! Subclass sheets list plain feature names per ordinal level. Grafting turns
//! those names into grants and appends them to the parent class table.

use crate::naming::{parse_level_key, slugify};
use crate::progression::{ChoiceGrant, ChoiceRules, ClassProgression, FeatureGrant, Grant, SubclassDefinition};
use std::borrow::Cow;

/// Rules kind stamped on choices produced from `Passive Selection(N)`.
pub const PASSIVE_KIND: &str = "passive";

/// Merge a subclass into a class progression.
///
/// With no subclass the base table is returned borrowed and untouched.
/// Otherwise a new table is built: base grants stay first at every level and
/// subclass grants are appended after them.
pub fn with_subclass<'a>(
    base: &'a ClassProgression,
    subclass: Option<&SubclassDefinition>,
) -> Cow<'a, ClassProgression> {
    let Some(subclass) = subclass else {
        return Cow::Borrowed(base);
    };

    let mut grafted = base.clone();
    for (key, names) in &subclass.levels {
        let Some(level) = parse_level_key(key) else {
            tracing::debug!(subclass = %subclass.id, key = %key, "skipping subclass row without a level");
            continue;
        };
        let slot = grafted.levels.entry(level).or_default();
        for name in names {
            slot.push(subclass_grant(&base.class_id, &subclass.id, level, name));
        }
    }

    Cow::Owned(grafted)
}

/// Translate one subclass feature name into a grant.
pub fn subclass_grant(class_id: &str, subclass_id: &str, level: u8, name: &str) -> Grant {
    if is_feat_selection(name) {
        return Grant::AsiOrFeatGate { level };
    }

    if let Some(count) = parse_passive_selection(name) {
        return Grant::Choice(
            ChoiceGrant::new(
                format!("{class_id}.{subclass_id}.passive_selection.{level}"),
                name.trim(),
                count,
            )
            .with_rules(ChoiceRules::kind(PASSIVE_KIND)),
        );
    }

    Grant::Feature(FeatureGrant {
        id: format!("{class_id}.{subclass_id}.{}", slugify(name)),
        name: name.to_string(),
        text: None,
    })
}

fn is_feat_selection(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("feat selection")
}

/// `"Passive Selection(3)"` -> `Some(3)`. Case and inner spacing are ignored.
pub fn parse_passive_selection(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    let rest = lower.strip_prefix("passive selection")?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    inner.trim().parse().ok()
}
