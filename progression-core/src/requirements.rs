//! Unified pick requirements.
//!
//! Picks come from two places: choice grants embedded in the class and
//! subclass tables, and rows in the choice index. Neither replaces the
//! other. [`RequirementTable`] reads both once per bundle and answers "what
//! does this class level ask for" with a single record type.

use crate::choices::OwnerType;
use crate::content::ContentBundle;
use crate::graft::subclass_grant;
use crate::naming::{normalize_id, parse_level_key};
use crate::picks::PickKind;
use crate::progression::Grant;
use crate::resolver::{feat_gate_id, synthesized_choice_id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of pick a requirement asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// A categorized pick: quota rows, and embedded choices whose rules
    /// name a known category.
    Pick(PickKind),
    /// An embedded choice with no recognizable category.
    Choice,
    SubclassPick,
    FeatGate,
}

/// Where a requirement came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RequirementSource {
    /// A grant in a class or subclass table, answered under `choice_id`.
    Embedded { choice_id: String },
    /// A row in the choice index.
    Quota,
}

/// One pick a class level asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequirement {
    pub owner_type: OwnerType,
    pub owner_id: String,
    /// Parent class. Unknown for subclass quota rows whose subclass is not
    /// in the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub level: u8,
    pub kind: RequirementKind,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_restriction: Option<String>,
    #[serde(flatten)]
    pub source: RequirementSource,
}

type Key = (OwnerType, String, u8);

#[derive(Debug, Default)]
struct Bucket {
    embedded: Vec<PickRequirement>,
    quota: Vec<PickRequirement>,
}

/// Every pick requirement in a bundle, indexed by owner and level.
#[derive(Debug, Default)]
pub struct RequirementTable {
    buckets: BTreeMap<Key, Bucket>,
    len: usize,
}

impl RequirementTable {
    /// Walk every class table, subclass overlay and quota row once.
    pub fn build(bundle: &ContentBundle) -> Self {
        let mut table = Self::default();

        for progression in bundle.classes() {
            let class_id = &progression.class_id;
            for (&level, grants) in &progression.levels {
                for (position, grant) in grants.iter().enumerate() {
                    if let Some(req) = embedded_requirement(
                        OwnerType::Class,
                        class_id,
                        class_id,
                        level,
                        position,
                        grant,
                    ) {
                        table.push_embedded(req);
                    }
                }
            }

            for subclass in bundle.subclasses_of(class_id) {
                for (key, names) in &subclass.levels {
                    let Some(level) = parse_level_key(key) else {
                        continue;
                    };
                    let offset = progression.grants_at(level).len();
                    for (i, name) in names.iter().enumerate() {
                        let grant = subclass_grant(class_id, &subclass.id, level, name);
                        if let Some(req) = embedded_requirement(
                            OwnerType::Subclass,
                            &subclass.id,
                            class_id,
                            level,
                            offset + i,
                            &grant,
                        ) {
                            table.push_embedded(req);
                        }
                    }
                }
            }
        }

        for row in bundle.choices().rows() {
            let Some(kind) = PickKind::parse(&row.pick_type) else {
                tracing::trace!(pick_type = %row.pick_type, "quota row with unknown pick type");
                continue;
            };
            let class_id = match row.owner_type {
                OwnerType::Class => Some(row.owner_id.clone()),
                OwnerType::Subclass => parent_class(bundle, &row.owner_id),
            };
            table.push_quota(PickRequirement {
                owner_type: row.owner_type,
                owner_id: row.owner_id.clone(),
                class_id,
                level: row.level,
                kind: RequirementKind::Pick(kind),
                count: row.count,
                list_restriction: row.list_restriction.clone(),
                source: RequirementSource::Quota,
            });
        }

        tracing::debug!(requirements = table.len, "built requirement table");
        table
    }

    fn push_embedded(&mut self, req: PickRequirement) {
        self.len += 1;
        self.bucket(&req).embedded.push(req);
    }

    fn push_quota(&mut self, req: PickRequirement) {
        self.len += 1;
        self.bucket(&req).quota.push(req);
    }

    fn bucket(&mut self, req: &PickRequirement) -> &mut Bucket {
        self.buckets
            .entry((req.owner_type, req.owner_id.clone(), req.level))
            .or_default()
    }

    /// Requirements for reaching `level` in a class.
    ///
    /// Class requirements come before subclass ones; within each owner,
    /// embedded grants come before quota rows.
    pub fn requirements_at(
        &self,
        class_id: &str,
        subclass_id: Option<&str>,
        level: u8,
    ) -> Vec<&PickRequirement> {
        let class_id = normalize_id(class_id);
        let mut out = Vec::new();

        if let Some(bucket) = self.buckets.get(&(OwnerType::Class, class_id.clone(), level)) {
            out.extend(bucket.embedded.iter().chain(&bucket.quota));
        }

        if let Some(subclass_id) = subclass_id {
            let key = (OwnerType::Subclass, normalize_id(subclass_id), level);
            if let Some(bucket) = self.buckets.get(&key) {
                out.extend(
                    bucket
                        .embedded
                        .iter()
                        .chain(&bucket.quota)
                        .filter(|req| req.class_id.as_deref().map_or(true, |c| c == class_id)),
                );
            }
        }

        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn embedded_requirement(
    owner_type: OwnerType,
    owner_id: &str,
    class_id: &str,
    level: u8,
    position: usize,
    grant: &Grant,
) -> Option<PickRequirement> {
    let (kind, count, list_restriction, choice_id) = match grant {
        Grant::Feature(_) | Grant::Unknown => return None,
        Grant::AsiOrFeatGate { .. } => {
            (RequirementKind::FeatGate, 1, None, feat_gate_id(class_id, level))
        }
        Grant::Choice(choice) | Grant::SpellChoice(choice) | Grant::SubclassPick(choice) => {
            let rules_kind = choice
                .rules
                .as_ref()
                .and_then(|r| r.kind.as_deref())
                .and_then(PickKind::parse);
            let kind = match grant {
                Grant::SubclassPick(_) => RequirementKind::SubclassPick,
                Grant::SpellChoice(_) => RequirementKind::Pick(rules_kind.unwrap_or(PickKind::Spells)),
                _ => rules_kind.map_or(RequirementKind::Choice, RequirementKind::Pick),
            };
            let choice_id = choice
                .id
                .clone()
                .unwrap_or_else(|| synthesized_choice_id(class_id, level, position));
            let list = choice.rules.as_ref().and_then(|r| r.list.clone());
            (kind, choice.count, list, choice_id)
        }
    };

    Some(PickRequirement {
        owner_type,
        owner_id: owner_id.to_string(),
        class_id: Some(class_id.to_string()),
        level,
        kind,
        count,
        list_restriction,
        source: RequirementSource::Embedded { choice_id },
    })
}

/// The class a subclass belongs to, when exactly one class lists it.
fn parent_class(bundle: &ContentBundle, subclass_id: &str) -> Option<String> {
    let mut parents = bundle
        .subclass_catalog()
        .iter()
        .filter(|(_, subs)| subs.contains_key(subclass_id))
        .map(|(class_id, _)| class_id.clone());
    let parent = parents.next()?;
    parents.next().is_none().then_some(parent)
}
