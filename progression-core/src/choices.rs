//! Choice index: pick quotas per owner and level.
//!
//! Source sheets spell their columns many ways (`ownerId`, `OwnerId`,
//! `owner_id`, ...). [`RawQuotaRow`] soaks all of that up and
//! [`RawQuotaRow::normalize`] turns it into one canonical [`QuotaRow`], so
//! nothing past this module sees the loose shape.

use crate::naming::{normalize_id, parse_level_key, MAX_CLASS_LEVEL};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a quota row or grant is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Class,
    Subclass,
}

impl OwnerType {
    /// Parse a sheet value like `"Class"`, `"sub-class"` or `"Subclasses"`.
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "class" | "classes" => Some(OwnerType::Class),
            "subclass" | "subclasses" => Some(OwnerType::Subclass),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OwnerType::Class => "class",
            OwnerType::Subclass => "subclass",
        }
    }
}

impl std::fmt::Display for OwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A canonical pick quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRow {
    pub owner_type: OwnerType,
    /// Normalized (trimmed, lowercase).
    pub owner_id: String,
    pub level: u8,
    /// Raw pick type; mapped to a kind by the pick-step deriver.
    pub pick_type: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_restriction: Option<String>,
}

impl QuotaRow {
    pub fn new(
        owner_type: OwnerType,
        owner_id: &str,
        level: u8,
        pick_type: impl Into<String>,
        count: u32,
    ) -> Self {
        Self {
            owner_type,
            owner_id: normalize_id(owner_id),
            level,
            pick_type: pick_type.into(),
            count,
            list_restriction: None,
        }
    }

    pub fn restricted_to(mut self, list: impl Into<String>) -> Self {
        self.list_restriction = Some(list.into());
        self
    }
}

/// A quota row as it appears in a sheet export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuotaRow {
    #[serde(
        default,
        alias = "ownerType",
        alias = "OwnerType",
        alias = "Owner Type",
        alias = "owner"
    )]
    owner_type: Option<Value>,
    #[serde(
        default,
        alias = "ownerId",
        alias = "OwnerId",
        alias = "OwnerID",
        alias = "Owner ID",
        alias = "Owner Id"
    )]
    owner_id: Option<Value>,
    #[serde(default, alias = "Level", alias = "lvl")]
    level: Option<Value>,
    #[serde(
        default,
        alias = "pickType",
        alias = "PickType",
        alias = "Pick Type",
        alias = "pick",
        alias = "type"
    )]
    pick_type: Option<Value>,
    #[serde(default, alias = "Count", alias = "need", alias = "Need", alias = "amount")]
    count: Option<Value>,
    #[serde(
        default,
        alias = "listRestriction",
        alias = "ListRestriction",
        alias = "List Restriction",
        alias = "list",
        alias = "restriction"
    )]
    list_restriction: Option<Value>,
}

impl RawQuotaRow {
    /// Canonical form, or `None` when the row lacks an owner, level or pick type.
    pub fn normalize(self) -> Option<QuotaRow> {
        let owner_type = OwnerType::parse(&cell_text(self.owner_type.as_ref())?)?;
        let owner_id = normalize_id(&cell_text(self.owner_id.as_ref())?);
        let level = cell_level(self.level.as_ref()?)?;
        let pick_type = cell_text(self.pick_type.as_ref())?;
        let count = self.count.as_ref().map(cell_count).unwrap_or(1);
        let list_restriction = cell_text(self.list_restriction.as_ref());

        if owner_id.is_empty() {
            return None;
        }

        Some(QuotaRow {
            owner_type,
            owner_id,
            level,
            pick_type,
            count,
            list_restriction,
        })
    }
}

/// Non-blank string form of a cell.
fn cell_text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn cell_level(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .filter(|l| (1..=MAX_CLASS_LEVEL as u64).contains(l))
            .map(|l| l as u8),
        Value::String(s) => parse_level_key(s),
        _ => None,
    }
}

/// Negative or unparsable counts become zero.
fn cell_count(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .map(|c| c.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

type OwnerKey = (OwnerType, String, u8);

/// Quota rows indexed by `(owner type, owner id, level)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RawQuotaRow>", into = "Vec<QuotaRow>")]
pub struct ChoiceIndex {
    rows: Vec<QuotaRow>,
    by_owner: HashMap<OwnerKey, Vec<usize>>,
}

impl ChoiceIndex {
    pub fn new(rows: Vec<QuotaRow>) -> Self {
        let mut by_owner: HashMap<OwnerKey, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            by_owner
                .entry((row.owner_type, row.owner_id.clone(), row.level))
                .or_default()
                .push(i);
        }
        Self { rows, by_owner }
    }

    /// Rows for one owner at one level, in source order.
    pub fn rows_for<'a>(
        &'a self,
        owner_type: OwnerType,
        owner_id: &str,
        level: u8,
    ) -> impl Iterator<Item = &'a QuotaRow> + 'a {
        self.by_owner
            .get(&(owner_type, normalize_id(owner_id), level))
            .into_iter()
            .flatten()
            .map(move |&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[QuotaRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<RawQuotaRow>> for ChoiceIndex {
    fn from(raw: Vec<RawQuotaRow>) -> Self {
        let total = raw.len();
        let rows: Vec<QuotaRow> = raw.into_iter().filter_map(RawQuotaRow::normalize).collect();
        if rows.len() < total {
            tracing::debug!(dropped = total - rows.len(), "dropped incomplete quota rows");
        }
        Self::new(rows)
    }
}

impl From<ChoiceIndex> for Vec<QuotaRow> {
    fn from(index: ChoiceIndex) -> Self {
        index.rows
    }
}
