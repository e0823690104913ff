//! Identifier and level-key helpers.
//!
//! Content tables key levels in several ways ("3", "3rd", "12th") and name
//! features in free text. Everything here is deterministic so that ids derived
//! from the same names are stable across sessions.

/// Highest class level a progression table may define.
pub const MAX_CLASS_LEVEL: u8 = 12;

/// Highest spell-slot level tracked in slot pools.
pub const MAX_SLOT_LEVEL: u8 = 6;

/// Turn a free-text feature name into an id segment.
///
/// Lowercases, drops quote characters, collapses every run of other
/// non-alphanumeric characters into a single underscore and trims
/// underscores from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_gap = false;

    for ch in name.chars() {
        if is_quote(ch) {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            if pending_gap && !slug.is_empty() {
                slug.push('_');
            }
            pending_gap = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_gap = true;
        }
    }

    slug
}

fn is_quote(ch: char) -> bool {
    matches!(ch, '\'' | '"' | '`' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}')
}

/// Parse a level key such as `"3"`, `"3rd"` or `"12th"` into a class level.
///
/// Returns `None` for anything that is not a level in `1..=12`, including
/// header rows like `"Level"` and mismatched suffixes like `"3th"`.
pub fn parse_level_key(key: &str) -> Option<u8> {
    let key = key.trim();
    let digits_end = key
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(key.len());

    if digits_end == 0 {
        return None;
    }

    let (digits, suffix) = key.split_at(digits_end);
    let level: u8 = digits.parse().ok()?;

    let suffix = suffix.trim().to_ascii_lowercase();
    if !suffix.is_empty() && suffix != ordinal_suffix(level) {
        return None;
    }

    (1..=MAX_CLASS_LEVEL).contains(&level).then_some(level)
}

/// English ordinal suffix for a number ("st", "nd", "rd", "th").
pub fn ordinal_suffix(n: u8) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Normalize an identifier for lookups: trimmed and lowercased.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Clamp a recorded class level into the range a table can describe.
pub fn clamp_level(level: u8) -> u8 {
    level.min(MAX_CLASS_LEVEL)
}
