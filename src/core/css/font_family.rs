//! Helpers for `font-family` value lists.

/// Suffix carried by every family name in the bundled font catalog.
pub const CATALOG_FAMILY_SUFFIX: &str = "-Fontara";

/// Splits a `font-family` value into unquoted, trimmed family names.
/// Commas nested in parentheses (`var(--x, fallback)`) stay with their entry.
pub fn split_families(value: &str) -> Vec<String> {
    let mut families = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in value.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                push_family(&mut families, &value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_family(&mut families, &value[start..]);
    families
}

fn push_family(families: &mut Vec<String>, raw: &str) {
    let name = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if !name.is_empty() {
        families.push(name.to_string());
    }
}

/// Whether `family` is something this crate injected itself: a reference to
/// the font custom property or one of the catalog's suffixed families.
pub fn is_injected_family(family: &str, variable: &str) -> bool {
    let compact: String = family.chars().filter(|c| !c.is_whitespace()).collect();
    (compact.starts_with("var(") && compact[4..].starts_with(variable))
        || family.contains(CATALOG_FAMILY_SUFFIX)
}

/// Builds `var(<variable>)` followed by `fallbacks`, quoting names that are
/// not a plain sequence of identifiers.
pub fn build_family_value(variable: &str, fallbacks: &[String]) -> String {
    let mut value = format!("var({variable})");
    for family in fallbacks {
        value.push_str(", ");
        if needs_quotes(family) {
            value.push('"');
            value.push_str(&family.replace('"', "\\\""));
            value.push('"');
        } else {
            value.push_str(family);
        }
    }
    value
}

fn needs_quotes(family: &str) -> bool {
    family.split(' ').any(|word| {
        word.is_empty()
            || word.starts_with(|c: char| c.is_ascii_digit())
            || word.starts_with("--")
            || !word
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    })
}
