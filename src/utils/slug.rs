use once_cell::sync::Lazy;
use regex::Regex;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Convert a free-form key into a custom field slug.
///
/// Lowercases, drops anything that is not a word character, whitespace or
/// hyphen, collapses runs of whitespace/hyphens into one hyphen and trims
/// leading/trailing hyphens and underscores.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let cleaned = INVALID_CHARS.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}
