use regex::Regex;
use std::sync::OnceLock;

/// Words kept fully uppercase by [`normalize`] (agency and state acronyms).
pub const UPPERCASE_EXCEPTIONS: &[&str] = &["MUSC", "DDSN", "SC", "NC", "DSS", "MP", "LLC"];

static PAREN_RE: OnceLock<Regex> = OnceLock::new();
static NON_LETTER_RE: OnceLock<Regex> = OnceLock::new();

fn paren_re() -> &'static Regex {
    PAREN_RE.get_or_init(|| Regex::new(r"\(.*?\)").unwrap())
}

fn non_letter_re() -> &'static Regex {
    NON_LETTER_RE.get_or_init(|| Regex::new(r"[^A-Za-z\s]").unwrap())
}

/// Canonicalize a free-text name such as a referral source.
///
/// Parenthesized annotations are dropped, anything that is not an ASCII letter
/// becomes a space, whitespace is collapsed, and each word is title-cased unless
/// it is one of [`UPPERCASE_EXCEPTIONS`].
///
/// ```
/// use referral_core::names::normalize;
/// assert_eq!(normalize("MUSC dev-peds (fax: 555)"), "MUSC Dev Peds");
/// ```
pub fn normalize(raw: &str) -> String {
    let without_parens = paren_re().replace_all(raw, "");
    let letters_only = non_letter_re().replace_all(&without_parens, " ");
    letters_only
        .split_whitespace()
        .map(case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn case_word(word: &str) -> String {
    let upper = word.to_ascii_uppercase();
    if UPPERCASE_EXCEPTIONS.contains(&upper.as_str()) {
        return upper;
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = first.to_ascii_uppercase().to_string();
            out.push_str(&chars.as_str().to_ascii_lowercase());
            out
        }
        None => String::new(),
    }
}

/// Contents of the first parenthesized annotation in `raw`, trimmed.
/// Returns `None` when there is no non-empty annotation.
pub fn parenthesized(raw: &str) -> Option<&str> {
    let open = raw.find('(')?;
    let rest = &raw[open + 1..];
    let inner = match rest.find(')') {
        Some(close) => &rest[..close],
        None => rest,
    };
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}
