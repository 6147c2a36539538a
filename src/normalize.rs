// 🔤 Text Normalizer
// Canonical form for every piece of text that gets compared:
// merchant names, descriptions, bank labels, override keys.

/// Normalize free text into its comparable form
///
/// - Trim + lowercase
/// - Any run of whitespace, `-`, `_` or `/` becomes a single space
/// - Drop everything that is not a word character, a space or `+`
///
/// Dropping a symbol can leave two spaces next to each other ("food & drink"),
/// so spaces are collapsed once more at the end. That keeps the function
/// idempotent.
///
/// Combining accents are not word characters, so a decomposed "é" loses its
/// accent while a precomposed one keeps it. Input is expected in NFC.
///
/// Example: `"POS-Purchase / STARBUCKS #5521"` → `"pos purchase starbucks 5521"`
pub fn normalize_text(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let stripped: String = collapse_separators(&lowered)
        .chars()
        .filter(|c| is_word_char(*c) || *c == ' ' || *c == '+')
        .collect();

    stripped.split(' ').filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Normalize an optional value; missing text normalizes to ""
pub fn normalize_opt(s: Option<&str>) -> String {
    s.map(normalize_text).unwrap_or_default()
}

fn collapse_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_gap = false;
    for c in s.chars() {
        if is_separator(c) {
            if !in_gap {
                out.push(' ');
                in_gap = true;
            }
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    out
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == '_' || c == '/'
}

// Same notion as a regex `\w`: letters, digits, underscore (Unicode aware).
// Underscore never survives because it is a separator first.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ============================================================================
// TESTS
// ============================================================================
