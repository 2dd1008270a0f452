use unicode_normalization::UnicodeNormalization;

/// Trim and NFC-normalize a string cell; blank strings become `None`.
pub fn clean_text(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.nfc().collect())
    }
}

/// Upper-case the first letter of every word, lower-case the rest.
/// A word starts after any character that is neither alphanumeric nor an apostrophe.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(ch);
            word_start = !matches!(ch, '\'' | '\u{2019}');
        }
    }
    out
}
