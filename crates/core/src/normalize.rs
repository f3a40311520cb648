//! Name normalization for conflict checks

use unicode_normalization::UnicodeNormalization;

/// Reduce a name to its comparable form.
///
/// The string is decomposed (NFD) so accents split off their base letter,
/// then everything that is not a Unicode letter or an ASCII digit is
/// dropped and the rest is lowercased. The result may be empty and may
/// contain non-latin letters.
pub fn normalize_identifier(name: &str) -> String {
    name.nfd()
        .filter(|c| c.is_alphabetic() || c.is_ascii_digit())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Like [`normalize_identifier`] but keeps only `a-z` and `0-9`
pub fn normalize_english_identifier(name: &str) -> String {
    name.nfd()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
