//! Serial number canonicalization.
//!
//! Serials reach us hand-typed, half-remembered or OCR'd off a frame. The normalized
//! form folds case, drops every separator and maps visually confusable letters onto
//! the digit they are usually mistaken for, so `"o0-II1"` and `"00 111"` compare equal.

/// Letters replaced by the digit they are most often confused with.
const CONFUSABLES: [(char, char); 6] = [
    ('O', '0'),
    ('I', '1'),
    ('L', '1'),
    ('S', '5'),
    ('Z', '2'),
    ('B', '8'),
];

/// Canonical comparison form of `raw`. Total: never fails, may return an empty string.
#[must_use]
pub fn normalize_serial(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_alphanumeric())
        .map(|c| {
            CONFUSABLES
                .iter()
                .find_map(|&(from, to)| (from == c).then_some(to))
                .unwrap_or(c)
        })
        .collect()
}

/// A user-supplied serial together with its normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialNumber {
    raw: String,
    normalized: String,
}

impl SerialNumber {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize_serial(&raw);
        Self { raw, normalized }
    }

    /// The input exactly as supplied.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True when nothing comparable survived normalization (e.g. `"--"`).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.normalized.is_empty()
    }
}
