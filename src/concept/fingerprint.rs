//! Concept text normalization and fingerprinting
//!
//! Submissions describing the same idea differ in case, spacing and
//! boilerplate lead-ins ("App idea: ..."). Normalization removes those
//! differences; the fingerprint is a UUID v5 of the normalized text.

use uuid::Uuid;

/// Lead-in phrases stripped from the start of concept text
const PREFIX_PHRASES: &[&str] = &[
    "app idea:",
    "startup idea:",
    "business idea:",
    "saas idea:",
    "product idea:",
    "feature request:",
    "request:",
    "idea:",
    "[app idea]",
    "[idea]",
];

// UUID v5 namespace for concept fingerprints
const CONCEPT_NS: Uuid = Uuid::from_bytes([
    0x3f, 0x2a, 0x91, 0x5e, 0x0c, 0x7d, 0x4b, 0x18,
    0xa6, 0x52, 0xe1, 0x09, 0xd4, 0x7b, 0x33, 0xc8,
]);

/// Lower-case, collapse whitespace and strip known prefix phrases.
pub fn normalize_concept_text(text: &str) -> String {
    let mut normalized = collapse_whitespace(&text.to_lowercase());

    // Prefixes can stack ("[idea] app idea: ...")
    loop {
        let stripped = PREFIX_PHRASES
            .iter()
            .find_map(|prefix| normalized.strip_prefix(prefix));
        match stripped {
            Some(rest) => normalized = rest.trim().to_string(),
            None => break,
        }
    }

    normalized
}

/// Fingerprint of already-normalized text, `None` for empty text.
pub fn fingerprint_normalized(normalized: &str) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }
    Some(Uuid::new_v5(&CONCEPT_NS, normalized.as_bytes()).to_string())
}

/// Normalize then fingerprint.
pub fn concept_fingerprint(text: &str) -> Option<String> {
    fingerprint_normalized(&normalize_concept_text(text))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
