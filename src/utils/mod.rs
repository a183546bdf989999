//! Utility functions and helpers.

pub mod console;
pub mod http;

use sha2::{Digest, Sha256};
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// SHA-256 hex digest of a scraped fragment.
pub fn source_hash(fragment: &str) -> String {
    hex::encode(Sha256::digest(fragment.as_bytes()))
}

/// Normalize a course code: drop whitespace, uppercase (`csi 2110` → `CSI2110`).
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// File-name slug for a term (`Winter 2026` → `winter_2026`).
pub fn term_slug(term: &str) -> String {
    term.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://catalog.test/search?term=2024F&subject=CSI").unwrap();
        assert_eq!(
            resolve_url(&base, "?term=2024F&subject=CSI&page=2")
                .unwrap()
                .as_str(),
            "https://catalog.test/search?term=2024F&subject=CSI&page=2"
        );
        assert_eq!(
            resolve_url(&base, "/other").unwrap().as_str(),
            "https://catalog.test/other"
        );
    }

    #[test]
    fn test_source_hash_is_stable_hex() {
        let a = source_hash("<tr>CSI2110</tr>");
        assert_eq!(a.len(), 64);
        assert_eq!(a, source_hash("<tr>CSI2110</tr>"));
        assert_ne!(a, source_hash("<tr>CSI2111</tr>"));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" csi 2110 "), "CSI2110");
        assert_eq!(normalize_code("PHI1101"), "PHI1101");
    }

    #[test]
    fn test_term_slug() {
        assert_eq!(term_slug("Winter 2026"), "winter_2026");
        assert_eq!(term_slug("2024F"), "2024f");
        assert_eq!(term_slug("Spring/Summer 2025"), "spring_summer_2025");
    }
}
