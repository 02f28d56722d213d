//! Deterministic correlation tokens.
//!
//! Tokens are SHA-256 hex digests over a prefixed, colon-joined field list.
//! They let out-of-band callbacks (browser extension, scraper) refer to a
//! search result without a database id. They are correlation keys, not
//! secrets: anyone who knows the inputs can recompute them.

use sha2::{Digest, Sha256};

use super::SearchContext;

/// Hex-encoded SHA-256 of `"<prefix>:" + parts.join(":")`.
///
/// Absent parts contribute an empty string.
#[must_use]
pub fn make_token(prefix: &str, parts: &[Option<&str>]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.unwrap_or_default())
        .collect::<Vec<_>>()
        .join(":");

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b":");
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Token identifying one offer under one customer context.
#[must_use]
pub fn api_token(artid: &str, pin: &str, brand: Option<&str>, context: &SearchContext) -> String {
    let incoterms = context.incoterms.map(|i| i.to_string());
    make_token(
        "api",
        &[
            Some(context.vkorg.as_str()),
            Some(context.kunnr_rg.as_str()),
            Some(pin),
            brand,
            Some(artid),
            context.program.as_deref(),
            context.kunnr_za.as_deref(),
            incoterms.as_deref(),
            context.vbeln.as_deref(),
        ],
    )
}

/// Token under which characteristics for `artid` are reported.
#[must_use]
pub fn characteristics_token(artid: &str) -> String {
    make_token("char", &[Some(artid)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            characteristics_token("123"),
            "403a090e603e3ef9efc985374d35db68f7ee4f6a535449b008a7b9f853fd8af2"
        );
        assert_eq!(
            api_token("111", "OC90", Some("MAHLE"), &SearchContext::new("4000", "43232305")),
            "696bbf914df78ae1ec87bc8e92e6b38b71818cbda3ff3e910c7d676777b74aa1"
        );
    }

    #[test]
    fn test_characteristics_token_matches_make_token() {
        assert_eq!(characteristics_token("123"), make_token("char", &[Some("123")]));
        assert_eq!(characteristics_token("123").len(), 64);
        assert_ne!(characteristics_token("123"), characteristics_token("124"));
    }

    #[test]
    fn test_api_token_is_deterministic() {
        let context = SearchContext::new("4000", "43232305");
        let a = api_token("111", "OC90", Some("MAHLE"), &context);
        let b = api_token("111", "OC90", Some("MAHLE"), &context);
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_api_token_field_order() {
        let mut context = SearchContext::new("4000", "43232305");
        context.incoterms = Some(1);
        let expected = make_token(
            "api",
            &[
                Some("4000"),
                Some("43232305"),
                Some("OC90"),
                None,
                Some("111"),
                None,
                None,
                Some("1"),
                None,
            ],
        );
        assert_eq!(api_token("111", "OC90", None, &context), expected);
    }

    #[test]
    fn test_api_token_sensitive_to_context() {
        let base = SearchContext::new("4000", "43232305");
        let mut other = base.clone();
        other.vbeln = Some("C1".to_string());
        assert_ne!(
            api_token("111", "OC90", None, &base),
            api_token("111", "OC90", None, &other)
        );
    }
}
