//! Detection of HTML pages served instead of API responses.
//!
//! When an Armtek session expires or an anti-bot challenge kicks in, the
//! upstream answers with an HTML page rather than JSON. Recognizing those
//! pages lets callers prompt for an interactive login instead of reporting
//! a generic format error.

use serde::Serialize;

const CAPTCHA_MARKERS: &[&str] = &["cf-challenge", "challenges.cloudflare.com", "turnstile"];
const PRODUCT_CARD_MARKERS: &[&str] = &["id=\"artinfo-container\"", "id='artinfo-container'"];
const LOGIN_MARKERS: &[&str] = &[
    "input id=\"login\"",
    "input id='login'",
    "input#login",
    "input id=\"password\"",
    "input id='password'",
    "input#password",
];

/// State of an Armtek web session as inferred from an HTML page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The page is a regular authenticated page.
    Ok,
    /// The page is a login form.
    LoginRequired,
    /// The page is an anti-bot challenge.
    CaptchaRequired,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::LoginRequired => write!(f, "login required"),
            Self::CaptchaRequired => write!(f, "captcha required"),
        }
    }
}

/// Whether a response body looks like an HTML document.
#[must_use]
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(256).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<head")
}

/// Classify an HTML page.
///
/// Challenge markers win over login markers. Pages that are neither a
/// product card nor recognizable are treated as requiring a login.
#[must_use]
pub fn detect_session_status(html: &str) -> SessionStatus {
    let normalized = html.to_lowercase();

    if CAPTCHA_MARKERS.iter().any(|m| normalized.contains(m)) {
        return SessionStatus::CaptchaRequired;
    }
    if PRODUCT_CARD_MARKERS.iter().any(|m| normalized.contains(m)) {
        return SessionStatus::Ok;
    }
    if LOGIN_MARKERS.iter().any(|m| normalized.contains(m)) {
        return SessionStatus::LoginRequired;
    }
    SessionStatus::LoginRequired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_captcha_beats_login() {
        let html = r#"<html><input id="login"><script src="https://challenges.cloudflare.com/x.js"></script></html>"#;
        assert_eq!(detect_session_status(html), SessionStatus::CaptchaRequired);
    }

    #[test]
    fn test_detect_login_form() {
        let html = r#"<html><form><input id="login"><input id="password"></form></html>"#;
        assert_eq!(detect_session_status(html), SessionStatus::LoginRequired);
    }

    #[test]
    fn test_detect_product_card() {
        let html = r#"<html><div id="artInfo-container"></div></html>"#;
        assert_eq!(detect_session_status(html), SessionStatus::Ok);
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("  <!DOCTYPE html><html></html>"));
        assert!(looks_like_html("<html lang=\"ru\">"));
        assert!(!looks_like_html("{\"STATUS\":200}"));
        assert!(!looks_like_html("Internal Server Error"));
    }
}
