//! Remote URL handling: short references, token auth, redaction

use hermes_foundation::Secret;
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    /// `owner/repo` or `owner/repo.git`
    static ref SHORT_REF: Regex = Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap();

    /// Userinfo of an http(s) URL
    static ref URL_CREDENTIALS: Regex = Regex::new(r"(https?://)[^@/\s]+@").unwrap();
}

const GITHUB_HTTPS: &str = "https://github.com/";

/// Expand `owner/repo` into a GitHub HTTPS URL; anything else is returned trimmed
pub fn normalize_remote(remote: &str) -> String {
    let remote = remote.trim();
    if SHORT_REF.is_match(remote) {
        let repo = remote.trim_end_matches(".git");
        format!("{}{}.git", GITHUB_HTTPS, repo)
    } else {
        remote.to_string()
    }
}

/// Inject `token` into GitHub HTTPS URLs that carry no credentials yet
pub fn authenticated_url(url: &str, token: Option<&Secret>) -> String {
    match token.filter(|t| !t.is_empty()) {
        Some(token) if url.starts_with(GITHUB_HTTPS) => format!(
            "https://x-access-token:{}@github.com/{}",
            token.expose(),
            &url[GITHUB_HTTPS.len()..]
        ),
        _ => url.to_string(),
    }
}

/// Strip credentials from any URL embedded in `text`
pub fn redact(text: &str) -> Cow<'_, str> {
    URL_CREDENTIALS.replace_all(text, "${1}***@")
}
