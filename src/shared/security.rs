use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder written in place of any secret value
pub const MASK: &str = "********";

// scheme://user:password@  (password may not contain '@' unescaped)
static URL_CREDENTIALS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*://)(?P<user>[^:@/]*):(?P<password>[^@/]*)@")
        .expect("Invalid URL credentials regex")
});

/// Mask the password component of a connection string.
///
/// `mongodb://admin:secret@db:27017/?authSource=admin` becomes
/// `mongodb://admin:********@db:27017/?authSource=admin`. URLs without an
/// embedded password are returned unchanged.
pub fn redact_url(url: &str) -> String {
    URL_CREDENTIALS_REGEX
        .replace(url, |caps: &regex::Captures| {
            format!("{}{}:{}@", &caps["scheme"], &caps["user"], MASK)
        })
        .into_owned()
}

/// Mask a secret value for display. Empty values stay empty so that
/// "not configured" remains visible.
pub fn mask_secret(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        MASK
    }
}

/// Shorten arbitrary user-provided text before it is echoed in an error.
pub fn snippet(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        content.to_string()
    }
}
