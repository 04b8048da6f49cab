use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use reqwest::Url;

pub(crate) fn get_now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Resolves `href` against `base`, accepting protocol-relative and root-relative forms.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("data:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}
