//! Website-presence classification of a search listing.

use url::Url;

use crate::entities::WebPresence;

/// Extract the lowercased host of `website`, without a leading `www.`.
///
/// Values without a scheme are read as `https://`. Returns `None` for values
/// that do not parse or have no host.
pub fn extract_domain(website: &str) -> Option<String> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches("//"))
    };

    let parsed = Url::parse(&candidate).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Decide the web presence of a listing from its declared website.
///
/// Absent or malformed values are "No Website"; hosts containing any of the
/// `directory_domains` are "Directory Only"; anything else is "Has Website".
pub fn classify_website<S: AsRef<str>>(website: Option<&str>, directory_domains: &[S]) -> WebPresence {
    let Some(domain) = website.and_then(extract_domain) else {
        return WebPresence::NoWebsite;
    };

    let is_directory = directory_domains
        .iter()
        .map(AsRef::as_ref)
        .filter(|d| !d.is_empty())
        .any(|d| domain.contains(d));

    if is_directory {
        WebPresence::DirectoryOnly
    } else {
        WebPresence::HasWebsite
    }
}
