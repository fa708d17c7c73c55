//! Domains whose answers are pinned to large CDNs tend to resolve worse
//! with a forwarded client subnet; requests for them are relayed without
//! one.

const SUBNET_EXCEPTIONS: &[&str] = &[
    "cloudfront.net",
    "recaptcha.net",
    "gstatic.com",
    "google-analytics.com",
    "googlesyndication.com",
    "googletagmanager.com",
    "doubleclick.net",
    "google.com",
    "googletagservices.com",
    "googleapis.com",
    "googleusercontent.com",
    "ggpht.com",
    "ytimg.com",
    "youtube-nocookie.com",
    "youtube.com",
    "googlevideo.com",
];

/// Whether a client subnet may accompany a query for `name`. The name
/// itself and its immediate parent domain are checked against the
/// exception list.
pub(crate) fn subnet_allowed(name: &str) -> bool {
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        return true;
    }
    if SUBNET_EXCEPTIONS.contains(&name) {
        return false;
    }
    if let Some((_, parent)) = name.split_once('.') {
        let parent = parent.trim_start_matches('.');
        if SUBNET_EXCEPTIONS.contains(&parent) {
            return false;
        }
    }
    true
}
