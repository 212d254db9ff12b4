//! Helpers for keeping credentials out of logs and error messages.
//!
//! Asset URLs handed out by the generation service or an object store may
//! carry signed query strings or userinfo; only scheme, host and path are
//! safe to print.

/// Strips userinfo, query string and fragment from a URL-like string.
///
/// - `https://user:pw@cdn.example/a.mp3?sig=abc` → `https://cdn.example/a.mp3`
/// - `/v1/audio/a.mp3?token=x` → `/v1/audio/a.mp3`
pub fn redact_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = &url[..end];

    if let Some(scheme_end) = url.find("://") {
        let (scheme, rest) = url.split_at(scheme_end + 3);
        let authority_end = rest.find('/').unwrap_or(rest.len());
        if let Some(at) = rest[..authority_end].rfind('@') {
            return format!("{}{}", scheme, &rest[at + 1..]);
        }
    }

    url.to_string()
}

/// First eight characters of an identifier, for compact span fields.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
