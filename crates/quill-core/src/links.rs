use crate::defaults::{ALLOWED_URL_SCHEMES, DENIED_URL_SCHEMES};
use crate::{Error, QuillConfig, Result};
use std::str::FromStr;

/// How user-supplied link URLs are screened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlPolicy {
    /// Rejects `javascript:`, `data:` and `vbscript:` and passes everything else through.
    ///
    /// This is the historical behaviour. It is a denylist, so obfuscated or new dangerous
    /// schemes are not caught; prefer [`UrlPolicy::Allowlist`] for new call sites.
    #[default]
    Denylist,
    /// Accepts only `http:`, `https:`, `mailto:` and scheme-less relative references.
    Allowlist,
}

impl FromStr for UrlPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "denylist" => Ok(Self::Denylist),
            "allowlist" => Ok(Self::Allowlist),
            _ => Err(Error::UnknownUrlPolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl UrlPolicy {
    /// Reads `url.policy`; absent means [`UrlPolicy::Denylist`].
    pub fn from_config(config: &QuillConfig) -> Result<Self> {
        match config.require_str("url.policy")? {
            None => Ok(Self::default()),
            Some(v) => v.parse(),
        }
    }
}

/// Screens a link URL with the compatible denylist. Rejected input yields `""`.
///
/// The scheme check runs on a trimmed, lowercased copy; an accepted URL is returned exactly as
/// given.
pub fn sanitize_url(url: &str) -> String {
    sanitize_url_with(url, UrlPolicy::Denylist)
}

pub fn sanitize_url_with(url: &str, policy: UrlPolicy) -> String {
    if url.is_empty() {
        return String::new();
    }

    let accepted = match policy {
        UrlPolicy::Denylist => passes_denylist(url),
        UrlPolicy::Allowlist => passes_allowlist(url),
    };

    if accepted {
        url.to_string()
    } else {
        tracing::debug!(?policy, "rejected link url");
        String::new()
    }
}

fn passes_denylist(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    !DENIED_URL_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn is_ctrl_character_like(ch: char) -> bool {
    matches!(ch,
        '\u{0000}'..='\u{001F}'
        | '\u{007F}'..='\u{009F}'
        | '\u{2000}'..='\u{200D}'
        | '\u{FEFF}'
    )
}

fn passes_allowlist(url: &str) -> bool {
    // Browsers ignore control and zero-width characters inside a scheme (`java\tscript:`).
    let inspected: String = url
        .trim()
        .chars()
        .filter(|&ch| !is_ctrl_character_like(ch))
        .collect::<String>()
        .to_ascii_lowercase();

    if inspected.is_empty() {
        return false;
    }

    if matches!(inspected.as_bytes()[0], b'/' | b'.' | b'#' | b'?') {
        // `//host` is protocol-relative and inherits the page's (http/https) scheme.
        return true;
    }

    match scheme_of(&inspected) {
        Some(scheme) => ALLOWED_URL_SCHEMES.contains(&scheme),
        // A path such as `post/42` or `www.example.com` has no scheme to abuse.
        None => true,
    }
}

/// The `scheme:` prefix, if the text before the first `:` looks like a URL scheme.
fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    let candidate = &url[..colon];
    if let Some(boundary) = url.find(['/', '?', '#']) {
        if boundary < colon {
            return None;
        }
    }
    let valid = candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Some(&url[..=colon])
    } else {
        // Something like `&!*javascript:` is not a scheme, but browsers may still
        // mis-handle it; refuse it rather than guess.
        Some("")
    }
}
