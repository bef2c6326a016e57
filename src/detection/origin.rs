//! Referer origin matching.
//!
//! # Responsibilities
//! - Parse the Referer header as a URL reference (absolute or relative)
//! - Match its hostname against the allowed origins (exact, case-insensitive)
//!
//! # Design Decisions
//! - No wildcards, no suffix matching: `evil-login.microsoftonline.com.attacker`
//!   must never pass
//! - Port and scheme are ignored, only the hostname is compared
//! - A relative reference parses but has no hostname, so it is not allowed
//! - Malformed percent escapes and control characters make the value invalid

use std::collections::HashSet;
use url::{Host, ParseError, Url};

/// Result of checking a Referer value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefererCheck {
    /// Header absent or empty.
    Missing,
    /// Not parseable as a URL reference.
    Invalid,
    /// Hostname is in the allowed set.
    Allowed,
    /// Parsed, but the hostname is not allowed (or there is none).
    NotAllowed,
}

/// Matches Referer hostnames against a fixed set of allowed origins.
#[derive(Debug, Clone)]
pub struct OriginMatcher {
    allowed: HashSet<String>,
}

impl OriginMatcher {
    /// Create a matcher. Hostnames are normalized to lowercase.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|origin| origin.as_ref().trim().to_lowercase())
                .filter(|origin| !origin.is_empty())
                .collect(),
        }
    }

    /// Returns true if the hostname is allowed.
    pub fn is_allowed(&self, hostname: &str) -> bool {
        self.allowed.contains(&hostname.to_lowercase())
    }

    /// Classify a raw Referer header value.
    pub fn check(&self, referer: &str) -> RefererCheck {
        if referer.is_empty() {
            return RefererCheck::Missing;
        }

        if referer.bytes().any(|b| b.is_ascii_control()) || has_invalid_escape(referer) {
            return RefererCheck::Invalid;
        }

        let name = match Url::parse(referer) {
            Ok(url) => url.host().map(|host| hostname(&host)),
            Err(ParseError::RelativeUrlWithoutBase) => {
                // a colon in the first segment would read as a scheme
                let first = referer.split(['/', '?', '#']).next().unwrap_or_default();
                if first.contains(':') {
                    return RefererCheck::Invalid;
                }
                None
            }
            Err(ParseError::EmptyHost) => None,
            // numeric ports beyond u16 still carry a usable hostname
            Err(ParseError::InvalidPort) => match authority_hostname(referer) {
                Some(name) => Some(name),
                None => return RefererCheck::Invalid,
            },
            Err(_) => return RefererCheck::Invalid,
        };

        match name {
            Some(name) if self.is_allowed(&name) => RefererCheck::Allowed,
            _ => RefererCheck::NotAllowed,
        }
    }
}

/// True if the path or fragment holds a `%` not followed by two hex digits.
/// The query is left raw and never rejected.
fn has_invalid_escape(referer: &str) -> bool {
    let (main, fragment) = referer.split_once('#').unwrap_or((referer, ""));
    let path = main.split_once('?').map_or(main, |(path, _)| path);
    invalid_escape(path) || invalid_escape(fragment)
}

fn invalid_escape(part: &str) -> bool {
    let bytes = part.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}

/// Hostname of `scheme://[userinfo@]host[:digits]`, when the port is all digits.
fn authority_hostname(referer: &str) -> Option<String> {
    let (_, rest) = referer.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    let (host, port) = match host_port.strip_prefix('[') {
        Some(bracketed) => {
            let (host, after) = bracketed.split_once(']')?;
            (host, after.strip_prefix(':').unwrap_or(after))
        }
        None => host_port.split_once(':').unwrap_or((host_port, "")),
    };
    if host.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(host.to_lowercase())
}

/// Hostname without brackets, matching what browsers send for IPv6 literals.
fn hostname(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> OriginMatcher {
        OriginMatcher::new(["login.microsoftonline.com", "Login.Microsoft.com", "::1"])
    }

    #[test]
    fn test_missing_referer() {
        assert_eq!(matcher().check(""), RefererCheck::Missing);
    }

    #[test]
    fn test_invalid_referer() {
        let m = matcher();
        assert_eq!(m.check(")_*(()&&^%$#$%)"), RefererCheck::Invalid);
        assert_eq!(m.check("https://login.microsoftonline.com/%zz"), RefererCheck::Invalid);
        assert_eq!(m.check("https://login.microsoftonline.com/x#%g1"), RefererCheck::Invalid);
        assert_eq!(m.check("1abc:x"), RefererCheck::Invalid);
        assert_eq!(m.check("https://login.microsoftonline.com:80a/"), RefererCheck::Invalid);
    }

    #[test]
    fn test_relative_referer_is_not_allowed() {
        let m = matcher();
        assert_eq!(m.check("/relative/path"), RefererCheck::NotAllowed);
        assert_eq!(m.check("login.microsoftonline.com/x"), RefererCheck::NotAllowed);
        assert_eq!(m.check("https:///no-host"), RefererCheck::NotAllowed);
    }

    #[test]
    fn test_query_escapes_are_not_checked() {
        assert_eq!(
            matcher().check("https://login.microsoftonline.com/x?a=%zz"),
            RefererCheck::Allowed
        );
    }

    #[test]
    fn test_out_of_range_port_keeps_hostname() {
        let m = matcher();
        assert_eq!(m.check("https://login.microsoftonline.com:99999/"), RefererCheck::Allowed);
        assert_eq!(m.check("https://user@LOGIN.microsoft.com:70000"), RefererCheck::Allowed);
        assert_eq!(m.check("https://evil.com:99999/"), RefererCheck::NotAllowed);
    }

    #[test]
    fn test_allowed_referer() {
        let m = matcher();
        assert_eq!(m.check("https://login.microsoftonline.com/x"), RefererCheck::Allowed);
        assert_eq!(m.check("https://LOGIN.microsoft.com:8443/?a=b"), RefererCheck::Allowed);
        assert_eq!(m.check("http://[::1]:8080/login"), RefererCheck::Allowed);
    }

    #[test]
    fn test_exact_match_only() {
        let m = matcher();
        assert_eq!(m.check("https://evil.com"), RefererCheck::NotAllowed);
        assert_eq!(
            m.check("https://login.microsoftonline.com.evil.com/"),
            RefererCheck::NotAllowed
        );
        assert_eq!(
            m.check("https://sub.login.microsoftonline.com/"),
            RefererCheck::NotAllowed
        );
        // no host component at all
        assert_eq!(m.check("mailto:someone@login.microsoftonline.com"), RefererCheck::NotAllowed);
    }
}
