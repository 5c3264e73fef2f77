use crate::error::PolicyError;
use glob::{MatchOptions, Pattern};
use url::Host;

/// Match a host or origin against a pattern that may start with a single
/// wildcard label (`*.example.com`).
///
/// Without a wildcard the comparison is a full, ASCII case-insensitive
/// equality. With one, the candidate must end with `.<rest>` and the part in
/// front of it must be exactly one non-empty label, so `*.example.com`
/// matches `cdn.example.com` but neither `example.com` nor
/// `a.b.example.com`.
pub fn wildcard_label_match(pattern: &str, candidate: &str) -> bool {
    let Some(rest) = pattern.strip_prefix("*.") else {
        return pattern.eq_ignore_ascii_case(candidate);
    };

    // Need room for at least one label byte plus the separating dot
    if rest.is_empty() || candidate.len() < rest.len() + 2 {
        return false;
    }

    let split = candidate.len() - rest.len() - 1;
    if !candidate.is_char_boundary(split) {
        return false;
    }

    let (label, tail) = candidate.split_at(split);
    tail.starts_with('.')
        && tail[1..].eq_ignore_ascii_case(rest)
        && !label.is_empty()
        && !label.contains('.')
}

/// Compiled hostname/origin pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    raw: String,
}

impl HostPattern {
    /// Pattern for an origin, which may carry a `:port` suffix
    pub fn new(pattern: &str) -> Result<Self, PolicyError> {
        Self::compile(pattern, true)
    }

    /// Pattern for a URL hostname; ports belong in the rule's `port` field
    pub fn hostname(pattern: &str) -> Result<Self, PolicyError> {
        Self::compile(pattern, false)
    }

    fn compile(pattern: &str, allow_port: bool) -> Result<Self, PolicyError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PolicyError::invalid_pattern(pattern, "must not be empty"));
        }

        let (prefix, literal) = match pattern.strip_prefix("*.") {
            Some(rest) => ("*.", rest),
            None => ("", pattern),
        };

        if literal.contains('*') {
            return Err(PolicyError::invalid_pattern(
                pattern,
                "wildcard is only allowed as a single leading label (\"*.\")",
            ));
        }

        let (host, port) = split_port(pattern, literal, allow_port)?;

        if host.is_empty() || host.split('.').any(|label| label.is_empty()) {
            return Err(PolicyError::invalid_pattern(pattern, "contains an empty label"));
        }

        // Same normalization the URL parser applies: lowercase, punycode
        let host = Host::parse(host).map_err(|e| PolicyError::invalid_pattern(pattern, e))?;

        let raw = match port {
            Some(port) => format!("{}{}:{}", prefix, host, port),
            None => format!("{}{}", prefix, host),
        };
        Ok(Self { raw })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw.starts_with("*.")
    }

    pub fn matches(&self, candidate: &str) -> bool {
        wildcard_label_match(&self.raw, candidate)
    }
}

fn split_port<'a>(
    pattern: &str,
    literal: &'a str,
    allow_port: bool,
) -> Result<(&'a str, Option<u16>), PolicyError> {
    // Bracketed IPv6 literals carry colons of their own
    let port_split = if literal.ends_with(']') {
        None
    } else {
        literal.rsplit_once(':')
    };

    match port_split {
        None => Ok((literal, None)),
        Some(_) if !allow_port => Err(PolicyError::invalid_pattern(
            pattern,
            "hostname must not contain a port, use the `port` field",
        )),
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) if port != 0 => Ok((host, Some(port))),
            _ => Err(PolicyError::invalid_pattern(pattern, "invalid port")),
        },
    }
}

/// Compiled URL pathname pattern
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Whole path must be equal
    Exact(String),
    /// `prefix/**`: the prefix itself and everything below it
    Subtree(String),
    /// Any other glob; `*` never crosses a `/`
    Glob(Pattern),
}

const GLOB_META: &[char] = &['*', '?', '['];

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, PolicyError> {
        if !pattern.starts_with('/') {
            return Err(PolicyError::invalid_pattern(pattern, "pathname must start with '/'"));
        }

        if let Some(prefix) = pattern.strip_suffix("/**") {
            if !prefix.contains(GLOB_META) {
                return Ok(PathPattern::Subtree(prefix.to_string()));
            }
        }

        if pattern.contains(GLOB_META) {
            return Pattern::new(pattern)
                .map(PathPattern::Glob)
                .map_err(|e| PolicyError::invalid_pattern(pattern, e));
        }

        Ok(PathPattern::Exact(pattern.to_string()))
    }

    pub fn as_str(&self) -> String {
        match self {
            PathPattern::Exact(path) => path.clone(),
            PathPattern::Subtree(prefix) => format!("{}/**", prefix),
            PathPattern::Glob(pattern) => pattern.as_str().to_string(),
        }
    }

    /// Path segments are compared case-sensitively
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Subtree(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            PathPattern::Glob(pattern) => pattern.matches_with(
                path,
                MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                },
            ),
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PathPattern {}
