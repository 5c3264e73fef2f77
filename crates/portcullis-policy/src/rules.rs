use crate::error::PolicyError;
use crate::matcher::{HostPattern, PathPattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Scheme comparison is case-insensitive
    pub fn matches_scheme(&self, scheme: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(scheme)
    }
}

impl FromStr for Protocol {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(PolicyError::InvalidConfig(format!(
                "unsupported protocol '{}' (expected http or https)",
                other
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allowed remote image location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePatternRule {
    pub protocol: Protocol,
    pub hostname: HostPattern,
    pub pathname: PathPattern,
    /// None means any port
    pub port: Option<u16>,
    /// None means any query string
    pub search: Option<String>,
}

impl RemotePatternRule {
    pub fn new(protocol: Protocol, hostname: &str, pathname: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            protocol,
            hostname: HostPattern::hostname(hostname)?,
            pathname: PathPattern::new(pathname)?,
            port: None,
            search: None,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.trim_start_matches('?').to_string());
        self
    }

    /// Check a parsed URL against every field of this rule
    pub fn matches(&self, url: &Url) -> bool {
        if !self.protocol.matches_scheme(url.scheme()) {
            return false;
        }

        let host = match url.host_str() {
            Some(host) => host,
            None => return false,
        };
        if !self.hostname.matches(host) {
            return false;
        }

        if let Some(port) = self.port {
            if url.port_or_known_default() != Some(port) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            if url.query().unwrap_or("") != search {
                return false;
            }
        }

        self.pathname.matches(url.path())
    }
}

impl fmt::Display for RemotePatternRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.hostname.as_str())?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.pathname.as_str())?;
        if let Some(search) = &self.search {
            write!(f, "?{}", search)?;
        }
        Ok(())
    }
}

/// One allowed origin for inbound actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOriginRule {
    pub origin_pattern: HostPattern,
}

impl ActionOriginRule {
    pub fn new(origin_pattern: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            origin_pattern: HostPattern::new(origin_pattern)?,
        })
    }

    pub fn matches(&self, origin: &str) -> bool {
        self.origin_pattern.matches(origin)
    }
}

impl fmt::Display for ActionOriginRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.origin_pattern.as_str())
    }
}
