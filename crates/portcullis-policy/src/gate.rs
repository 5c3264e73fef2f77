use crate::error::PolicyError;
use crate::rules::{ActionOriginRule, RemotePatternRule};
use serde::Serialize;
use std::fmt;
use url::Url;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    NoMatchingRemotePattern,
    OriginNotAllowed,
    BodyTooLarge { observed: u64, limit: u64 },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::NoMatchingRemotePattern => "no_matching_remote_pattern",
            RejectReason::OriginNotAllowed => "origin_not_allowed",
            RejectReason::BodyTooLarge { .. } => "body_too_large",
        }
    }

    /// Status a caller should surface for this refusal
    pub fn http_status(&self) -> u16 {
        match self {
            RejectReason::NoMatchingRemotePattern => 400,
            RejectReason::OriginNotAllowed => 403,
            RejectReason::BodyTooLarge { .. } => 413,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoMatchingRemotePattern => {
                f.write_str("URL does not match any configured remote pattern")
            }
            RejectReason::OriginNotAllowed => f.write_str("Request origin is not allowed"),
            RejectReason::BodyTooLarge { observed, limit } => write!(
                f,
                "Body of {} bytes exceeds the limit of {} bytes",
                observed, limit
            ),
        }
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Admit,
    Reject { reasons: Vec<RejectReason> },
}

impl Decision {
    /// Admit when there is nothing to object to
    pub fn from_reasons(reasons: Vec<RejectReason>) -> Self {
        if reasons.is_empty() {
            Decision::Admit
        } else {
            Decision::Reject { reasons }
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    pub fn reasons(&self) -> &[RejectReason] {
        match self {
            Decision::Admit => &[],
            Decision::Reject { reasons } => reasons,
        }
    }

    pub fn has_reason(&self, code: &str) -> bool {
        self.reasons().iter().any(|r| r.code() == code)
    }
}

/// Image the pipeline is about to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub url: String,
}

impl ImageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Parse into an absolute URL with a host
    pub fn parse(&self) -> Result<Url, PolicyError> {
        let url =
            Url::parse(self.url.trim()).map_err(|e| PolicyError::malformed_url(&self.url, e))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(PolicyError::malformed_url(&self.url, "URL has no host"));
        }
        Ok(url)
    }
}

/// Inbound action about to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub origin_header: String,
    /// Host the request was addressed to, for the same-origin check
    pub host_header: Option<String>,
    pub body_byte_size: u64,
}

impl ActionRequest {
    pub fn new(origin_header: impl Into<String>, body_byte_size: u64) -> Self {
        Self {
            origin_header: origin_header.into(),
            host_header: None,
            body_byte_size,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host_header = Some(host.into());
        self
    }

    /// Reduce the origin header to `host[:port]`.
    ///
    /// Serialized origins (`https://foo.csb.app`) are parsed as URLs. Bare
    /// hosts (`foo.csb.app:3000`) are parsed as an authority and must not
    /// carry userinfo, a path, a query or a fragment. Default ports are
    /// dropped. Returns None for anything that can't name a single host.
    pub fn origin_host(&self) -> Option<String> {
        let raw = self.origin_header.trim();
        if raw.is_empty() {
            return None;
        }

        if raw.contains("://") {
            let url = Url::parse(raw).ok()?;
            if has_userinfo(&url) {
                return None;
            }
            return authority(&url, url.port());
        }

        let url = Url::parse(&format!("http://{}", raw)).ok()?;
        if has_userinfo(&url)
            || url.path() != "/"
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return None;
        }
        // No scheme to pick a default from, so both web defaults go
        let port = url.port().filter(|port| *port != 80 && *port != 443);
        authority(&url, port)
    }

    fn is_same_origin(&self, origin: &str) -> bool {
        self.host_header
            .as_deref()
            .map(str::trim)
            .is_some_and(|host| !host.is_empty() && host.eq_ignore_ascii_case(origin))
    }
}

fn has_userinfo(url: &Url) -> bool {
    !url.username().is_empty() || url.password().is_some()
}

fn authority(url: &Url, port: Option<u16>) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Stateless gate; every call is a pure function of its inputs
pub struct PolicyGate;

impl PolicyGate {
    /// Admit an image URL iff at least one rule matches it
    pub fn evaluate_image(
        request: &ImageRequest,
        rules: &[RemotePatternRule],
    ) -> Result<Decision, PolicyError> {
        let url = request.parse()?;

        if rules.iter().any(|rule| rule.matches(&url)) {
            return Ok(Decision::Admit);
        }

        tracing::debug!(url = %request.url, "image rejected: no matching remote pattern");
        Ok(Decision::Reject {
            reasons: vec![RejectReason::NoMatchingRemotePattern],
        })
    }

    /// Check origin and body size independently; report every failure
    pub fn evaluate_action(
        request: &ActionRequest,
        rules: &[ActionOriginRule],
        max_bytes: u64,
    ) -> Decision {
        let mut reasons = Vec::new();

        if !Self::origin_allowed(request, rules) {
            reasons.push(RejectReason::OriginNotAllowed);
        }

        if request.body_byte_size > max_bytes {
            reasons.push(RejectReason::BodyTooLarge {
                observed: request.body_byte_size,
                limit: max_bytes,
            });
        }

        let decision = Decision::from_reasons(reasons);
        if !decision.is_admitted() {
            tracing::debug!(
                origin = %request.origin_header,
                body_bytes = request.body_byte_size,
                reasons = ?decision.reasons(),
                "action rejected"
            );
        }
        decision
    }

    fn origin_allowed(request: &ActionRequest, rules: &[ActionOriginRule]) -> bool {
        let Some(origin) = request.origin_host() else {
            return false;
        };

        request.is_same_origin(&origin) || rules.iter().any(|rule| rule.matches(&origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Protocol;

    fn pexels_rule() -> RemotePatternRule {
        RemotePatternRule::new(Protocol::Https, "images.pexels.com", "/photos/**")
            .expect("rule creation failed")
    }

    fn csb_rules() -> Vec<ActionOriginRule> {
        vec![ActionOriginRule::new("*.csb.app").expect("rule creation failed")]
    }

    #[test]
    fn test_image_admitted() {
        let request = ImageRequest::new("https://images.pexels.com/photos/123/cat.jpg");
        let decision = PolicyGate::evaluate_image(&request, &[pexels_rule()]).unwrap();
        assert_eq!(decision, Decision::Admit);
    }

    #[test]
    fn test_image_wrong_protocol() {
        let request = ImageRequest::new("http://images.pexels.com/photos/123/cat.jpg");
        let decision = PolicyGate::evaluate_image(&request, &[pexels_rule()]).unwrap();
        assert_eq!(
            decision,
            Decision::Reject {
                reasons: vec![RejectReason::NoMatchingRemotePattern]
            }
        );
    }

    #[test]
    fn test_image_no_rules_rejects() {
        let request = ImageRequest::new("https://images.pexels.com/photos/1.jpg");
        let decision = PolicyGate::evaluate_image(&request, &[]).unwrap();
        assert!(!decision.is_admitted());
    }

    #[test]
    fn test_image_uppercase_scheme_and_host() {
        let request = ImageRequest::new("HTTPS://IMAGES.PEXELS.COM/photos/1.jpg");
        let decision = PolicyGate::evaluate_image(&request, &[pexels_rule()]).unwrap();
        assert!(decision.is_admitted());
    }

    #[test]
    fn test_image_any_rule_suffices() {
        let rules = vec![
            RemotePatternRule::new(Protocol::Https, "other.example.com", "/**").unwrap(),
            pexels_rule(),
        ];
        let request = ImageRequest::new("https://images.pexels.com/photos/1.jpg");
        assert!(PolicyGate::evaluate_image(&request, &rules).unwrap().is_admitted());
    }

    #[test]
    fn test_malformed_url_is_an_error() {
        for bad in ["not a url", "/photos/1.jpg", "https://", "mailto:someone@example.com", ""] {
            let result = PolicyGate::evaluate_image(&ImageRequest::new(bad), &[pexels_rule()]);
            assert!(
                matches!(result, Err(PolicyError::MalformedUrl { .. })),
                "expected MalformedUrl for {:?}, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_action_admitted() {
        let request = ActionRequest::new("foo.csb.app", 1_500_000);
        let decision = PolicyGate::evaluate_action(&request, &csb_rules(), 2_000_000);
        assert_eq!(decision, Decision::Admit);
    }

    #[test]
    fn test_action_serialized_origin() {
        let request = ActionRequest::new("https://foo.csb.app", 10);
        assert!(PolicyGate::evaluate_action(&request, &csb_rules(), 100).is_admitted());
    }

    #[test]
    fn test_action_origin_with_port() {
        let request = ActionRequest::new("http://localhost:3000", 10);
        assert_eq!(request.origin_host().as_deref(), Some("localhost:3000"));

        let rules = vec![ActionOriginRule::new("localhost:3000").unwrap()];
        assert!(PolicyGate::evaluate_action(&request, &rules, 100).is_admitted());
        assert!(!PolicyGate::evaluate_action(&request, &csb_rules(), 100).is_admitted());
    }

    #[test]
    fn test_action_default_port_dropped() {
        let request = ActionRequest::new("https://foo.csb.app:443", 10);
        assert_eq!(request.origin_host().as_deref(), Some("foo.csb.app"));
    }

    #[test]
    fn test_bare_origin_is_normalized() {
        let host = |origin: &str| ActionRequest::new(origin, 0).origin_host();

        assert_eq!(host("FOO.csb.app").as_deref(), Some("foo.csb.app"));
        assert_eq!(host("foo.csb.app:80").as_deref(), Some("foo.csb.app"));
        assert_eq!(host("localhost:3000").as_deref(), Some("localhost:3000"));
        assert_eq!(host("user:pw@foo.csb.app"), None);
        assert_eq!(host("foo.csb.app/x"), None);
    }

    #[test]
    fn test_action_origin_not_allowed() {
        let request = ActionRequest::new("evil.com", 10);
        let decision = PolicyGate::evaluate_action(&request, &csb_rules(), 2_000_000);
        assert_eq!(
            decision,
            Decision::Reject {
                reasons: vec![RejectReason::OriginNotAllowed]
            }
        );
    }

    #[test]
    fn test_action_empty_or_garbage_origin() {
        for origin in ["", "   ", "https://", "http://[bad"] {
            let request = ActionRequest::new(origin, 10);
            let decision = PolicyGate::evaluate_action(&request, &csb_rules(), 100);
            assert!(decision.has_reason("origin_not_allowed"), "origin {:?}", origin);
        }
    }

    #[test]
    fn test_action_same_origin_allowed_without_rules() {
        let request =
            ActionRequest::new("https://app.example.com", 10).with_host("app.example.com");
        assert!(PolicyGate::evaluate_action(&request, &[], 100).is_admitted());

        let cross = ActionRequest::new("https://evil.com", 10).with_host("app.example.com");
        assert!(!PolicyGate::evaluate_action(&cross, &[], 100).is_admitted());
    }

    #[test]
    fn test_action_body_boundary() {
        let at_limit = ActionRequest::new("foo.csb.app", 2_000_000);
        assert!(PolicyGate::evaluate_action(&at_limit, &csb_rules(), 2_000_000).is_admitted());

        let over = ActionRequest::new("foo.csb.app", 2_000_001);
        assert_eq!(
            PolicyGate::evaluate_action(&over, &csb_rules(), 2_000_000),
            Decision::Reject {
                reasons: vec![RejectReason::BodyTooLarge {
                    observed: 2_000_001,
                    limit: 2_000_000
                }]
            }
        );
    }

    #[test]
    fn test_action_both_failures_reported() {
        let request = ActionRequest::new("evil.com", 3_000_000);
        let decision = PolicyGate::evaluate_action(&request, &csb_rules(), 2_000_000);

        assert!(decision.has_reason("origin_not_allowed"));
        assert!(decision.has_reason("body_too_large"));
        assert_eq!(decision.reasons().len(), 2);
    }

    #[test]
    fn test_reason_status_codes() {
        assert_eq!(RejectReason::NoMatchingRemotePattern.http_status(), 400);
        assert_eq!(RejectReason::OriginNotAllowed.http_status(), 403);
        assert_eq!(
            RejectReason::BodyTooLarge {
                observed: 2,
                limit: 1
            }
            .http_status(),
            413
        );
    }

    #[test]
    fn test_decision_json_shape() {
        let decision = Decision::Reject {
            reasons: vec![RejectReason::BodyTooLarge {
                observed: 3,
                limit: 2,
            }],
        };
        let json = serde_json::to_value(&decision).expect("serialize failed");

        assert_eq!(json["decision"], "reject");
        assert_eq!(json["reasons"][0]["code"], "body_too_large");
        assert_eq!(json["reasons"][0]["observed"], 3);
        assert_eq!(json["reasons"][0]["limit"], 2);

        let admit = serde_json::to_value(Decision::Admit).expect("serialize failed");
        assert_eq!(admit["decision"], "admit");
    }
}
