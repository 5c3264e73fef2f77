use crate::error::PolicyError;
use crate::gate::{ActionRequest, Decision, ImageRequest, PolicyGate};
use crate::rules::{ActionOriginRule, Protocol, RemotePatternRule};
use crate::size::{parse_byte_size, UnitBase};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Validated, immutable policy. Build once at startup and share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub image_rules: Vec<RemotePatternRule>,
    pub action_origin_rules: Vec<ActionOriginRule>,
    pub max_action_body_bytes: u64,
}

impl PolicyConfig {
    pub fn new(
        image_rules: Vec<RemotePatternRule>,
        action_origin_rules: Vec<ActionOriginRule>,
        max_action_body_bytes: u64,
    ) -> Result<Self, PolicyError> {
        if max_action_body_bytes == 0 {
            return Err(PolicyError::InvalidConfig(
                "max action body size must be positive".to_string(),
            ));
        }

        Ok(Self {
            image_rules,
            action_origin_rules,
            max_action_body_bytes,
        })
    }

    /// Load and validate a policy file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PolicyError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            image_rules = config.image_rules.len(),
            action_origins = config.action_origin_rules.len(),
            max_action_body_bytes = config.max_action_body_bytes,
            "policy loaded"
        );
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile = serde_yaml::from_str(yaml)
            .map_err(|e| PolicyError::InvalidConfig(format!("Invalid YAML: {}", e)))?;
        file.compile()
    }

    pub fn evaluate_image(&self, request: &ImageRequest) -> Result<Decision, PolicyError> {
        PolicyGate::evaluate_image(request, &self.image_rules)
    }

    pub fn evaluate_action(&self, request: &ActionRequest) -> Decision {
        PolicyGate::evaluate_action(
            request,
            &self.action_origin_rules,
            self.max_action_body_bytes,
        )
    }
}

/// On-disk policy document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    #[serde(default)]
    pub images: ImagesSection,

    /// Build-time only; accepted so one file can carry the whole app config
    #[serde(default)]
    pub typescript: TypescriptSection,

    #[serde(default)]
    pub server_actions: ServerActionsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesSection {
    #[serde(default)]
    pub remote_patterns: Vec<RemotePatternSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemotePatternSpec {
    pub protocol: Protocol,

    pub hostname: String,

    #[serde(default = "default_pathname")]
    pub pathname: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypescriptSection {
    #[serde(default)]
    pub ignore_build_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerActionsSection {
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_size_limit")]
    pub body_size_limit: BodySizeLimit,

    #[serde(default)]
    pub size_units: UnitBase,
}

impl Default for ServerActionsSection {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            body_size_limit: default_body_size_limit(),
            size_units: UnitBase::default(),
        }
    }
}

/// `2mb` style string or a raw byte count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodySizeLimit {
    Bytes(u64),
    Text(String),
}

impl BodySizeLimit {
    pub fn to_bytes(&self, base: UnitBase) -> Result<u64, PolicyError> {
        match self {
            BodySizeLimit::Bytes(0) => Err(PolicyError::InvalidSize("0".to_string())),
            BodySizeLimit::Bytes(n) => Ok(*n),
            BodySizeLimit::Text(s) => parse_byte_size(s, base),
        }
    }
}

impl PolicyFile {
    /// Validate every field and build the runtime policy
    pub fn compile(&self) -> Result<PolicyConfig, PolicyError> {
        let mut image_rules = Vec::with_capacity(self.images.remote_patterns.len());
        for (i, spec) in self.images.remote_patterns.iter().enumerate() {
            let field = format!("images.remote_patterns[{}]", i);
            image_rules.push(spec.compile(&field)?);
        }

        let mut action_origin_rules = Vec::with_capacity(self.server_actions.allowed_origins.len());
        for (i, origin) in self.server_actions.allowed_origins.iter().enumerate() {
            let rule = ActionOriginRule::new(origin)
                .map_err(|e| e.in_field(&format!("server_actions.allowed_origins[{}]", i)))?;
            action_origin_rules.push(rule);
        }

        let max_action_body_bytes = self
            .server_actions
            .body_size_limit
            .to_bytes(self.server_actions.size_units)
            .map_err(|e| e.in_field("server_actions.body_size_limit"))?;

        PolicyConfig::new(image_rules, action_origin_rules, max_action_body_bytes)
    }
}

impl RemotePatternSpec {
    fn compile(&self, field: &str) -> Result<RemotePatternRule, PolicyError> {
        let mut rule = RemotePatternRule::new(self.protocol, &self.hostname, &self.pathname)
            .map_err(|e| e.in_field(field))?;

        if let Some(port) = self.port {
            if port == 0 {
                return Err(PolicyError::InvalidConfig("port must be non-zero".to_string())
                    .in_field(&format!("{}.port", field)));
            }
            rule = rule.with_port(port);
        }

        if let Some(search) = &self.search {
            rule = rule.with_search(search);
        }

        Ok(rule)
    }
}

fn default_pathname() -> String {
    "/**".to_string()
}

fn default_body_size_limit() -> BodySizeLimit {
    BodySizeLimit::Text("1mb".to_string())
}
