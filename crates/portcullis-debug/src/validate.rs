use crate::policy::load_policy;
use anyhow::Result;
use portcullis_policy::PolicyConfig;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub valid: bool,
    pub image_rules: Vec<String>,
    pub action_origins: Vec<String>,
    pub max_action_body_bytes: u64,
}

impl PolicySummary {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            valid: true,
            image_rules: config.image_rules.iter().map(|r| r.to_string()).collect(),
            action_origins: config
                .action_origin_rules
                .iter()
                .map(|r| r.to_string())
                .collect(),
            max_action_body_bytes: config.max_action_body_bytes,
        }
    }
}

/// Load the policy and print what it admits
pub fn validate(policy_file: &Path, format: &str) -> Result<()> {
    let config = load_policy(policy_file)?;
    let summary = PolicySummary::from_config(&config);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== Policy {} ===", policy_file.display());
    println!("Image rules: {}", summary.image_rules.len());
    for rule in &summary.image_rules {
        println!("  {}", rule);
    }
    println!("Action origins: {}", summary.action_origins.len());
    for origin in &summary.action_origins {
        println!("  {}", origin);
    }
    println!("Max action body: {} bytes", summary.max_action_body_bytes);

    Ok(())
}
