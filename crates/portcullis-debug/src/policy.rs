use anyhow::{anyhow, Context, Result};
use portcullis_policy::{ActionRequest, Decision, ImageRequest, PolicyConfig};
use serde_json::json;
use std::fs;
use std::path::Path;

pub fn load_policy(policy_file: &Path) -> Result<PolicyConfig> {
    tracing::debug!("Loading policy from: {}", policy_file.display());
    PolicyConfig::from_file(policy_file)
        .with_context(|| format!("Failed to load policy {}", policy_file.display()))
}

/// Test an image URL without running the image pipeline
pub fn image(policy_file: &Path, url: &str, format: &str) -> Result<()> {
    let policy = load_policy(policy_file)?;
    emit(&check_image(&policy, url), format)
}

/// Test an action request without running the dispatcher
pub fn action(
    policy_file: &Path,
    origin: &str,
    host: Option<&str>,
    body_bytes: u64,
    format: &str,
) -> Result<()> {
    let policy = load_policy(policy_file)?;
    emit(&check_action(&policy, origin, host, body_bytes), format)
}

/// Test a request given as inline JSON or a JSON file
pub fn policy(policy_file: &Path, request_json: &str, format: &str) -> Result<()> {
    let policy = load_policy(policy_file)?;

    let request: serde_json::Value = if request_json.trim_start().starts_with('{') {
        serde_json::from_str(request_json)?
    } else if Path::new(request_json).exists() {
        let content = fs::read_to_string(request_json)?;
        serde_json::from_str(&content)?
    } else {
        return Err(anyhow!("Request must be inline JSON or path to JSON file"));
    };

    emit(&check_request(&policy, &request)?, format)
}

/// Route a JSON request to the image or action check
pub fn check_request(
    policy: &PolicyConfig,
    request: &serde_json::Value,
) -> Result<serde_json::Value> {
    if let Some(url) = request.get("url").and_then(|v| v.as_str()) {
        return Ok(check_image(policy, url));
    }

    if let Some(origin) = request.get("origin").and_then(|v| v.as_str()) {
        let body_bytes = request
            .get("body_bytes")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                anyhow!("Action request must have 'body_bytes' as a non-negative integer")
            })?;
        let host = request.get("host").and_then(|v| v.as_str());
        return Ok(check_action(policy, origin, host, body_bytes));
    }

    Err(anyhow!(
        "Request must have either 'url' (image) or 'origin' (action) field"
    ))
}

pub fn check_image(policy: &PolicyConfig, url: &str) -> serde_json::Value {
    match policy.evaluate_image(&ImageRequest::new(url)) {
        Ok(decision) => json!({
            "kind": "image",
            "allowed": decision.is_admitted(),
            "reason": describe(&decision, "URL matches a remote pattern"),
            "decision": decision,
            "url": url,
        }),
        // The pipeline refuses malformed URLs, so report them as a denial
        Err(e) => json!({
            "kind": "image",
            "allowed": false,
            "reason": e.to_string(),
            "url": url,
        }),
    }
}

pub fn check_action(
    policy: &PolicyConfig,
    origin: &str,
    host: Option<&str>,
    body_bytes: u64,
) -> serde_json::Value {
    let mut request = ActionRequest::new(origin, body_bytes);
    if let Some(host) = host {
        request = request.with_host(host);
    }

    let decision = policy.evaluate_action(&request);
    let statuses: Vec<u16> = decision.reasons().iter().map(|r| r.http_status()).collect();
    json!({
        "kind": "action",
        "allowed": decision.is_admitted(),
        "reason": describe(&decision, "Origin and body size passed policy validation"),
        "decision": decision,
        "origin": origin,
        "body_bytes": body_bytes,
        "limit_bytes": policy.max_action_body_bytes,
        "statuses": statuses,
    })
}

fn describe(decision: &Decision, admitted: &str) -> String {
    if decision.is_admitted() {
        return admitted.to_string();
    }
    decision
        .reasons()
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn emit(result: &serde_json::Value, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_policy_result(result);
    }
    Ok(())
}

fn print_policy_result(result: &serde_json::Value) {
    let allowed = result
        .get("allowed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let reason = result
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown");

    println!("=== Policy Decision ===");
    println!(
        "Decision: {}",
        if allowed { "✅ ALLOWED" } else { "❌ DENIED" }
    );
    println!("Reason: {}", reason);

    if let Some(url) = result.get("url").and_then(|v| v.as_str()) {
        println!("URL: {}", url);
    }

    if let Some(origin) = result.get("origin").and_then(|v| v.as_str()) {
        println!("Origin: {}", origin);
    }

    if let (Some(body), Some(limit)) = (
        result.get("body_bytes").and_then(|v| v.as_u64()),
        result.get("limit_bytes").and_then(|v| v.as_u64()),
    ) {
        println!("Body: {} / {} bytes", body, limit);
    }

    if let Some(statuses) = result.get("statuses").and_then(|v| v.as_array()) {
        if !statuses.is_empty() {
            let codes: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            println!("Suggested status: {}", codes.join(", "));
        }
    }
}
