use crate::config::PolicyConfig;
use crate::error::PolicyError;
use crate::gate::{ActionRequest, Decision, ImageRequest};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Holds the active policy and swaps it as a whole on reload.
///
/// Readers take an `Arc` snapshot and evaluate against it, so a reload
/// racing with an evaluation is seen either entirely or not at all.
pub struct PolicyStore {
    current: RwLock<Arc<PolicyConfig>>,
}

impl PolicyStore {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        Ok(Self::new(PolicyConfig::from_file(path)?))
    }

    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        // The guarded value is a single Arc; a poisoned lock still holds a whole one
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new policy, returning the one it replaced
    pub fn replace(&self, config: PolicyConfig) -> Arc<PolicyConfig> {
        let next = Arc::new(config);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }

    /// Re-read the policy file. The old policy stays active if the new one
    /// does not load.
    pub fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<(), PolicyError> {
        let path = path.as_ref();
        match PolicyConfig::from_file(path) {
            Ok(config) => {
                self.replace(config);
                tracing::info!(path = %path.display(), "policy reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "policy reload refused, keeping previous policy"
                );
                Err(e)
            }
        }
    }

    pub fn evaluate_image(&self, request: &ImageRequest) -> Result<Decision, PolicyError> {
        self.snapshot().evaluate_image(request)
    }

    pub fn evaluate_action(&self, request: &ActionRequest) -> Decision {
        self.snapshot().evaluate_action(request)
    }
}
