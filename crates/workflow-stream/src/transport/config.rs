use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:50051";
const DEFAULT_GENERATE_PATH: &str = "/api/v1/workflow/generate";
const DEFAULT_FIX_PATH: &str = "/api/v1/workflow/fix";

/// Configuration for the HTTP workflow backend.
#[derive(Clone, Debug)]
pub struct WorkflowClientConfig {
    /// Base URL of the backend, without a trailing path.
    pub base_url: String,
    /// Path receiving `POST { prompt }`.
    pub generate_path: String,
    /// Path receiving `POST { workflowDefinition, description }`.
    pub fix_path: String,
    /// Whole-request timeout. This is the only deadline in the pipeline; the
    /// progress tracker itself never times out.
    pub timeout: Duration,
}

impl Default for WorkflowClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl WorkflowClientConfig {
    /// Creates a config for `base_url` with the default paths and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            generate_path: DEFAULT_GENERATE_PATH.to_string(),
            fix_path: DEFAULT_FIX_PATH.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `WORKFLOW_BACKEND_URL`: base URL (default `http://localhost:50051`).
    /// - `WORKFLOW_BACKEND_TIMEOUT_SECS`: request timeout in seconds (default 120).
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("WORKFLOW_BACKEND_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url.trim());
        if let Ok(raw) = std::env::var("WORKFLOW_BACKEND_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!(
                    "WORKFLOW_BACKEND_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the generate and fix paths.
    pub fn paths(mut self, generate: impl Into<String>, fix: impl Into<String>) -> Self {
        self.generate_path = generate.into();
        self.fix_path = fix.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ClientError::Config("backend base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "backend base_url must start with http:// or https://, got {base}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::Config("backend timeout must be greater than 0".into()));
        }
        Ok(())
    }

    pub(crate) fn generate_url(&self) -> String {
        join_url(&self.base_url, &self.generate_path)
    }

    pub(crate) fn fix_url(&self) -> String {
        join_url(&self.base_url, &self.fix_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_duplicate_slashes() {
        let config = WorkflowClientConfig::new("http://backend:8080/");
        assert_eq!(
            config.generate_url(),
            "http://backend:8080/api/v1/workflow/generate"
        );
        let config = config.paths("gen", "/fix");
        assert_eq!(config.generate_url(), "http://backend:8080/gen");
        assert_eq!(config.fix_url(), "http://backend:8080/fix");
    }

    #[test]
    fn validate_rejects_bad_base_url_and_zero_timeout() {
        assert!(matches!(
            WorkflowClientConfig::new("").validate(),
            Err(ClientError::Config(msg)) if msg.contains("must not be empty")
        ));
        assert!(matches!(
            WorkflowClientConfig::new("localhost:1").validate(),
            Err(ClientError::Config(msg)) if msg.contains("http://")
        ));
        assert!(
            WorkflowClientConfig::default()
                .timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(WorkflowClientConfig::default().validate().is_ok());
    }
}
