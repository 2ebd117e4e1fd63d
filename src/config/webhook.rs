//! # Webhook Configuration
//!
//! Admission webhook listener and policy settings.

use super::{env_var_or_default, env_var_or_default_bool};
use crate::constants::DEFAULT_WEBHOOK_PORT;
use std::str::FromStr;

/// Which association records the admission gate consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionScope {
    /// Every record in the cluster
    #[default]
    Cluster,
    /// Only records in the namespace of the secret under review
    Namespace,
}

impl FromStr for AdmissionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "namespace" | "namespaced" => Ok(Self::Namespace),
            other => Err(format!("unknown admission scope '{other}'")),
        }
    }
}

/// Admission webhook configuration
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    /// Port the webhook listens on
    pub port: u16,
    /// PEM certificate served to the API server (TLS disabled when unset)
    pub tls_cert_path: Option<String>,
    /// PEM private key matching `tls_cert_path`
    pub tls_key_path: Option<String>,
    /// Record visibility used by the gate
    pub admission_scope: AdmissionScope,
    /// Reject deletion of protected secrets as well as updates
    pub enforce_on_delete: bool,
}

impl WebhookConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            port: env_var_or_default("WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT),
            tls_cert_path: std::env::var("WEBHOOK_TLS_CERT_PATH").ok(),
            tls_key_path: std::env::var("WEBHOOK_TLS_KEY_PATH").ok(),
            admission_scope: env_var_or_default("ADMISSION_SCOPE", AdmissionScope::Cluster),
            enforce_on_delete: env_var_or_default_bool("ENFORCE_ON_DELETE", false),
        }
    }

    /// Certificate and key paths, if both are configured
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_scope_parsing() {
        assert_eq!("cluster".parse::<AdmissionScope>(), Ok(AdmissionScope::Cluster));
        assert_eq!(" Namespace ".parse::<AdmissionScope>(), Ok(AdmissionScope::Namespace));
        assert!("galaxy".parse::<AdmissionScope>().is_err());
    }

    #[test]
    fn test_tls_requires_both_paths() {
        let mut config = WebhookConfig {
            tls_cert_path: Some("/tls/tls.crt".to_string()),
            ..WebhookConfig::default()
        };
        assert!(config.tls_paths().is_none());
        config.tls_key_path = Some("/tls/tls.key".to_string());
        assert_eq!(config.tls_paths(), Some(("/tls/tls.crt", "/tls/tls.key")));
    }
}
