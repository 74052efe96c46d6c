//! Configuration management for the provisioner daemon.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use sfs_share::{
    HttpShareApiConfig, PollSettings, ProvisionerConfig, DEFAULT_PROVISIONER_NAME,
};
use sfs_share::poller::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_SHARE_TIMEOUT_SECS};

use crate::cli::Args;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sfs-provisioner/provisioner.yaml";

/// File the cloud-init agent writes the instance id to.
pub const DEFAULT_INSTANCE_ID_FILE: &str = "/var/lib/cloud/data/instance-id";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provisioning behaviour
    pub provisioner: ProvisionerSection,
    /// Cloud endpoints and credentials
    pub cloud: CloudConfig,
    /// Access-grant network settings
    pub network: NetworkConfig,
    /// HTTP API server
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref name) = args.provisioner {
            self.provisioner.name = name.clone();
        }

        if let Some(timeout) = args.share_timeout {
            self.provisioner.share_timeout_secs = timeout;
        }

        if let Some(ref listen) = args.listen {
            self.server.listen_address = listen.clone();
        }

        self
    }

    /// Check the configuration. The SFS endpoint is only required when a
    /// real control plane is used.
    pub fn validate(&self, dev: bool) -> std::result::Result<(), ConfigError> {
        if self.provisioner.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "provisioner.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.provisioner.share_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provisioner.share_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.provisioner.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provisioner.poll_interval_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if !dev && self.cloud.sfs_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cloud.sfs_endpoint".to_string(),
                message: "is required unless running with --dev".to_string(),
            });
        }

        Ok(())
    }

    /// Settings handed to the provisioner.
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            provisioner_name: self.provisioner.name.clone(),
            poll: PollSettings::new(
                Duration::from_secs(self.provisioner.share_timeout_secs),
                Duration::from_secs(self.provisioner.poll_interval_secs),
            ),
        }
    }

    /// Connection settings for the SFS API client.
    pub fn share_api_config(&self) -> Result<HttpShareApiConfig> {
        Ok(HttpShareApiConfig {
            endpoint: self.cloud.sfs_endpoint.clone(),
            auth_token: self.cloud.auth_token()?,
            insecure: self.cloud.insecure,
            request_timeout: Duration::from_secs(self.cloud.request_timeout_secs),
        })
    }
}

/// Provisioning behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisionerSection {
    /// Provisioner name stamped on volumes
    pub name: String,
    /// How long to wait for a share to become available
    pub share_timeout_secs: u64,
    /// Pause between status checks
    pub poll_interval_secs: u64,
}

impl Default for ProvisionerSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVISIONER_NAME.to_string(),
            share_timeout_secs: DEFAULT_SHARE_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Cloud endpoints and credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Shared file system API endpoint, including version and project
    pub sfs_endpoint: String,
    /// Compute API endpoint (used for VPC discovery)
    pub compute_endpoint: String,
    /// Network API endpoint (used for VPC discovery)
    pub network_endpoint: String,
    /// API token sent as X-Auth-Token
    pub auth_token: String,
    /// File holding the API token, read when `auth_token` is empty
    pub auth_token_file: Option<String>,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            sfs_endpoint: String::new(),
            compute_endpoint: String::new(),
            network_endpoint: String::new(),
            auth_token: String::new(),
            auth_token_file: None,
            insecure: false,
            request_timeout_secs: 30,
        }
    }
}

impl CloudConfig {
    /// Resolve the API token, reading the token file if needed.
    pub fn auth_token(&self) -> Result<String> {
        if !self.auth_token.is_empty() {
            return Ok(self.auth_token.clone());
        }

        match &self.auth_token_file {
            Some(path) => {
                let token = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read token file: {}", path))?;
                Ok(token.trim().to_string())
            }
            None => Ok(String::new()),
        }
    }
}

/// Access-grant network settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Static network id; skips discovery when set
    pub vpc_id: String,
    /// Instance id file used for discovery
    pub instance_id_file: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_id: String::new(),
            instance_id_file: DEFAULT_INSTANCE_ID_FILE.to_string(),
        }
    }
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provisioner.name, "external.k8s.io/sfs");
        assert_eq!(config.provisioner.share_timeout_secs, 600);
        assert_eq!(config.provisioner.poll_interval_secs, 2);
        assert_eq!(config.server.listen_address, "0.0.0.0:8080");
        assert!(config.validate(true).is_ok());
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args {
            provisioner: Some("example.com/sfs".to_string()),
            share_timeout: Some(30),
            listen: Some("127.0.0.1:9999".to_string()),
            ..Default::default()
        };
        let config = Config::default().with_cli_overrides(&args);

        assert_eq!(config.provisioner.name, "example.com/sfs");
        assert_eq!(config.provisioner.share_timeout_secs, 30);
        assert_eq!(config.server.listen_address, "127.0.0.1:9999");

        let poll = config.provisioner_config().poll;
        assert_eq!(poll.timeout, Duration::from_secs(30));
        assert_eq!(poll.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.provisioner.share_timeout_secs = 0;
        assert!(config.validate(true).is_err());

        let mut config = Config::default();
        config.provisioner.name = " ".to_string();
        assert!(config.validate(true).is_err());

        let mut config = Config::default();
        config.cloud.sfs_endpoint = "https://sfs.example.com/v2/p".to_string();
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_auth_token_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"secret-token\n").unwrap();

        let cloud = CloudConfig {
            auth_token_file: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        assert_eq!(cloud.auth_token().unwrap(), "secret-token");

        let inline = CloudConfig {
            auth_token: "inline".to_string(),
            ..cloud
        };
        assert_eq!(inline.auth_token().unwrap(), "inline");
    }
}
