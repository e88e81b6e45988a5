use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::registry::providers::docker_hub::DOCKER_HUB_URL;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub docker_hub: DockerHubSettings,
    #[serde(default)]
    pub encryption: Option<EncryptionSettings>,
}

fn default_docker_hub_url() -> String {
    DOCKER_HUB_URL.to_string()
}

/// Docker Hub API endpoint and transport settings
#[derive(Debug, Deserialize, Clone)]
pub struct DockerHubSettings {
    /// Base URL of the Docker Hub v2 API (default: "https://hub.docker.com/v2")
    #[serde(default = "default_docker_hub_url")]
    pub url: String,

    /// Optional overall timeout for requests made to the registry, in seconds.
    /// Unset means the HTTP client default (no timeout).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for DockerHubSettings {
    fn default() -> Self {
        Self {
            url: default_docker_hub_url(),
            request_timeout_secs: None,
        }
    }
}

impl DockerHubSettings {
    /// Build the HTTP client used for registry calls
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Encryption provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EncryptionSettings {
    /// Local AES-256-GCM encryption using a symmetric key
    #[serde(rename = "aes-gcm-256")]
    Local {
        /// Base64-encoded 32-byte encryption key
        /// Generate with: openssl rand -base64 32
        key: String,
    },
}

/// Expand `${VAR}` and `${VAR:-default}` references in every string of a
/// settings tree. Unset variables without a default expand to "".
fn expand_env_vars(value: &mut serde_json::Value) {
    lazy_static::lazy_static! {
        static ref ENV_REF: regex::Regex =
            regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    }

    match value {
        serde_json::Value::String(s) if s.contains("${") => {
            let expanded = ENV_REF.replace_all(s, |caps: &regex::Captures| {
                env::var(&caps[1])
                    .unwrap_or_else(|_| caps.get(2).map_or("", |m| m.as_str()).to_string())
            });
            *s = expanded.into_owned();
        }
        serde_json::Value::Object(map) => map.values_mut().for_each(expand_env_vars),
        serde_json::Value::Array(items) => items.iter_mut().for_each(expand_env_vars),
        _ => {}
    }
}

impl Settings {
    /// Load settings from `$REGCRED_CONFIG_DIR` (default: "config") for the
    /// `$REGCRED_CONFIG_RUN_MODE` (default: "development") run mode
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("REGCRED_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("REGCRED_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::from_dir(&config_dir, &run_mode)
    }

    /// Load `default`, `<run_mode>` and `local` config files (`.toml`, `.yaml`
    /// or `.yml`, all optional, later files win) from `config_dir`, then
    /// `REGCRED_*` environment variables
    pub fn from_dir(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        for name in ["default", run_mode, "local"] {
            builder = builder
                .add_source(File::with_name(&format!("{}/{}", config_dir, name)).required(false));
        }

        // e.g. REGCRED_DOCKER_HUB__URL sets docker_hub.url
        let config = builder
            .add_source(
                Environment::with_prefix("REGCRED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize merged configuration sources into settings. Numbers that do
    /// not fit a JSON number are rejected.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut tree: serde_json::Value = config.try_deserialize()?;
        expand_env_vars(&mut tree);

        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(tree, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Invalid settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        if settings.docker_hub.url.is_empty() {
            return Err(ConfigError::Message(
                "Docker Hub URL is empty. Set [docker_hub] url or remove it to use the default"
                    .to_string(),
            ));
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_expand_env_vars_walks_nested_values() {
        env::set_var("SETTINGS_TEST_REGISTRY_HOST", "registry.local");
        env::remove_var("SETTINGS_TEST_UNSET");

        let mut tree = serde_json::json!({
            "docker_hub": {
                "url": "https://${SETTINGS_TEST_REGISTRY_HOST}/v2",
                "request_timeout_secs": 10,
            },
            "mirrors": ["${SETTINGS_TEST_UNSET:-none}", "${SETTINGS_TEST_UNSET}"],
            "plain": "no references",
        });
        expand_env_vars(&mut tree);

        assert_eq!(tree["docker_hub"]["url"], "https://registry.local/v2");
        assert_eq!(tree["docker_hub"]["request_timeout_secs"], 10);
        assert_eq!(tree["mirrors"], serde_json::json!(["none", ""]));
        assert_eq!(tree["plain"], "no references");
        env::remove_var("SETTINGS_TEST_REGISTRY_HOST");
    }

    #[test]
    fn test_defaults_without_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_dir(dir.path().to_str().unwrap(), "test").unwrap();

        assert_eq!(settings.docker_hub.url, "https://hub.docker.com/v2");
        assert_eq!(settings.docker_hub.request_timeout_secs, None);
        assert!(settings.encryption.is_none());
    }

    #[test]
    fn test_load_toml_with_encryption_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[docker_hub]
url = "http://localhost:9999/v2"

[encryption]
type = "aes-gcm-256"
key = "${SETTINGS_TEST_ENCRYPTION_KEY:-c2VjcmV0}"
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("local.yaml"),
            "docker_hub:\n  request_timeout_secs: 5\n",
        )
        .unwrap();

        let settings = Settings::from_dir(dir.path().to_str().unwrap(), "test").unwrap();

        assert_eq!(settings.docker_hub.url, "http://localhost:9999/v2");
        assert_eq!(settings.docker_hub.request_timeout_secs, Some(5));
        match settings.encryption {
            Some(EncryptionSettings::Local { key }) => assert_eq!(key, "c2VjcmV0"),
            other => panic!("unexpected encryption settings: {:?}", other),
        }
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[docker_hub]\nurl = \"\"\n").unwrap();

        let err = Settings::from_dir(dir.path().to_str().unwrap(), "test").unwrap_err();
        assert!(err.to_string().contains("Docker Hub URL is empty"));
    }

    #[test]
    fn test_out_of_range_timeout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[docker_hub]\nrequest_timeout_secs = -1\n",
        )
        .unwrap();

        let err = Settings::from_dir(dir.path().to_str().unwrap(), "test").unwrap_err();
        assert!(err.to_string().contains("Invalid settings"), "{err}");
    }

    #[test]
    fn test_oversized_integer_is_an_error() {
        let config = Config::builder()
            .set_override("docker_hub.request_timeout_secs", u128::MAX)
            .unwrap()
            .build()
            .unwrap();

        assert!(Settings::from_config(config).is_err());
    }

    #[test]
    fn test_http_client_builds_with_timeout() {
        let settings = DockerHubSettings {
            request_timeout_secs: Some(3),
            ..Default::default()
        };
        assert!(settings.http_client().is_ok());
    }
}
