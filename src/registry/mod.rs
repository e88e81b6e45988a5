pub mod listing;
pub mod models;
pub mod providers;
pub mod validation;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::encryption::EncryptionProvider;
use crate::error::{RegistryError, Result};
use crate::registry::listing::ImageLister;
use crate::registry::models::{FieldMap, ImageRecord};
use crate::settings::DockerHubSettings;

pub use providers::docker_hub::RegistryDockerHub;

/// Registry provider discriminator stored alongside every credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    DockerHub,
}

impl RegistryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::DockerHub => "docker_hub",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "docker_hub" => Ok(RegistryType::DockerHub),
            other => Err(RegistryError::UnsupportedRegistryType(other.to_string())),
        }
    }
}

/// Collaborators an adapter needs beyond its own credential fields
#[derive(Clone)]
pub struct AdapterContext {
    /// HTTP transport used for credential login checks. Timeouts, proxies and TLS
    /// settings are configured on this client by the caller.
    pub http_client: reqwest::Client,
    /// Base URL of the Docker Hub v2 API
    pub docker_hub_url: String,
    /// Image enumeration for Docker Hub namespaces
    pub docker_hub_lister: Option<Arc<dyn ImageLister>>,
}

impl AdapterContext {
    pub fn new(http_client: reqwest::Client, docker_hub_url: impl Into<String>) -> Self {
        Self {
            http_client,
            docker_hub_url: docker_hub_url.into(),
            docker_hub_lister: None,
        }
    }

    /// Build a context from settings
    pub fn from_settings(settings: &DockerHubSettings) -> reqwest::Result<Self> {
        Ok(Self::new(settings.http_client()?, settings.url.clone()))
    }

    pub fn with_docker_hub_lister(mut self, lister: Arc<dyn ImageLister>) -> Self {
        self.docker_hub_lister = Some(lister);
        self
    }
}

/// Capability set every registry credential adapter implements.
///
/// One implementing type per registry provider. Adapters are owned by a single
/// caller for one validate / encrypt / decrypt / list cycle and hold no shared
/// mutable state.
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Check declarative field rules (required fields, formats, lengths). No I/O.
    fn validate_fields(&self) -> Result<()>;

    /// Try a login against the provider with the current (plaintext) credentials.
    ///
    /// Any failure, whether rejected credentials or an unreachable registry,
    /// is logged and reported as `false`.
    async fn is_valid_credential(&self) -> bool;

    /// Replace secret fields with their ciphertext
    async fn encrypt_secret(&mut self, cipher: &dyn EncryptionProvider) -> Result<()>;

    /// Replace secret fields with their plaintext
    async fn decrypt_secret(&mut self, cipher: &dyn EncryptionProvider) -> Result<()>;

    /// Encrypt provider-specific secondary secrets
    async fn encrypt_extras(&mut self, cipher: &dyn EncryptionProvider) -> Result<()>;

    /// Decrypt provider-specific secondary secrets
    async fn decrypt_extras(&mut self, cipher: &dyn EncryptionProvider) -> Result<()>;

    /// List every image in the credential's namespace
    async fn fetch_images_from_registry(&self) -> Result<Vec<ImageRecord>>;

    fn get_secret(&self) -> FieldMap;

    fn get_non_secret(&self) -> FieldMap;

    fn get_extras(&self) -> FieldMap;

    fn get_namespace(&self) -> &str;

    fn get_username(&self) -> &str;

    fn get_registry_type(&self) -> &str;

    /// Serialize the credential in its storage form
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Build the adapter for `registry_type` from a raw credential payload
pub fn new_adapter(
    registry_type: &str,
    payload: &[u8],
    ctx: &AdapterContext,
) -> Result<Box<dyn RegistryAdapter>> {
    match registry_type.parse::<RegistryType>()? {
        RegistryType::DockerHub => Ok(Box::new(RegistryDockerHub::new(payload, ctx)?)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_type_round_trip_strings() {
        assert_eq!("docker_hub".parse::<RegistryType>().unwrap(), RegistryType::DockerHub);
        assert_eq!(RegistryType::DockerHub.to_string(), "docker_hub");
        assert_eq!(
            serde_json::to_value(RegistryType::DockerHub).unwrap(),
            serde_json::json!("docker_hub")
        );
    }

    #[test]
    fn test_new_adapter_dispatches_docker_hub() {
        let ctx = test_support::context("http://127.0.0.1:1");
        let payload = br#"{"non_secret":{"docker_hub_username":"alice","docker_hub_namespace":"alice"},"secret":{"docker_hub_password":"pw"}}"#;

        let adapter = new_adapter("docker_hub", payload, &ctx).unwrap();
        assert_eq!(adapter.get_registry_type(), "docker_hub");
        assert_eq!(adapter.get_namespace(), "alice");
        assert_eq!(adapter.get_username(), "alice");
    }

    #[test]
    fn test_new_adapter_rejects_unknown_type() {
        let ctx = test_support::context("http://127.0.0.1:1");
        let err = new_adapter("quay", b"{}", &ctx).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedRegistryType(t) if t == "quay"));
    }

    #[tokio::test]
    async fn test_credential_lifecycle_through_trait_object() {
        use crate::encryption::providers::LocalEncryptionProvider;
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_support::context(&server.uri());
        let cipher = LocalEncryptionProvider::new(&BASE64.encode([1u8; 32])).unwrap();
        let payload = br#"{"non_secret":{"docker_hub_username":"alice","docker_hub_namespace":"alice"},"secret":{"docker_hub_password":"pw"}}"#;

        let mut adapter = new_adapter("docker_hub", payload, &ctx).unwrap();
        adapter.validate_fields().unwrap();
        assert!(adapter.is_valid_credential().await);

        adapter.encrypt_secret(&cipher).await.unwrap();
        adapter.encrypt_extras(&cipher).await.unwrap();
        let stored = serde_json::to_vec(&adapter.to_json().unwrap()).unwrap();
        assert!(!String::from_utf8_lossy(&stored).contains("\"pw\""));

        let mut loaded = new_adapter(adapter.get_registry_type(), &stored, &ctx).unwrap();
        loaded.decrypt_secret(&cipher).await.unwrap();
        loaded.decrypt_extras(&cipher).await.unwrap();
        assert_eq!(loaded.get_secret(), adapter_secret("pw"));
    }

    fn adapter_secret(password: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("docker_hub_password".to_string(), serde_json::json!(password));
        map
    }
}
