use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::encryption::EncryptionProvider;
use crate::error::{RegistryError, Result};
use crate::registry::listing::ImageLister;
use crate::registry::models::{to_field_map, FieldMap, ImageRecord};
use crate::registry::validation::{empty_or_bounded, empty_or_min_two, NAMESPACE_RE};
use crate::registry::{AdapterContext, RegistryAdapter, RegistryType};

/// Public Docker Hub v2 API
pub const DOCKER_HUB_URL: &str = "https://hub.docker.com/v2";

const REGISTRY_TYPE: RegistryType = RegistryType::DockerHub;

fn default_registry_type() -> String {
    REGISTRY_TYPE.as_str().to_string()
}

/// Treat an explicit `null` the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn registry_type_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_registry_type))
}

/// Fields that are stored in plaintext and safe to display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DockerHubNonSecret {
    /// Empty means no live credential; the login check is skipped
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(custom = "empty_or_bounded")]
    pub docker_hub_username: String,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 2, max = 255), regex = "NAMESPACE_RE")]
    pub docker_hub_namespace: String,
}

/// Fields that are encrypted at rest
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DockerHubSecret {
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(custom = "empty_or_min_two")]
    pub docker_hub_password: String,
}

impl fmt::Debug for DockerHubSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerHubSecret")
            .field("docker_hub_password", &"<redacted>")
            .finish()
    }
}

/// Docker Hub credential in its inbound / storage form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DockerHubCredential {
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate]
    pub non_secret: DockerHubNonSecret,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate]
    pub secret: DockerHubSecret,

    #[serde(
        default = "default_registry_type",
        deserialize_with = "registry_type_or_default"
    )]
    pub registry_type: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Docker Hub credential adapter
pub struct RegistryDockerHub {
    credential: DockerHubCredential,
    http_client: reqwest::Client,
    base_url: String,
    lister: Option<Arc<dyn ImageLister>>,
}

impl fmt::Debug for RegistryDockerHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryDockerHub")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RegistryDockerHub {
    /// Deserialize a credential payload. Field semantics are not checked here;
    /// see [`RegistryAdapter::validate_fields`].
    pub fn new(payload: &[u8], ctx: &AdapterContext) -> Result<Self> {
        let credential: DockerHubCredential = serde_json::from_slice(payload)?;
        Self::from_credential(credential, ctx)
    }

    pub fn from_credential(credential: DockerHubCredential, ctx: &AdapterContext) -> Result<Self> {
        if credential.registry_type != REGISTRY_TYPE.as_str() {
            return Err(RegistryError::RegistryTypeMismatch {
                expected: REGISTRY_TYPE.to_string(),
                found: credential.registry_type,
            });
        }

        Ok(Self {
            credential,
            http_client: ctx.http_client.clone(),
            base_url: ctx.docker_hub_url.trim_end_matches('/').to_string(),
            lister: ctx.docker_hub_lister.clone(),
        })
    }

    pub fn credential(&self) -> &DockerHubCredential {
        &self.credential
    }

    fn login_url(&self) -> String {
        format!("{}/users/login/", self.base_url)
    }
}

#[async_trait]
impl RegistryAdapter for RegistryDockerHub {
    fn validate_fields(&self) -> Result<()> {
        self.credential.validate()?;
        Ok(())
    }

    async fn is_valid_credential(&self) -> bool {
        let username = self.credential.non_secret.docker_hub_username.as_str();
        if username.is_empty() {
            return true;
        }

        let body = LoginRequest {
            username,
            password: &self.credential.secret.docker_hub_password,
        };

        let response = match self.http_client.post(self.login_url()).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    username = %username,
                    error = %e,
                    "Docker Hub login request failed"
                );
                return false;
            }
        };

        let status = response.status();
        // Read the body to the end so the connection goes back to the pool
        let response_body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            tracing::error!(
                username = %username,
                status = status.as_u16(),
                response = %response_body,
                "Failed to authenticate with Docker Hub"
            );
            return false;
        }

        true
    }

    async fn encrypt_secret(&mut self, cipher: &dyn EncryptionProvider) -> Result<()> {
        let ciphertext = cipher
            .encrypt(&self.credential.secret.docker_hub_password)
            .await
            .map_err(RegistryError::Crypto)?;
        self.credential.secret.docker_hub_password = ciphertext;
        Ok(())
    }

    async fn decrypt_secret(&mut self, cipher: &dyn EncryptionProvider) -> Result<()> {
        let plaintext = cipher
            .decrypt(&self.credential.secret.docker_hub_password)
            .await
            .map_err(RegistryError::Crypto)?;
        self.credential.secret.docker_hub_password = plaintext;
        Ok(())
    }

    // Docker Hub has no secondary secrets
    async fn encrypt_extras(&mut self, _cipher: &dyn EncryptionProvider) -> Result<()> {
        Ok(())
    }

    async fn decrypt_extras(&mut self, _cipher: &dyn EncryptionProvider) -> Result<()> {
        Ok(())
    }

    async fn fetch_images_from_registry(&self) -> Result<Vec<ImageRecord>> {
        let lister = self.lister.as_ref().ok_or_else(|| {
            RegistryError::Listing(anyhow!("no image lister configured for Docker Hub"))
        })?;

        let namespace = self.get_namespace();
        let images = lister
            .list_images(
                self.get_username(),
                &self.credential.secret.docker_hub_password,
                namespace,
            )
            .await
            .map_err(RegistryError::Listing)?;

        tracing::info!(
            namespace = %namespace,
            count = images.len(),
            "Fetched images from Docker Hub"
        );
        Ok(images)
    }

    fn get_secret(&self) -> FieldMap {
        to_field_map(&self.credential.secret)
    }

    fn get_non_secret(&self) -> FieldMap {
        to_field_map(&self.credential.non_secret)
    }

    fn get_extras(&self) -> FieldMap {
        FieldMap::new()
    }

    fn get_namespace(&self) -> &str {
        &self.credential.non_secret.docker_hub_namespace
    }

    fn get_username(&self) -> &str {
        &self.credential.non_secret.docker_hub_username
    }

    fn get_registry_type(&self) -> &str {
        REGISTRY_TYPE.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.credential)?)
    }
}
