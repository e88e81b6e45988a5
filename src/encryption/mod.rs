pub mod providers;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::settings::EncryptionSettings;

/// Symmetric cipher used to protect registry secrets at rest
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Encrypt plaintext and return base64-encoded ciphertext
    async fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt base64-encoded ciphertext and return plaintext
    async fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// Get provider name for logging
    fn provider_name(&self) -> &str;
}

/// Initialize encryption provider from settings
pub fn init_provider(
    encryption_settings: Option<&EncryptionSettings>,
) -> Result<Option<Arc<dyn EncryptionProvider>>> {
    let Some(encryption_config) = encryption_settings else {
        return Ok(None);
    };

    match encryption_config {
        EncryptionSettings::Local { key } => {
            let provider = providers::local::LocalEncryptionProvider::new(key)
                .context("Failed to initialize local encryption provider")?;
            tracing::debug!(provider = provider.provider_name(), "Encryption provider ready");
            Ok(Some(Arc::new(provider)))
        }
    }
}
