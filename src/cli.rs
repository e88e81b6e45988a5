use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use registry_credentials::encryption::{self, EncryptionProvider};
use registry_credentials::settings::Settings;
use registry_credentials::{new_adapter, AdapterContext, RegistryAdapter, RegistryError};

/// Read a payload from a file, or from stdin when `path` is "-"
fn read_payload(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read payload from stdin")?;
        return Ok(buffer);
    }
    std::fs::read(path).with_context(|| format!("Failed to read payload file {}", path))
}

fn load_adapter(
    settings: &Settings,
    registry_type: &str,
    payload_path: &str,
) -> Result<Box<dyn RegistryAdapter>> {
    let payload = read_payload(payload_path)?;
    let ctx = AdapterContext::from_settings(&settings.docker_hub)
        .context("Failed to build HTTP client")?;
    Ok(new_adapter(registry_type, &payload, &ctx)?)
}

fn cipher(settings: &Settings) -> Result<Arc<dyn EncryptionProvider>> {
    encryption::init_provider(settings.encryption.as_ref())?
        .ok_or_else(|| anyhow!("No encryption configured. Add an [encryption] section to the config"))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Returns whether the credential passed all checks
pub async fn validate(
    settings: &Settings,
    registry_type: &str,
    payload_path: &str,
    skip_login: bool,
) -> Result<bool> {
    let adapter = load_adapter(settings, registry_type, payload_path)?;

    match adapter.validate_fields() {
        Ok(()) => {}
        Err(RegistryError::Validation(errors)) => {
            eprintln!("Invalid credential fields: {}", errors);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    if skip_login {
        info!("Field rules passed, registry login skipped");
        return Ok(true);
    }

    if !adapter.is_valid_credential().await {
        eprintln!(
            "Registry rejected the credentials for '{}' or could not be reached",
            adapter.get_username()
        );
        return Ok(false);
    }

    println!(
        "Credentials for {} namespace '{}' are valid",
        adapter.get_registry_type(),
        adapter.get_namespace()
    );
    Ok(true)
}

pub async fn encrypt(settings: &Settings, registry_type: &str, payload_path: &str) -> Result<()> {
    let cipher = cipher(settings)?;
    let mut adapter = load_adapter(settings, registry_type, payload_path)?;

    adapter.encrypt_secret(cipher.as_ref()).await?;
    adapter.encrypt_extras(cipher.as_ref()).await?;

    print_json(&adapter.to_json()?)
}

pub async fn decrypt(settings: &Settings, registry_type: &str, payload_path: &str) -> Result<()> {
    let cipher = cipher(settings)?;
    let mut adapter = load_adapter(settings, registry_type, payload_path)?;

    adapter.decrypt_secret(cipher.as_ref()).await?;
    adapter.decrypt_extras(cipher.as_ref()).await?;

    print_json(&adapter.to_json()?)
}

pub fn show(settings: &Settings, registry_type: &str, payload_path: &str) -> Result<()> {
    let adapter = load_adapter(settings, registry_type, payload_path)?;

    print_json(&serde_json::json!({
        "registry_type": adapter.get_registry_type(),
        "namespace": adapter.get_namespace(),
        "username": adapter.get_username(),
        "non_secret": adapter.get_non_secret(),
    }))
}
