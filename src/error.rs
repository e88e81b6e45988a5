use thiserror::Error;

/// Errors surfaced by registry adapters.
///
/// Rejected or unreachable logins have no variant here; they are reported as
/// `false` by `RegistryAdapter::is_valid_credential`.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The inbound credential payload is not valid JSON or has the wrong shape
    #[error("failed to deserialize registry credentials: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The payload names a registry type other than the adapter being built
    #[error("registry type mismatch: expected '{expected}', got '{found}'")]
    RegistryTypeMismatch { expected: String, found: String },

    #[error("unsupported registry type: {0}")]
    UnsupportedRegistryType(String),

    /// One or more declarative field rules were violated
    #[error("invalid registry credential fields: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The cipher failed to encrypt or decrypt a secret field
    #[error("secret encryption failed: {0:#}")]
    Crypto(#[source] anyhow::Error),

    /// The provider's image listing call failed
    #[error("failed to list registry images: {0:#}")]
    Listing(#[source] anyhow::Error),
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
